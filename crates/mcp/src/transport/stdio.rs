//! Newline-delimited frames over a byte stream.

use super::Transport;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};

/// Transport over any buffered reader / writer pair, one frame per line.
///
/// Blank lines are skipped. A trailing `\r` is stripped so CRLF peers work.
/// Invalid UTF-8 is replaced lossily; the dispatcher then rejects the frame
/// without ending the session.
#[derive(Debug)]
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
    line: Vec<u8>,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: Vec::new(),
        }
    }
}

/// Line transport bound to the process's standard input and output.
pub fn stdio() -> LineTransport<BufReader<Stdin>, Stdout> {
    LineTransport::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
}

impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_frame(&mut self) -> std::io::Result<Option<String>> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line).await? == 0 {
                return Ok(None);
            }
            let text = String::from_utf8_lossy(&self.line);
            let frame = text.trim_end_matches(['\n', '\r']);
            if !frame.trim().is_empty() {
                return Ok(Some(frame.to_string()));
            }
        }
    }

    async fn write_frame(&mut self, frame: &str) -> std::io::Result<()> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatch::{Dispatcher, serve},
        protocol::Implementation,
        registry::{Registry, tests::Echo},
    };
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, duplex};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn reads_lines_and_skips_blanks() {
        let input: &[u8] = b"{\"a\":1}\r\n\n   \n{\"b\":2}";
        let mut transport = LineTransport::new(input, Vec::new());
        assert_eq!(transport.read_frame().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(transport.read_frame().await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(transport.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_still_a_frame() {
        let input: &[u8] = b"\xff\xfe garbage\n{\"a\":1}\n";
        let mut transport = LineTransport::new(input, Vec::new());
        let first = transport.read_frame().await.unwrap().unwrap();
        assert!(first.ends_with(" garbage"));
        assert!(first.contains('\u{FFFD}'));
        assert_eq!(transport.read_frame().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(transport.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn serve_survives_invalid_utf8() {
        let dispatcher = Dispatcher::new(
            Registry::new(),
            Implementation {
                name: "t".into(),
                version: "0".into(),
            },
        );
        let input: &[u8] = b"\xff\xfe garbage\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
        let (client, server) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let transport = LineTransport::new(BufReader::new(server_read), server_write);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(input).await.unwrap();
        client_write.shutdown().await.unwrap();

        serve(&dispatcher, transport, CancellationToken::new())
            .await
            .unwrap();

        let mut out = String::new();
        client_read.read_to_string(&mut out).await.unwrap();
        let replies: Vec<Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["error"]["code"], -32700);
        assert_eq!(replies[0]["id"], Value::Null);
        assert_eq!(replies[1]["id"], 1);
        assert!(replies[1].get("result").is_some());
    }

    #[tokio::test]
    async fn writes_newline_terminated_frames() {
        let mut transport = LineTransport::new(&b""[..], Vec::new());
        transport.write_frame("{}").await.unwrap();
        transport.write_frame("[]").await.unwrap();
        assert_eq!(transport.writer, b"{}\n[]\n");
    }

    #[tokio::test]
    async fn serve_answers_each_frame_in_order() {
        let mut registry = Registry::new();
        registry.register(Echo("echo")).unwrap();
        let dispatcher = Dispatcher::new(
            registry,
            Implementation {
                name: "t".into(),
                version: "0".into(),
            },
        );

        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
            "garbage\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":\"x\",\"method\":\"mcp.call_tool\",\"params\":{\"name\":\"echo\",\"arguments\":{\"text\":\"hey\"}}}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"bogus\"}\n",
        );
        let (client, server) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let transport = LineTransport::new(BufReader::new(server_read), server_write);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(input.as_bytes()).await.unwrap();
        client_write.shutdown().await.unwrap();

        serve(&dispatcher, transport, CancellationToken::new())
            .await
            .unwrap();

        let mut out = String::new();
        client_read.read_to_string(&mut out).await.unwrap();
        let replies: Vec<Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["error"]["code"], -32700);
        assert_eq!(replies[1]["id"], Value::Null);
        assert_eq!(replies[2]["id"], "x");
        assert_eq!(replies[2]["result"]["content"][0]["text"], "hey");
        assert_eq!(replies[3]["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let dispatcher = Dispatcher::new(
            Registry::new(),
            Implementation {
                name: "t".into(),
                version: "0".into(),
            },
        );
        let (_client, server) = duplex(1024);
        let (r, w) = tokio::io::split(server);
        let token = CancellationToken::new();
        token.cancel();
        serve(&dispatcher, LineTransport::new(BufReader::new(r), w), token)
            .await
            .unwrap();
    }
}

//! Command line and environment configuration.

use crate::{error::Error, sandbox::Sandbox};
use clap::{Parser, ValueEnum};
use std::{net::SocketAddr, path::PathBuf};

/// Which transport the server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Line-delimited JSON-RPC on stdin/stdout.
    Stdio,
    /// HTTP with server-sent events.
    Sse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Filesystem MCP server confined to a set of allowed directories.
#[derive(Parser, Debug)]
#[command(name = "mcpd-filesystem", version, about)]
pub struct Cli {
    /// Transport to serve on.
    #[arg(long, value_enum, env = "MCP_SERVER_MODE", default_value = "stdio", ignore_case = true)]
    pub mode: Mode,

    /// Listen address for the SSE transport.
    #[arg(long, env = "MCP_LISTEN_ADDR", default_value = "0.0.0.0:38085")]
    pub listen: SocketAddr,

    /// Minimum level of diagnostics written to stderr.
    #[arg(long, value_enum, env = "LOG_LEVEL", default_value = "INFO", ignore_case = true)]
    pub log_level: LogLevel,

    /// Directories the server may access.
    #[arg(required = true, num_args = 1..)]
    pub allowed_dirs: Vec<String>,
}

/// Validated server configuration.
#[derive(Debug)]
pub struct Config {
    pub mode: Mode,
    pub listen: SocketAddr,
    pub log_level: LogLevel,
    pub sandbox: Sandbox,
}

impl Cli {
    /// Validate the allowed directories relative to `base_dir`, the
    /// process's starting directory.
    pub fn into_config(self, base_dir: PathBuf) -> Result<Config, Error> {
        if self.allowed_dirs.is_empty() {
            return Err(Error::NoRoots);
        }
        let sandbox = Sandbox::new(&self.allowed_dirs, base_dir)?;
        Ok(Config {
            mode: self.mode,
            listen: self.listen,
            log_level: self.log_level,
            sandbox,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["mcpd-filesystem", "/tmp"]).unwrap();
        assert_eq!(cli.allowed_dirs, ["/tmp"]);
        assert_eq!(cli.listen, "0.0.0.0:38085".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn flags_are_case_insensitive() {
        let cli = Cli::try_parse_from([
            "mcpd-filesystem",
            "--mode",
            "SSE",
            "--log-level",
            "debug",
            "--listen",
            "127.0.0.1:9000",
            "a",
            "b",
        ])
        .unwrap();
        assert_eq!(cli.mode, Mode::Sse);
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert_eq!(cli.listen.port(), 9000);
        assert_eq!(cli.allowed_dirs, ["a", "b"]);
    }

    #[test]
    fn roots_are_required() {
        let err = Cli::try_parse_from(["mcpd-filesystem", "--mode", "stdio"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn unknown_level_is_rejected() {
        let err = Cli::try_parse_from(["mcpd-filesystem", "--log-level", "loud", "/tmp"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn into_config_resolves_relative_roots() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        let cli = Cli::try_parse_from(["mcpd-filesystem", "--mode", "stdio", "data"]).unwrap();
        let config = cli.into_config(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.sandbox.roots()[0].path(), dir.path().join("data"));
    }

    #[test]
    fn into_config_rejects_missing_root() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::try_parse_from(["mcpd-filesystem", "--mode", "stdio", "absent"]).unwrap();
        let err = cli.into_config(dir.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, Error::Root(_)));
    }
}

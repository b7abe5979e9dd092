//! HTTP + server-sent events transport.
//!
//! `GET /sse` opens a session and streams reply frames as `message` events.
//! The first event is `endpoint`, naming the URL the client posts its
//! requests to: `POST /message?sessionId=<id>`. Each session runs its own
//! sequential dispatch loop; sessions run concurrently.

use super::Transport;
use crate::dispatch::{Dispatcher, serve};
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use std::{
    collections::HashMap,
    convert::Infallible,
    io,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

pub const SSE_PATH: &str = "/sse";
pub const MESSAGE_PATH: &str = "/message";

/// Frames buffered per direction before the producer waits.
const CHANNEL_CAPACITY: usize = 64;

/// Session side of an SSE connection: frames posted by the client come in on
/// `inbound`, replies go out on `outbound` to the event stream.
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<String>,
}

impl ChannelTransport {
    pub fn new(inbound: mpsc::Receiver<String>, outbound: mpsc::Sender<String>) -> Self {
        Self { inbound, outbound }
    }
}

impl Transport for ChannelTransport {
    async fn read_frame(&mut self) -> io::Result<Option<String>> {
        // A dropped event stream ends the session even if no request is pending.
        tokio::select! {
            frame = self.inbound.recv() => Ok(frame),
            _ = self.outbound.closed() => Ok(None),
        }
    }

    async fn write_frame(&mut self, frame: &str) -> io::Result<()> {
        self.outbound
            .send(frame.to_string())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "event stream closed"))
    }
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<Mutex<HashMap<String, mpsc::Sender<String>>>>,
    shutdown: CancellationToken,
}

impl AppState {
    fn insert(&self, id: String, sender: mpsc::Sender<String>) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sender);
    }

    fn sender(&self, id: &str) -> Option<mpsc::Sender<String>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn remove(&self, id: &str) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}

/// HTTP server hosting one dispatch loop per SSE session.
pub struct SseServer {
    state: AppState,
}

impl SseServer {
    pub fn new(dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) -> Self {
        Self {
            state: AppState {
                dispatcher,
                sessions: Arc::default(),
                shutdown,
            },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(SSE_PATH, get(open_session))
            .route(MESSAGE_PATH, post(post_message))
            .with_state(self.state.clone())
    }

    /// Serve until the shutdown token fires.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        info!(addr = %listener.local_addr()?, "SSE transport listening");
        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    }
}

async fn open_session(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let id = Uuid::new_v4().to_string();
    let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    state.insert(id.clone(), inbound_tx);
    info!(session = %id, "SSE session opened");

    let worker = state.clone();
    let session = id.clone();
    tokio::spawn(async move {
        let transport = ChannelTransport::new(inbound_rx, outbound_tx);
        if let Err(e) = serve(&worker.dispatcher, transport, worker.shutdown.clone()).await {
            debug!(session = %session, "session transport closed: {e}");
        }
        worker.remove(&session);
        info!(session = %session, "SSE session closed");
    });

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{MESSAGE_PATH}?sessionId={id}"));
    let frames = stream::unfold(outbound_rx, |mut rx| async move {
        let frame = rx.recv().await?;
        Some((
            Ok::<_, Infallible>(Event::default().event("message").data(frame)),
            rx,
        ))
    });
    Sse::new(stream::once(async move { Ok::<_, Infallible>(endpoint) }).chain(frames))
        .keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: String,
) -> StatusCode {
    let Some(sender) = state.sender(&query.session_id) else {
        return StatusCode::NOT_FOUND;
    };
    match sender.send(body).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            state.remove(&query.session_id);
            StatusCode::GONE
        }
    }
}

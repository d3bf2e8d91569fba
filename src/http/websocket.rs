//! WebSocket echo.
//!
//! # Responsibilities
//! - Upgrade `/websocket` requests
//! - Echo every text or binary frame back with the same frame type
//! - Keep the session alive with pings and close it when pongs stop
//!
//! # Data Flow
//! ```text
//! client ──frames──→ read loop ──same frame──→ shared writer ──→ client
//!                        ↑                          ↑
//!                   pong extends              heartbeat task
//!                   read deadline             sends pings
//! ```
//!
//! # Design Decisions
//! - Reads and writes run concurrently; the writer is shared behind a
//!   mutex so pings and echoes never interleave mid-frame
//! - The read deadline only moves when a pong arrives
//! - The heartbeat task is cancelled when the read loop exits
//! - A peer close frame is answered before the socket is dropped

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use opentelemetry::trace::{SpanKind, TraceContextExt};
use opentelemetry::{Context, KeyValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::WebSocketConfig;
use crate::http::request::RequestContext;
use crate::http::server::AppState;

/// Close code for a normal closure.
const CLOSE_NORMAL: u16 = 1000;

type Writer = Arc<Mutex<SplitSink<WebSocket, Message>>>;

pub async fn upgrade(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ws: WebSocketUpgrade,
) -> Response {
    let trace = state
        .telemetry
        .tracing()
        .start("websocket.session", SpanKind::Server, &ctx.trace);
    let session = EchoSession::new(&state.config.websocket, trace);
    let span = tracing::Span::current();

    ws.on_failed_upgrade(|e| tracing::error!(error = %e, "Failed to upgrade connection."))
        .on_upgrade(move |socket| session.run(socket).instrument(span))
}

/// One upgraded connection.
pub struct EchoSession {
    ping_interval: Duration,
    read_timeout: Duration,
    trace: Context,
}

impl EchoSession {
    pub fn new(config: &WebSocketConfig, trace: Context) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            read_timeout: config.read_timeout(),
            trace,
        }
    }

    pub async fn run(self, socket: WebSocket) {
        tracing::debug!("WebSocket session opened.");
        let (writer, reader) = socket.split();
        let writer: Writer = Arc::new(Mutex::new(writer));
        let done = CancellationToken::new();

        let heartbeat = tokio::spawn(
            heartbeat(writer.clone(), self.ping_interval, done.clone())
                .instrument(tracing::Span::current()),
        );

        let echoed = self.echo(reader, &writer, &done).await;

        done.cancel();
        if let Err(e) = heartbeat.await {
            tracing::warn!(error = %e, "Heartbeat task failed.");
        }

        let span = self.trace.span();
        span.set_attribute(KeyValue::new("websocket.messages", echoed as i64));
        span.end();
        tracing::debug!(messages = echoed, "WebSocket session closed.");
    }

    /// Read loop. Returns the number of frames echoed.
    async fn echo(&self, mut reader: SplitStream<WebSocket>, writer: &Writer, done: &CancellationToken) -> u64 {
        let mut deadline = Instant::now() + self.read_timeout;
        let mut echoed = 0;

        loop {
            let next = tokio::select! {
                _ = done.cancelled() => break,
                next = tokio::time::timeout_at(deadline, reader.next()) => next,
            };

            let message = match next {
                Err(_) => {
                    tracing::debug!("Read deadline exceeded.");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::error!(error = %e, "Failed to read message.");
                    break;
                }
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(_) | Message::Binary(_) => {
                    self.trace.span().add_event("message", vec![]);
                    if let Err(e) = writer.lock().await.send(message).await {
                        tracing::error!(error = %e, "Failed to write message.");
                        break;
                    }
                    echoed += 1;
                }
                Message::Pong(_) => {
                    deadline = Instant::now() + self.read_timeout;
                    tracing::trace!("Received pong.");
                }
                Message::Ping(_) => {}
                Message::Close(frame) => {
                    log_close(frame.as_ref());
                    complete_close(writer, frame).await;
                    break;
                }
            }
        }

        echoed
    }
}

fn log_close(frame: Option<&CloseFrame>) {
    match frame {
        Some(frame) if frame.code != CLOSE_NORMAL => {
            tracing::error!(code = frame.code, reason = frame.reason.as_str(), "Unexpected close.")
        }
        _ => tracing::debug!("Client closed the session."),
    }
}

/// Answer the peer's close frame so the closing handshake completes.
async fn complete_close(writer: &Writer, frame: Option<CloseFrame>) {
    let mut writer = writer.lock().await;
    // The socket reports itself closed once the reply is flushed.
    if let Err(e) = writer.send(Message::Close(frame)).await {
        tracing::debug!(error = %e, "Close reply flushed.");
    }
    if let Err(e) = writer.close().await {
        tracing::debug!(error = %e, "Socket already closed.");
    }
}

async fn heartbeat(writer: Writer, interval: Duration, done: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = done.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = writer.lock().await.send(Message::Ping(Bytes::new())).await {
                    tracing::error!(error = %e, "Failed to send ping.");
                    done.cancel();
                    break;
                }
                tracing::trace!("Sent ping.");
            }
        }
    }
}

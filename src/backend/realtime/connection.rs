//! Per-connection task
//!
//! Runs for the lifetime of one admitted socket. The socket is split: a
//! writer task drains the connection's bounded outbound queue into the sink,
//! while this task reads inbound frames. Whatever ends the read side (close
//! frame, EOF, transport error) leads to the same `remove` call.

use crate::backend::auth::sessions::Session;
use crate::backend::realtime::registry::{ConnectionHandle, ConnectionRegistry, Outbound};
use crate::shared::{Envelope, Payload};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

/// Drive one authenticated socket until it closes
pub async fn run_connection(
    socket: WebSocket,
    registry: ConnectionRegistry,
    session: Session,
    outbound_buffer: usize,
) {
    let handle = ConnectionHandle::new();
    let (sink, mut stream) = socket.split();
    let rx = register(&registry, handle, session, outbound_buffer);

    let writer = tokio::spawn(writer_task(sink, rx));

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_text(&registry, handle, text.as_str()),
            Ok(Message::Close(frame)) => {
                tracing::debug!(%handle, ?frame, "[Realtime] Close frame received");
                break;
            }
            // Transport-level ping/pong is answered by axum; binary is not part of the protocol.
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(%handle, "[Realtime] WebSocket error: {}", e);
                break;
            }
        }
    }

    registry.remove(handle);
    writer.abort();
}

/// Queue the `connected` frame, then admit; broadcasts can only land behind it
fn register(
    registry: &ConnectionRegistry,
    handle: ConnectionHandle,
    session: Session,
    outbound_buffer: usize,
) -> mpsc::Receiver<Outbound> {
    let (tx, rx) = mpsc::channel::<Outbound>(outbound_buffer.max(1));

    match Envelope::connected(session.family_id).to_json() {
        Ok(text) => {
            if tx.try_send(Outbound::Text(text)).is_err() {
                tracing::warn!(%handle, "[Realtime] Could not queue connected frame");
            }
        }
        Err(e) => tracing::error!(%handle, "[Realtime] Failed to encode connected frame: {}", e),
    }

    registry.admit(handle, session.family_id, session.user_id, tx);
    rx
}

async fn writer_task(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Outbound>) {
    while let Some(frame) = rx.recv().await {
        let (message, closing) = match frame {
            Outbound::Text(text) => (Message::Text(text.into()), false),
            Outbound::Close { code, reason } => (
                Message::Close(Some(CloseFrame {
                    code,
                    reason: reason.into(),
                })),
                true,
            ),
        };

        if let Err(e) = sink.send(message).await {
            tracing::debug!("[Realtime] Writer stopped: {}", e);
            return;
        }
        if closing {
            return;
        }
    }
}

/// React to one inbound text frame
fn handle_text(registry: &ConnectionRegistry, handle: ConnectionHandle, text: &str) {
    let envelope = match Envelope::from_json(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(%handle, "[Realtime] Dropping malformed frame: {}", e);
            return;
        }
    };

    match envelope.payload {
        Payload::Ping => {
            registry.send_to(handle, &Envelope::pong());
        }
        Payload::Subscribe(channel) => {
            tracing::debug!(%handle, ?channel, "[Realtime] Client subscribed");
        }
        other => {
            tracing::warn!(%handle, kind = %other.kind(), "[Realtime] Unknown message type");
        }
    }
}

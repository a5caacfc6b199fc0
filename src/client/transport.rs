//! # Transport Seam
//!
//! The agent never touches a socket directly. A [`Connector`] opens one
//! transport per attempt and reports what happens on it through
//! [`TransportCallbacks`]; the agent writes through the returned
//! [`OutboundFrames`] sender. Dropping that sender closes the transport.
//!
//! [`TungsteniteConnector`] is the production implementation.

use crate::client::agent::Internal;
use crate::client::error::ClientError;
use crate::shared::config::SESSION_COOKIE;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::COOKIE, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

/// Text frames the agent wants written to the open transport
pub type OutboundFrames = mpsc::UnboundedSender<String>;

/// Where and how to open one transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub endpoint: String,
    pub session_cookie: Option<String>,
}

/// What an open transport can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound text frame, unparsed
    Message(String),
    /// The peer closed, or the stream ended (`code` is `None` then)
    Closed { code: Option<u16>, reason: String },
    /// The transport failed after opening
    Error(String),
}

/// Reporting handle given to a connector for one attempt
///
/// Every event is tagged with the attempt it belongs to, so reports from a
/// transport the agent has already given up on are discarded.
#[derive(Debug, Clone)]
pub struct TransportCallbacks {
    epoch: u64,
    tx: mpsc::UnboundedSender<Internal>,
}

impl TransportCallbacks {
    pub(crate) fn new(epoch: u64, tx: mpsc::UnboundedSender<Internal>) -> Self {
        Self { epoch, tx }
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    pub fn closed(&self, code: Option<u16>, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(TransportEvent::Error(message.into()));
    }

    fn emit(&self, event: TransportEvent) {
        // The agent may already be gone
        let _ = self.tx.send(Internal::Transport {
            epoch: self.epoch,
            event,
        });
    }
}

/// Opens transports for the reconnection agent
pub trait Connector: Send + Sync + 'static {
    /// Open a transport
    ///
    /// Resolves once the transport is open. Afterwards every inbound frame
    /// and the single terminal event (close or error) go to `callbacks`.
    fn connect(
        &self,
        request: ConnectRequest,
        callbacks: TransportCallbacks,
    ) -> BoxFuture<'static, Result<OutboundFrames, ClientError>>;
}

/// WebSocket transport over `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn connect(
        &self,
        request: ConnectRequest,
        callbacks: TransportCallbacks,
    ) -> BoxFuture<'static, Result<OutboundFrames, ClientError>> {
        Box::pin(async move {
            let mut upgrade = request
                .endpoint
                .as_str()
                .into_client_request()
                .map_err(|e| ClientError::connect(e.to_string()))?;

            if let Some(session_id) = &request.session_cookie {
                let cookie = HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, session_id))
                    .map_err(|e| ClientError::connect(format!("invalid session cookie: {}", e)))?;
                upgrade.headers_mut().insert(COOKIE, cookie);
            }

            let (stream, _response) = connect_async(upgrade)
                .await
                .map_err(|e| ClientError::connect(e.to_string()))?;
            tracing::debug!(endpoint = %request.endpoint, "[Transport] WebSocket open");

            let (mut write, mut read) = stream.split();
            let (tx, mut rx) = mpsc::unbounded_channel::<String>();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        outgoing = rx.recv() => match outgoing {
                            Some(text) => {
                                if let Err(e) = write.send(Message::Text(text.into())).await {
                                    callbacks.error(e.to_string());
                                    return;
                                }
                            }
                            None => {
                                // Sender dropped: the agent is done with this transport
                                let _ = write.send(Message::Close(None)).await;
                                return;
                            }
                        },
                        incoming = read.next() => match incoming {
                            Some(Ok(Message::Text(text))) => callbacks.message(text.as_str()),
                            Some(Ok(Message::Close(frame))) => {
                                let (code, reason) = frame
                                    .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_owned()))
                                    .unwrap_or((None, String::new()));
                                callbacks.closed(code, reason);
                                return;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                callbacks.error(e.to_string());
                                return;
                            }
                            None => {
                                callbacks.closed(None, "");
                                return;
                            }
                        },
                    }
                }
            });

            Ok(tx)
        })
    }
}

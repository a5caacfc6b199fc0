//! # Client Reconnection Agent
//!
//! Keeps one best-effort connection from a device to `/api/ws` and exposes
//! a status plus an event stream to the application.
//!
//! ## State Machine
//!
//! ```text
//! disconnected ──connect()──▶ connecting ──open──▶ connected
//!      ▲                          │                   │
//!      │                        error            close / error
//!      │                          ▼                   ▼
//!      └──── retry timer ◀──── error / disconnected ◀─┘
//! ```
//!
//! Retries are spaced by [`BackoffPolicy`]. Once the budget is spent the
//! status stays `Error` until the caller invokes `connect()` again.
//!
//! ## Concurrency
//!
//! One tokio task owns all agent state. Commands from [`AgentHandle`],
//! transport reports and timer firings arrive as messages and are handled
//! one at a time, so no two handlers ever run concurrently. Each attempt
//! gets a new epoch; reports carrying an older epoch are dropped.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use homesync::client::{AgentEvent, ReconnectionAgent, TungsteniteConnector};
//! use homesync::shared::AgentConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::builder()
//!     .server_url("https://home.example")
//!     .session_cookie("3f2c0d9e-6a8b-4a43-9f51-0c1d2e3f4a5b")
//!     .build()?;
//!
//! let (agent, mut events) = ReconnectionAgent::spawn(config, TungsteniteConnector);
//! agent.connect()?;
//!
//! while let Some(event) = events.recv().await {
//!     if let AgentEvent::Message(envelope) = event {
//!         println!("refresh after {}", envelope.kind());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::backoff::BackoffPolicy;
use crate::client::error::ClientError;
use crate::client::transport::{
    ConnectRequest, Connector, OutboundFrames, TransportCallbacks, TransportEvent,
};
use crate::shared::{AgentConfig, Envelope};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Connection status published to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifications delivered through [`AgentEvents`]
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A transport opened
    Connected,
    /// The transport closed, or the caller disconnected
    Disconnected,
    /// An attempt or an open transport failed
    Error(String),
    /// A well-formed envelope from the server, forwarded verbatim
    Message(Envelope),
    /// A retry will start after `delay`; `attempt` counts from 1
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// The retry budget is spent; only `connect()` starts a new cycle
    ReconnectExhausted,
}

enum Command {
    Connect,
    Disconnect,
    Send(Envelope),
    SetSession(Option<String>),
}

/// Messages the agent sends to itself
#[derive(Debug)]
pub(crate) enum Internal {
    Opened { epoch: u64, outbound: OutboundFrames },
    ConnectFailed { epoch: u64, error: ClientError },
    Transport { epoch: u64, event: TransportEvent },
    RetryDue { epoch: u64 },
}

/// Cloneable control surface of a running agent
///
/// The agent task stops once every handle is dropped.
#[derive(Clone)]
pub struct AgentHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl AgentHandle {
    /// Connect unless already connecting or connected
    ///
    /// Starts a fresh backoff cycle and cancels any pending retry.
    pub fn connect(&self) -> Result<(), ClientError> {
        self.command(Command::Connect)
    }

    /// Close the transport and stop reconnecting
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.command(Command::Disconnect)
    }

    /// Send an envelope; dropped with a warning if not connected
    pub fn send(&self, envelope: Envelope) -> Result<(), ClientError> {
        self.command(Command::Send(envelope))
    }

    /// Send a `ping`; the server answers with `pong`
    pub fn ping(&self) -> Result<(), ClientError> {
        self.send(Envelope::ping())
    }

    /// Replace the session credential used by later attempts
    pub fn set_session_cookie(&self, session_id: Option<String>) -> Result<(), ClientError> {
        self.command(Command::SetSession(session_id))
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    fn command(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::AgentStopped)
    }
}

/// Stream of [`AgentEvent`]s, in the order the agent produced them
pub struct AgentEvents {
    rx: mpsc::UnboundedReceiver<AgentEvent>,
}

impl AgentEvents {
    pub async fn recv(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<AgentEvent> {
        self.rx.try_recv().ok()
    }
}

impl futures_util::Stream for AgentEvents {
    type Item = AgentEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<AgentEvent>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// State owned by the agent task
pub struct ReconnectionAgent {
    config: AgentConfig,
    policy: BackoffPolicy,
    connector: Arc<dyn Connector>,
    internal: mpsc::UnboundedSender<Internal>,
    status: watch::Sender<ConnectionStatus>,
    events: mpsc::UnboundedSender<AgentEvent>,
    epoch: u64,
    attempts: u32,
    intentional: bool,
    outbound: Option<OutboundFrames>,
    /// Reports that arrived before their attempt finished opening
    early: Vec<TransportEvent>,
    pending_connect: Option<JoinHandle<()>>,
    retry_timer: Option<JoinHandle<()>>,
}

impl ReconnectionAgent {
    /// Start the agent task
    ///
    /// Must be called from within a tokio runtime. The agent starts
    /// `Disconnected`; nothing happens until `connect()`.
    pub fn spawn<C: Connector>(config: AgentConfig, connector: C) -> (AgentHandle, AgentEvents) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

        let agent = Self {
            policy: BackoffPolicy::from_config(&config),
            config,
            connector: Arc::new(connector),
            internal: internal_tx,
            status: status_tx,
            events: event_tx,
            epoch: 0,
            attempts: 0,
            intentional: false,
            outbound: None,
            early: Vec::new(),
            pending_connect: None,
            retry_timer: None,
        };
        tokio::spawn(agent.run(command_rx, internal_rx));

        let handle = AgentHandle {
            commands: command_tx,
            status: status_rx,
        };
        (handle, AgentEvents { rx: event_rx })
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(input) = internal.recv() => self.handle_internal(input),
            }
        }

        tracing::debug!("[Agent] All handles dropped, stopping");
        self.cancel_retry();
        if let Some(pending) = self.pending_connect.take() {
            pending.abort();
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                if matches!(
                    self.current_status(),
                    ConnectionStatus::Connecting | ConnectionStatus::Connected
                ) {
                    tracing::debug!("[Agent] Already {}, ignoring connect", self.current_status());
                    return;
                }
                self.intentional = false;
                self.attempts = 0;
                self.cancel_retry();
                self.begin_attempt();
            }
            Command::Disconnect => {
                self.intentional = true;
                self.cancel_retry();
                if let Some(pending) = self.pending_connect.take() {
                    pending.abort();
                }
                self.drop_transport();

                let previous = self.set_status(ConnectionStatus::Disconnected);
                if previous != ConnectionStatus::Disconnected {
                    tracing::info!("[Agent] Disconnected by caller");
                    self.emit(AgentEvent::Disconnected);
                }
            }
            Command::Send(envelope) => self.send(&envelope),
            Command::SetSession(session_id) => self.config.session_cookie = session_id,
        }
    }

    fn handle_internal(&mut self, input: Internal) {
        match input {
            Internal::Opened { epoch, outbound } => {
                if epoch != self.epoch {
                    // Dropping `outbound` closes the superseded transport
                    tracing::debug!("[Agent] Discarding transport from attempt {}", epoch);
                    return;
                }
                self.pending_connect = None;
                self.outbound = Some(outbound);
                self.attempts = 0;
                self.set_status(ConnectionStatus::Connected);
                tracing::info!(endpoint = %self.config.endpoint, "[Agent] Connected");
                self.emit(AgentEvent::Connected);

                for event in std::mem::take(&mut self.early) {
                    if self.epoch != epoch {
                        break;
                    }
                    self.handle_transport(event);
                }
            }
            Internal::ConnectFailed { epoch, error } => {
                if epoch != self.epoch {
                    return;
                }
                self.pending_connect = None;
                self.early.clear();
                self.fail(error.to_string());
            }
            Internal::Transport { epoch, event } => {
                if epoch != self.epoch {
                    return;
                }
                if self.outbound.is_none() {
                    self.early.push(event);
                    return;
                }
                self.handle_transport(event);
            }
            Internal::RetryDue { epoch } => {
                if epoch != self.epoch {
                    return;
                }
                self.retry_timer = None;
                if self.intentional
                    || matches!(
                        self.current_status(),
                        ConnectionStatus::Connecting | ConnectionStatus::Connected
                    )
                {
                    return;
                }
                self.begin_attempt();
            }
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => match Envelope::from_json(&text) {
                Ok(envelope) => self.emit(AgentEvent::Message(envelope)),
                Err(e) => tracing::warn!("[Agent] Failed to parse message: {}", e),
            },
            TransportEvent::Closed { code, reason } => {
                self.drop_transport();

                // Every close the caller did not ask for is retried, 1008 included
                tracing::info!(?code, %reason, "[Agent] Connection closed");
                self.set_status(ConnectionStatus::Disconnected);
                self.emit(AgentEvent::Disconnected);
                self.schedule_reconnect();
            }
            TransportEvent::Error(message) => {
                self.drop_transport();
                self.fail(ClientError::transport(message).to_string());
            }
        }
    }

    fn begin_attempt(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;
        self.early.clear();
        self.set_status(ConnectionStatus::Connecting);
        tracing::info!(endpoint = %self.config.endpoint, epoch, "[Agent] Connecting");

        let request = ConnectRequest {
            endpoint: self.config.endpoint.clone(),
            session_cookie: self.config.session_cookie.clone(),
        };
        let connecting = self
            .connector
            .connect(request, TransportCallbacks::new(epoch, self.internal.clone()));
        let internal = self.internal.clone();

        self.pending_connect = Some(tokio::spawn(async move {
            let input = match connecting.await {
                Ok(outbound) => Internal::Opened { epoch, outbound },
                Err(error) => Internal::ConnectFailed { epoch, error },
            };
            let _ = internal.send(input);
        }));
    }

    fn fail(&mut self, message: String) {
        tracing::warn!("[Agent] {}", message);
        self.set_status(ConnectionStatus::Error);
        self.emit(AgentEvent::Error(message));
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        self.cancel_retry();
        if self.intentional {
            return;
        }

        if !self.policy.allows(self.attempts) {
            tracing::error!(attempts = self.attempts, "[Agent] Max reconnect attempts reached");
            self.set_status(ConnectionStatus::Error);
            self.emit(AgentEvent::ReconnectExhausted);
            return;
        }

        let delay = self.policy.delay_for(self.attempts);
        self.attempts += 1;
        let attempt = self.attempts;
        let epoch = self.epoch;
        let internal = self.internal.clone();

        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "[Agent] Reconnect scheduled");
        self.retry_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal.send(Internal::RetryDue { epoch });
        }));
        self.emit(AgentEvent::ReconnectScheduled { attempt, delay });
    }

    fn cancel_retry(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }

    /// Forget the current transport; later reports from it are stale
    fn drop_transport(&mut self) {
        self.epoch += 1;
        self.outbound = None;
        self.early.clear();
    }

    fn send(&mut self, envelope: &Envelope) {
        let Some(outbound) = &self.outbound else {
            tracing::warn!(kind = %envelope.kind(), "[Agent] Cannot send message: not connected");
            return;
        };

        match envelope.to_json() {
            Ok(text) => {
                if outbound.send(text).is_err() {
                    tracing::warn!("[Agent] Transport gone, message dropped");
                }
            }
            Err(e) => tracing::warn!("[Agent] Failed to encode message: {}", e),
        }
    }

    fn current_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Publish a status, returning the previous one
    fn set_status(&self, status: ConnectionStatus) -> ConnectionStatus {
        let previous = self.status.send_replace(status);
        if previous != status {
            tracing::debug!("[Agent] Status {} -> {}", previous, status);
        }
        previous
    }

    fn emit(&self, event: AgentEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

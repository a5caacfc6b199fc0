//! Real server helpers
//!
//! Starts the actual router on `127.0.0.1:0` with a signed-token session
//! validator, and connects raw `tokio-tungstenite` clients to it.

use futures_util::{SinkExt, StreamExt};
use homesync::backend::auth::sessions::{JwtSessionValidator, SessionClaims, SessionValidator};
use homesync::backend::realtime::ConnectionRegistry;
use homesync::backend::routes::create_router;
use homesync::backend::server::AppState;
use homesync::shared::config::SESSION_COOKIE;
use homesync::shared::{Envelope, FamilyId, UserId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::COOKIE, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const TEST_SECRET: &str = "homesync-test-secret";
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running server and the state behind it
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub registry: ConnectionRegistry,
    tokens: JwtSessionValidator,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_validator(Arc::new(JwtSessionValidator::new(TEST_SECRET))).await
    }

    /// Serve with a custom validator; `token` still signs with `TEST_SECRET`
    pub async fn with_validator(sessions: Arc<dyn SessionValidator>) -> Self {
        let state = AppState::new(sessions);
        let registry = state.registry.clone();
        let app = create_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            registry,
            tokens: JwtSessionValidator::new(TEST_SECRET),
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/api/ws", self.addr)
    }

    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Session token for a family member
    pub fn token(&self, family: i64, user: i64) -> String {
        self.tokens
            .issue(&SessionClaims::new(
                FamilyId(family),
                Some(UserId(user)),
                Duration::from_secs(3600),
            ))
            .unwrap()
    }

    /// Open a socket carrying `session` as the session cookie, if any
    pub async fn open(&self, session: Option<&str>) -> WsClient {
        let mut request = self.ws_url().into_client_request().unwrap();
        if let Some(session) = session {
            request.headers_mut().insert(
                COOKIE,
                HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, session)).unwrap(),
            );
        }
        let (ws, _response) = connect_async(request).await.unwrap();
        ws
    }

    /// Open an authenticated socket and wait for its `connected` frame
    pub async fn join(&self, family: i64, user: i64) -> WsClient {
        let token = self.token(family, user);
        let mut ws = self.open(Some(&token)).await;
        let welcome = next_envelope(&mut ws).await;
        crate::assert_kind!(welcome, "connected");
        ws
    }

    /// Wait until the registry holds exactly `expected` connections
    pub async fn wait_for_clients(&self, expected: usize) {
        let registry = self.registry.clone();
        tokio::time::timeout(FRAME_TIMEOUT, async move {
            while registry.len() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "registry never reached {} clients (has {})",
                expected,
                self.registry.len()
            )
        });
    }
}

/// Next text frame, parsed; panics on timeout or close
pub async fn next_envelope(ws: &mut WsClient) -> Envelope {
    loop {
        let frame = tokio::time::timeout(FRAME_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        match frame {
            Message::Text(text) => return Envelope::from_json(text.as_str()).unwrap(),
            Message::Close(frame) => panic!("socket closed: {:?}", frame),
            _ => continue,
        }
    }
}

/// Next close frame; panics if a text frame arrives first
pub async fn expect_close(ws: &mut WsClient) -> Option<CloseFrame> {
    loop {
        let frame = tokio::time::timeout(FRAME_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for close");
        match frame {
            Some(Ok(Message::Close(frame))) => {
                // Polling once more flushes our close reply to the server
                let _ = tokio::time::timeout(FRAME_TIMEOUT, ws.next()).await;
                return frame;
            }
            Some(Ok(Message::Text(text))) => panic!("expected close, got {}", text),
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}

/// Send a ping envelope and return the reply
pub async fn round_trip_ping(ws: &mut WsClient) -> Envelope {
    ws.send(Message::Text(Envelope::ping().to_json().unwrap().into()))
        .await
        .unwrap();
    next_envelope(ws).await
}

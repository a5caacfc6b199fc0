//! Session collaborator integration tests
//!
//! Runs the router against an in-memory session store so tests can revoke
//! sessions and make the store fail.

use crate::common::{expect_close, next_envelope, FRAME_TIMEOUT};
use futures_util::future::BoxFuture;
use homesync::backend::auth::sessions::{Session, SessionValidator};
use homesync::backend::error::BackendError;
use homesync::backend::realtime::gate::{authorize, GateRejection};
use homesync::backend::routes::create_router;
use homesync::backend::server::AppState;
use homesync::shared::config::{CLOSE_POLICY_VIOLATION, SESSION_COOKIE};
use homesync::shared::{FamilyId, UserId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::COOKIE, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

#[derive(Default)]
struct MemorySessions {
    sessions: Mutex<HashMap<String, Session>>,
    failing: AtomicBool,
}

impl MemorySessions {
    fn insert(&self, id: &str, family: i64, user: i64) {
        self.sessions.lock().unwrap().insert(
            id.to_string(),
            Session {
                family_id: FamilyId(family),
                user_id: Some(UserId(user)),
            },
        );
    }

    fn revoke(&self, id: &str) {
        self.sessions.lock().unwrap().remove(id);
    }
}

impl SessionValidator for MemorySessions {
    fn validate<'a>(
        &'a self,
        credential: &'a str,
    ) -> BoxFuture<'a, Result<Option<Session>, BackendError>> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(BackendError::session("store unavailable"));
            }
            Ok(self.sessions.lock().unwrap().get(credential).copied())
        })
    }
}

async fn serve(sessions: Arc<MemorySessions>) -> (SocketAddr, AppState) {
    let state = AppState::new(sessions);
    let app = create_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn open(addr: SocketAddr, session: &str) -> crate::common::WsClient {
    let mut request = format!("ws://{}/api/ws", addr).into_client_request().unwrap();
    request.headers_mut().insert(
        COOKIE,
        HeaderValue::from_str(&format!("theme=dark; {}={}", SESSION_COOKIE, session)).unwrap(),
    );
    let (ws, _) = tokio_tungstenite::connect_async(request).await.unwrap();
    ws
}

#[tokio::test]
async fn test_session_id_cookie_among_others() {
    let sessions = Arc::new(MemorySessions::default());
    sessions.insert("abc", 11, 1);
    let (addr, state) = serve(sessions).await;

    let mut ws = open(addr, "abc").await;
    crate::assert_kind!(next_envelope(&mut ws).await, "connected");

    let members = state.registry.connections_of(FamilyId(11));
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, Some(UserId(1)));
}

#[tokio::test]
async fn test_revoked_session_keeps_open_socket_but_blocks_new_ones() {
    let sessions = Arc::new(MemorySessions::default());
    sessions.insert("abc", 11, 1);
    let (addr, state) = serve(sessions.clone()).await;

    let mut first = open(addr, "abc").await;
    crate::assert_kind!(next_envelope(&mut first).await, "connected");

    sessions.revoke("abc");
    let mut second = open(addr, "abc").await;
    let frame = expect_close(&mut second).await.expect("close frame");
    assert_eq!(frame.code, CloseCode::from(CLOSE_POLICY_VIOLATION));

    // Admission is checked once per upgrade
    crate::assert_kind!(crate::common::round_trip_ping(&mut first).await, "pong");
    assert_eq!(state.registry.len(), 1);
}

#[tokio::test]
async fn test_validator_failure_refuses_upgrade() {
    let sessions = Arc::new(MemorySessions::default());
    sessions.insert("abc", 11, 1);
    sessions.failing.store(true, Ordering::SeqCst);
    let (addr, state) = serve(sessions).await;

    let mut ws = open(addr, "abc").await;
    let frame = tokio::time::timeout(FRAME_TIMEOUT, expect_close(&mut ws))
        .await
        .unwrap()
        .expect("close frame");
    assert_eq!(frame.code, CloseCode::Policy);
    assert_eq!(frame.reason.as_str(), "Unauthorized");
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn test_authorize_outcomes() {
    let sessions = MemorySessions::default();
    sessions.insert("abc", 11, 1);

    assert_eq!(
        authorize(&sessions, None).await,
        Err(GateRejection::MissingCredential)
    );
    assert_eq!(
        authorize(&sessions, Some("nope")).await,
        Err(GateRejection::InvalidCredential)
    );
    assert_eq!(
        authorize(&sessions, Some("abc")).await.unwrap().family_id,
        FamilyId(11)
    );

    sessions.failing.store(true, Ordering::SeqCst);
    assert!(matches!(
        authorize(&sessions, Some("abc")).await,
        Err(GateRejection::ValidatorFailed(_))
    ));
}

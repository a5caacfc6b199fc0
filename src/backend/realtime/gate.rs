/**
 * Upgrade Gate
 *
 * Decides whether an inbound `GET /api/ws` upgrade becomes a registered
 * connection.
 *
 * # Credential
 *
 * The session id travels in the `sessionId` cookie, as set by the REST
 * login flow. Clients that cannot set cookies may pass it as `?token=`.
 *
 * # Outcome
 *
 * - No credential, or the validator does not recognize it: the socket is
 *   upgraded and immediately closed with 1008 (policy violation). Nothing is
 *   added to the registry.
 * - Validator failure: treated the same way, logged at error level.
 * - Valid session: the connection task is started with the session's
 *   family and user ids and admits itself into the registry.
 *
 * The server never retries a rejected attempt; retrying is the client's job.
 */

use crate::backend::auth::sessions::{Session, SessionValidator};
use crate::backend::realtime::connection::run_connection;
use crate::backend::server::state::AppState;
use crate::shared::config::{CLOSE_POLICY_VIOLATION, SESSION_COOKIE};
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocketUpgrade},
        Query, State,
    },
    http::{header::COOKIE, HeaderMap},
    response::Response,
};
use serde::Deserialize;
use thiserror::Error;

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Session credential for clients that cannot send cookies
    pub token: Option<String>,
}

/// Why an upgrade was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateRejection {
    #[error("no session credential presented")]
    MissingCredential,
    #[error("session credential is invalid or expired")]
    InvalidCredential,
    #[error("session validation failed: {0}")]
    ValidatorFailed(String),
}

/// Pull the session credential out of the request
///
/// The cookie wins over the query parameter. Empty values count as absent.
pub fn extract_credential(headers: &HeaderMap, query: &WsQuery) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string());

    from_cookie
        .or_else(|| query.token.clone())
        .filter(|credential| !credential.is_empty())
}

/// Validate a credential against the session collaborator
pub async fn authorize(
    validator: &dyn SessionValidator,
    credential: Option<&str>,
) -> Result<Session, GateRejection> {
    let credential = credential.ok_or(GateRejection::MissingCredential)?;

    match validator.validate(credential).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(GateRejection::InvalidCredential),
        Err(e) => {
            tracing::error!("[Gate] Session validator failed: {}", e);
            Err(GateRejection::ValidatorFailed(e.to_string()))
        }
    }
}

/// GET /api/ws
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credential = extract_credential(&headers, &query);

    match authorize(state.sessions.as_ref(), credential.as_deref()).await {
        Ok(session) => {
            tracing::debug!(
                family_id = %session.family_id,
                "[Gate] Upgrade authorized"
            );
            let registry = state.registry.clone();
            let buffer = state.outbound_buffer;
            ws.on_upgrade(move |socket| run_connection(socket, registry, session, buffer))
        }
        Err(rejection) => {
            tracing::warn!("[Gate] WebSocket connection rejected: {}", rejection);
            ws.on_upgrade(|mut socket| async move {
                let close = CloseFrame {
                    code: CLOSE_POLICY_VIOLATION,
                    reason: "Unauthorized".into(),
                };
                let _ = socket.send(Message::Close(Some(close))).await;
            })
        }
    }
}

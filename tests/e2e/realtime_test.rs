//! End-to-end tests of the server side: gate, registry and broadcast over
//! real sockets.

use crate::common::*;
use futures_util::SinkExt;
use homesync::backend::realtime::{broadcast_event, notify_change};
use homesync::backend::routes::create_router;
use homesync::shared::config::CLOSE_POLICY_VIOLATION;
use homesync::shared::{Change, Envelope, FamilyId, Payload, Resource};
use pretty_assertions::assert_eq;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_connected_frame_names_family() {
    let server = TestServer::start().await;
    let token = server.token(42, 1);
    let mut ws = server.open(Some(&token)).await;

    let welcome = next_envelope(&mut ws).await;
    match welcome.payload {
        Payload::Connected(connected) => assert_eq!(connected.family_id, FamilyId(42)),
        other => panic!("Expected connected, got {:?}", other),
    }
    assert_eq!(server.registry.len(), 1);
}

#[tokio::test]
async fn test_broadcast_reaches_only_the_family() {
    let server = TestServer::start().await;
    let mut first = server.join(42, 1).await;
    let mut second = server.join(42, 2).await;
    let mut other_family = server.join(7, 3).await;

    let envelope = Envelope::from_json(r#"{"type":"grocery:added","payload":{"id":1}}"#).unwrap();
    assert_eq!(broadcast_event(&server.registry, FamilyId(42), &envelope), 2);

    for ws in [&mut first, &mut second] {
        let received = next_envelope(ws).await;
        assert_eq!(
            serde_json::to_value(&received).unwrap(),
            serde_json::json!({"type": "grocery:added", "payload": {"id": 1}})
        );
    }

    // Frames are delivered in order, so a pong first means nothing else was queued
    crate::assert_kind!(round_trip_ping(&mut other_family).await, "pong");

    let mut late = server.join(42, 4).await;
    crate::assert_kind!(round_trip_ping(&mut late).await, "pong");
}

#[tokio::test]
async fn test_missing_credential_is_refused() {
    let server = TestServer::start().await;
    let mut ws = server.open(None).await;

    let frame = expect_close(&mut ws).await.expect("close frame");
    assert_eq!(frame.code, CloseCode::from(CLOSE_POLICY_VIOLATION));
    assert_eq!(frame.reason.as_str(), "Unauthorized");
    assert_eq!(server.registry.len(), 0);
}

#[tokio::test]
async fn test_invalid_credential_is_refused() {
    let server = TestServer::start().await;
    let _member = server.join(42, 1).await;

    let mut forged = server.open(Some("not-a-session")).await;
    let frame = expect_close(&mut forged).await.expect("close frame");
    assert_eq!(frame.code, CloseCode::Policy);

    let foreign = homesync::backend::auth::sessions::JwtSessionValidator::new("other-secret")
        .issue(&homesync::backend::auth::sessions::SessionClaims::new(
            FamilyId(42),
            None,
            std::time::Duration::from_secs(60),
        ))
        .unwrap();
    let mut wrong_key = server.open(Some(&foreign)).await;
    assert!(expect_close(&mut wrong_key).await.is_some());

    assert_eq!(server.registry.len(), 1);
}

#[tokio::test]
async fn test_token_query_parameter_is_accepted() {
    let server = TestServer::start().await;
    let url = format!("{}?token={}", server.ws_url(), server.token(9, 1));
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    crate::assert_kind!(next_envelope(&mut ws).await, "connected");
    assert_eq!(server.registry.len(), 1);
}

#[tokio::test]
async fn test_closed_connection_leaves_registry() {
    let server = TestServer::start().await;
    let mut staying = server.join(42, 1).await;
    let mut leaving = server.join(42, 2).await;
    server.wait_for_clients(2).await;

    leaving.close(None).await.unwrap();
    server.wait_for_clients(1).await;

    let delivered = notify_change(
        &server.registry,
        FamilyId(42),
        Resource::Grocery,
        Change::Deleted { id: 5 },
    );
    assert_eq!(delivered, 1);
    crate::assert_kind!(next_envelope(&mut staying).await, "grocery:deleted");

    let stats = server.registry.stats();
    assert_eq!(stats.total_clients, 1);
    assert_eq!(stats.family_groups[0].client_count, 1);
}

#[tokio::test]
async fn test_dropped_socket_leaves_registry() {
    let server = TestServer::start().await;
    let ws = server.join(3, 1).await;
    server.wait_for_clients(1).await;

    drop(ws);
    server.wait_for_clients(0).await;
    assert!(server.registry.stats().family_groups.is_empty());
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let server = TestServer::start().await;
    let mut ws = server.join(42, 1).await;

    ws.send(Message::Text("{oops".into())).await.unwrap();
    ws.send(Message::Text(r#"{"type":"subscribe","payload":"tasks"}"#.into()))
        .await
        .unwrap();
    ws.send(Message::Text(r#"{"type":"bulletin:pinned"}"#.into()))
        .await
        .unwrap();

    let pong = round_trip_ping(&mut ws).await;
    match pong.payload {
        Payload::Pong { timestamp } => assert!(timestamp.is_some()),
        other => panic!("Expected pong, got {:?}", other),
    }
    assert_eq!(server.registry.len(), 1);
}

#[tokio::test]
async fn test_evicted_connection_is_closed_and_removed() {
    let server = TestServer::start().await;
    let mut ws = server.join(42, 1).await;

    let member = server.registry.connections_of(FamilyId(42)).remove(0);
    assert!(server.registry.evict(member.handle, 1000, "Session revoked"));

    let frame = expect_close(&mut ws).await.expect("close frame");
    assert_eq!(frame.code, CloseCode::Normal);
    assert_eq!(frame.reason.as_str(), "Session revoked");
    server.wait_for_clients(0).await;
}

#[tokio::test]
async fn test_stats_endpoint() {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    let server = TestServer::start().await;
    let _a = server.join(42, 1).await;
    let _b = server.join(42, 2).await;
    let _c = server.join(7, 3).await;

    let response = create_router(server.state.clone())
        .oneshot(Request::get("/api/ws/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    let stats: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        stats,
        serde_json::json!({
            "totalClients": 3,
            "familyGroups": [
                {"familyId": 7, "clientCount": 1},
                {"familyId": 42, "clientCount": 2}
            ]
        })
    );
}

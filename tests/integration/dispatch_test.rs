//! Broadcast dispatch integration tests
//!
//! Registry plus dispatcher with instrumented queues standing in for
//! sockets.

use homesync::backend::realtime::registry::{ConnectionHandle, ConnectionRegistry, Outbound};
use homesync::backend::realtime::{broadcast_event, broadcast_event_except, notify_change};
use homesync::shared::{Change, Envelope, FamilyId, Resource, UserId};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

fn member(
    registry: &ConnectionRegistry,
    family: i64,
    capacity: usize,
) -> (ConnectionHandle, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(capacity);
    let handle = ConnectionHandle::new();
    registry.admit(handle, FamilyId(family), Some(UserId(family * 10)), tx);
    (handle, rx)
}

fn text(rx: &mut mpsc::Receiver<Outbound>) -> Envelope {
    match rx.try_recv().expect("no frame queued") {
        Outbound::Text(text) => Envelope::from_json(&text).unwrap(),
        other => panic!("Expected text frame, got {:?}", other),
    }
}

#[test]
fn test_failing_recipients_do_not_block_the_rest() {
    let registry = ConnectionRegistry::new();
    let mut healthy = Vec::new();
    for _ in 0..5 {
        healthy.push(member(&registry, 42, 4));
    }

    // One recipient whose transport is gone, one whose queue is full
    let (_dead, dead_rx) = member(&registry, 42, 4);
    drop(dead_rx);
    let (_slow, _slow_rx) = member(&registry, 42, 1);
    assert_eq!(broadcast_event(&registry, FamilyId(42), &Envelope::pong()), 6);

    let delivered = notify_change(
        &registry,
        FamilyId(42),
        Resource::Grocery,
        Change::Cleared { count: 4 },
    );
    assert_eq!(delivered, 5);

    for (_, rx) in healthy.iter_mut() {
        crate::assert_kind!(text(rx), "pong");
        crate::assert_kind!(text(rx), "grocery:cleared");
    }

    // Failed sends never remove entries
    assert_eq!(registry.len(), 7);
}

#[test]
fn test_origin_exclusion() {
    let registry = ConnectionRegistry::new();
    let (origin, mut origin_rx) = member(&registry, 1, 4);
    let (_peer, mut peer_rx) = member(&registry, 1, 4);

    let envelope = Envelope::resource(
        Resource::Calendar,
        Change::Created(serde_json::json!({"id": 8, "title": "Dentist"})),
    );
    assert_eq!(broadcast_event_except(&registry, FamilyId(1), &envelope, Some(origin)), 1);
    assert!(origin_rx.try_recv().is_err());
    crate::assert_resource_event!(text(&mut peer_rx), Resource::Calendar);

    // Default policy echoes to everyone, origin included
    assert_eq!(broadcast_event(&registry, FamilyId(1), &envelope), 2);
    crate::assert_kind!(text(&mut origin_rx), "calendar:created");
}

#[test]
fn test_resource_payload_shapes_on_the_wire() {
    let registry = ConnectionRegistry::new();
    let (_a, mut rx) = member(&registry, 3, 8);

    notify_change(&registry, FamilyId(3), Resource::Bulletin, Change::Deleted { id: 12 });
    notify_change(&registry, FamilyId(3), Resource::Activity, Change::BulkCleared { count: 3 });
    notify_change(
        &registry,
        FamilyId(3),
        Resource::Task,
        Change::Unassigned(serde_json::json!({"taskId": 2, "userId": 30})),
    );

    let frames: Vec<serde_json::Value> = (0..3)
        .map(|_| {
            let envelope = text(&mut rx);
            let mut value = serde_json::to_value(&envelope).unwrap();
            value.as_object_mut().unwrap().remove("timestamp");
            value
        })
        .collect();

    assert_eq!(
        frames,
        vec![
            serde_json::json!({"type": "bulletin:deleted", "payload": {"id": 12}}),
            serde_json::json!({"type": "activity:bulk-cleared", "payload": {"count": 3}}),
            serde_json::json!({"type": "task:unassigned", "payload": {"taskId": 2, "userId": 30}}),
        ]
    );
}

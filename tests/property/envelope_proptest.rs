//! Property-based tests for the message envelope

use homesync::shared::{Envelope, Payload};
use proptest::prelude::*;

const KNOWN_RESOURCES: [&str; 5] = ["grocery", "task", "bulletin", "calendar", "activity"];

proptest! {
    #[test]
    fn test_unrecognized_type_is_carried_verbatim(
        kind in "[a-z]{1,12}(:[a-z-]{1,12})?",
        value in any::<i64>(),
    ) {
        prop_assume!(!matches!(kind.as_str(), "ping" | "pong" | "connected" | "subscribe"));
        let resource = kind.split(':').next().unwrap_or_default();
        prop_assume!(!KNOWN_RESOURCES.contains(&resource));

        let frame = serde_json::json!({"type": kind, "payload": {"value": value}});
        let envelope = Envelope::from_json(&frame.to_string()).unwrap();

        let is_unknown = matches!(envelope.payload, Payload::Unknown { .. });
        prop_assert!(is_unknown);
        prop_assert_eq!(envelope.kind(), kind.as_str());

        let back: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        prop_assert_eq!(back, frame);
    }

    #[test]
    fn test_arbitrary_text_never_panics(text in ".*") {
        let _ = Envelope::from_json(&text);
    }

    #[test]
    fn test_frames_without_string_type_are_rejected(n in any::<i64>()) {
        let numeric = serde_json::json!({"type": n}).to_string();
        prop_assert!(Envelope::from_json(&numeric).is_err());

        let untyped = serde_json::json!({"payload": {"id": n}}).to_string();
        prop_assert!(Envelope::from_json(&untyped).is_err());
    }

    #[test]
    fn test_deleted_events_keep_their_id(
        resource in prop::sample::select(KNOWN_RESOURCES.to_vec()),
        id in any::<i64>(),
    ) {
        let kind = format!("{}:deleted", resource);
        let frame = serde_json::json!({"type": kind, "payload": {"id": id}});
        let envelope = Envelope::from_json(&frame.to_string()).unwrap();

        let is_resource = matches!(envelope.payload, Payload::Resource(_));
        prop_assert!(is_resource);
        prop_assert_eq!(envelope.kind(), kind.as_str());
    }
}

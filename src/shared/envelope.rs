/**
 * Message Envelope
 *
 * The unit of communication on the realtime socket, shared by the server
 * and the client agent. Every frame is a UTF-8 JSON object:
 *
 * ```json
 * {"type": "grocery:added", "payload": {"item": {...}}, "timestamp": "2026-01-01T00:00:00Z"}
 * ```
 *
 * # Payload Union
 *
 * The `type` tag selects a variant of [`Payload`]:
 * - Control frames: `ping`, `pong`, `connected`, `subscribe`
 * - Resource events: `<resource>:<action>`, e.g. `grocery:added`, `task:assigned`
 * - Anything else decodes as [`Payload::Unknown`] with the raw payload kept
 *
 * A known tag whose payload does not have the expected shape also falls
 * back to `Unknown`. Only frames that are not a JSON object with a string
 * `type` are rejected.
 *
 * Envelopes are built right before a send and are never persisted or
 * replayed.
 */

use crate::shared::error::SharedError;
use crate::shared::ids::FamilyId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

/// A single frame on the realtime socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEnvelope", into = "RawEnvelope")]
pub struct Envelope {
    /// Tagged body of the frame
    pub payload: Payload,
    /// RFC 3339 time the frame was built, when the sender stamped it
    pub timestamp: Option<String>,
}

/// Wire shape of an envelope before the tag is interpreted
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

/// Body of an envelope, keyed by the wire `type`
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Application-level heartbeat from a client
    Ping,
    /// Server answer to `ping`
    Pong { timestamp: Option<String> },
    /// Sent once right after a connection is admitted
    Connected(ConnectedPayload),
    /// Reserved for channel scoping; the server only logs it
    Subscribe(Option<Value>),
    /// A household resource changed
    Resource(ResourceEvent),
    /// Unrecognized tag, carried verbatim
    Unknown { kind: String, payload: Option<Value> },
}

/// Payload of the `connected` confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    /// Broadcast domain the connection joined
    pub family_id: FamilyId,
    pub timestamp: String,
}

/// Household resources that publish change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Grocery,
    Task,
    Bulletin,
    Calendar,
    Activity,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Grocery => "grocery",
            Resource::Task => "task",
            Resource::Bulletin => "bulletin",
            Resource::Calendar => "calendar",
            Resource::Activity => "activity",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "grocery" => Some(Resource::Grocery),
            "task" => Some(Resource::Task),
            "bulletin" => Some(Resource::Bulletin),
            "calendar" => Some(Resource::Calendar),
            "activity" => Some(Resource::Activity),
            _ => None,
        }
    }
}

/// What happened to a resource
///
/// Variants holding a [`Value`] carry the full resource as the REST layer
/// returned it. Deletions and bulk clears only carry identifying data.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Added(Value),
    Created(Value),
    Updated(Value),
    Deleted { id: i64 },
    Cleared { count: u64 },
    BulkCleared { count: u64 },
    Assigned(Value),
    Unassigned(Value),
}

#[derive(Deserialize)]
struct IdPayload {
    id: i64,
}

#[derive(Deserialize)]
struct CountPayload {
    count: u64,
}

impl Change {
    /// Wire name of the action half of the tag
    pub fn action(&self) -> &'static str {
        match self {
            Change::Added(_) => "added",
            Change::Created(_) => "created",
            Change::Updated(_) => "updated",
            Change::Deleted { .. } => "deleted",
            Change::Cleared { .. } => "cleared",
            Change::BulkCleared { .. } => "bulk-cleared",
            Change::Assigned(_) => "assigned",
            Change::Unassigned(_) => "unassigned",
        }
    }

    fn decode(action: &str, payload: Option<&Value>) -> Option<Self> {
        let payload = payload?;
        let change = match action {
            "added" => Change::Added(payload.clone()),
            "created" => Change::Created(payload.clone()),
            "updated" => Change::Updated(payload.clone()),
            "assigned" => Change::Assigned(payload.clone()),
            "unassigned" => Change::Unassigned(payload.clone()),
            "deleted" => Change::Deleted {
                id: IdPayload::deserialize(payload).ok()?.id,
            },
            "cleared" => Change::Cleared {
                count: CountPayload::deserialize(payload).ok()?.count,
            },
            "bulk-cleared" => Change::BulkCleared {
                count: CountPayload::deserialize(payload).ok()?.count,
            },
            _ => return None,
        };
        Some(change)
    }

    fn into_value(self) -> Value {
        match self {
            Change::Added(v)
            | Change::Created(v)
            | Change::Updated(v)
            | Change::Assigned(v)
            | Change::Unassigned(v) => v,
            Change::Deleted { id } => serde_json::json!({ "id": id }),
            Change::Cleared { count } | Change::BulkCleared { count } => {
                serde_json::json!({ "count": count })
            }
        }
    }
}

/// A change to one household resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent {
    pub resource: Resource,
    pub change: Change,
}

impl ResourceEvent {
    pub fn new(resource: Resource, change: Change) -> Self {
        Self { resource, change }
    }

    /// Full wire tag, e.g. `grocery:deleted`
    pub fn kind(&self) -> String {
        format!("{}:{}", self.resource.as_str(), self.change.action())
    }

    fn decode(kind: &str, payload: Option<&Value>) -> Option<Self> {
        let (resource, action) = kind.split_once(':')?;
        Some(Self {
            resource: Resource::parse(resource)?,
            change: Change::decode(action, payload)?,
        })
    }
}

impl Payload {
    /// Wire `type` tag of this payload
    pub fn kind(&self) -> Cow<'_, str> {
        match self {
            Payload::Ping => Cow::Borrowed("ping"),
            Payload::Pong { .. } => Cow::Borrowed("pong"),
            Payload::Connected(_) => Cow::Borrowed("connected"),
            Payload::Subscribe(_) => Cow::Borrowed("subscribe"),
            Payload::Resource(event) => Cow::Owned(event.kind()),
            Payload::Unknown { kind, .. } => Cow::Borrowed(kind.as_str()),
        }
    }

    fn decode(kind: String, payload: Option<Value>) -> Self {
        match kind.as_str() {
            "ping" => return Payload::Ping,
            "pong" => {
                let timestamp = payload
                    .as_ref()
                    .and_then(|p| p.get("timestamp"))
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                return Payload::Pong { timestamp };
            }
            "subscribe" => return Payload::Subscribe(payload),
            "connected" => {
                if let Some(connected) = payload
                    .as_ref()
                    .and_then(|p| ConnectedPayload::deserialize(p).ok())
                {
                    return Payload::Connected(connected);
                }
            }
            _ => {
                if let Some(event) = ResourceEvent::decode(&kind, payload.as_ref()) {
                    return Payload::Resource(event);
                }
            }
        }
        Payload::Unknown { kind, payload }
    }

    fn encode(self) -> (String, Option<Value>) {
        match self {
            Payload::Ping => ("ping".to_string(), None),
            Payload::Pong { timestamp } => (
                "pong".to_string(),
                timestamp.map(|t| serde_json::json!({ "timestamp": t })),
            ),
            Payload::Connected(connected) => (
                "connected".to_string(),
                serde_json::to_value(connected).ok(),
            ),
            Payload::Subscribe(channel) => ("subscribe".to_string(), channel),
            Payload::Resource(event) => {
                let kind = event.kind();
                (kind, Some(event.change.into_value()))
            }
            Payload::Unknown { kind, payload } => (kind, payload),
        }
    }
}

impl From<RawEnvelope> for Envelope {
    fn from(raw: RawEnvelope) -> Self {
        Self {
            payload: Payload::decode(raw.kind, raw.payload),
            timestamp: raw.timestamp,
        }
    }
}

impl From<Envelope> for RawEnvelope {
    fn from(envelope: Envelope) -> Self {
        let (kind, payload) = envelope.payload.encode();
        Self {
            kind,
            payload,
            timestamp: envelope.timestamp,
        }
    }
}

impl Envelope {
    /// Build an envelope stamped with the current time
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            timestamp: Some(now_rfc3339()),
        }
    }

    /// Client heartbeat: `{"type":"ping"}`
    pub fn ping() -> Self {
        Self {
            payload: Payload::Ping,
            timestamp: None,
        }
    }

    /// Server answer to a heartbeat
    pub fn pong() -> Self {
        Self::new(Payload::Pong {
            timestamp: Some(now_rfc3339()),
        })
    }

    /// Admission confirmation naming the joined household
    pub fn connected(family_id: FamilyId) -> Self {
        Self::new(Payload::Connected(ConnectedPayload {
            family_id,
            timestamp: now_rfc3339(),
        }))
    }

    /// Resource change event
    pub fn resource(resource: Resource, change: Change) -> Self {
        Self::new(Payload::Resource(ResourceEvent::new(resource, change)))
    }

    /// Wire `type` tag
    pub fn kind(&self) -> Cow<'_, str> {
        self.payload.kind()
    }

    /// Serialize to a text frame
    pub fn to_json(&self) -> Result<String, SharedError> {
        serde_json::to_string(self).map_err(|e| SharedError::encoding(e.to_string()))
    }

    /// Parse a text frame
    pub fn from_json(text: &str) -> Result<Self, SharedError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Current time as an RFC 3339 string
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

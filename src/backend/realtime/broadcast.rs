/**
 * Broadcast Dispatcher
 *
 * The call write paths make after a mutation commits. It pushes one
 * envelope to every live connection of the household and returns right
 * away; nothing here waits for clients.
 *
 * # Contract
 *
 * The returned count is informational. A write handler must never fail its
 * own request because the count is low or zero: clients that missed the
 * event re-read authoritative state through the REST API.
 *
 * # Usage
 *
 * ```rust
 * use homesync::backend::realtime::{broadcast_event, notify_change, ConnectionRegistry};
 * use homesync::shared::{Change, Envelope, FamilyId, Resource};
 *
 * let registry = ConnectionRegistry::new();
 *
 * // After deleting grocery item 12 for household 42:
 * notify_change(&registry, FamilyId(42), Resource::Grocery, Change::Deleted { id: 12 });
 *
 * // Or with a prebuilt envelope:
 * let delivered = broadcast_event(&registry, FamilyId(42), &Envelope::pong());
 * assert_eq!(delivered, 0);
 * ```
 */

use crate::backend::realtime::registry::{ConnectionHandle, ConnectionRegistry};
use crate::shared::{Change, Envelope, FamilyId, Resource};

/// Broadcast an envelope to every connection of a household
///
/// # Returns
///
/// Number of connections the envelope was queued for (0 if none)
pub fn broadcast_event(registry: &ConnectionRegistry, family_id: FamilyId, envelope: &Envelope) -> usize {
    broadcast_event_except(registry, family_id, envelope, None)
}

/// Same as [`broadcast_event`], skipping the connection that caused the change
pub fn broadcast_event_except(
    registry: &ConnectionRegistry,
    family_id: FamilyId,
    envelope: &Envelope,
    origin: Option<ConnectionHandle>,
) -> usize {
    let delivered = registry.broadcast(family_id, envelope, origin);
    if delivered > 0 {
        tracing::info!(
            family_id = %family_id,
            kind = %envelope.kind(),
            "[Realtime] Event broadcast to {} subscribers",
            delivered
        );
    } else {
        tracing::debug!(
            family_id = %family_id,
            kind = %envelope.kind(),
            "[Realtime] No subscribers to receive event"
        );
    }
    delivered
}

/// Build a resource event and broadcast it
pub fn notify_change(
    registry: &ConnectionRegistry,
    family_id: FamilyId,
    resource: Resource,
    change: Change,
) -> usize {
    broadcast_event(registry, family_id, &Envelope::resource(resource, change))
}

//! Bridges zone store change notifications into session updates.

use std::sync::Arc;

use futures::StreamExt as _;
use response_map_zone::ZoneStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::SessionUpdate;

/// Subscribes to the store's change stream, folds each notification into
/// the store's snapshot, and forwards it as a [`SessionUpdate::Zone`].
///
/// The task ends when the change stream closes or `updates` has no
/// receiver left.
#[must_use]
pub fn spawn_zone_follower(
    store: Arc<ZoneStore>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
) -> JoinHandle<()> {
    let mut changes = store.backend().changes();

    tokio::spawn(async move {
        while let Some(change) = changes.next().await {
            store.apply_change(&change);
            if updates.send(SessionUpdate::Zone(change)).is_err() {
                log::debug!("Session update receiver dropped; zone follower exiting");
                return;
            }
        }
        log::debug!("Zone change stream closed");
    })
}

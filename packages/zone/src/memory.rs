//! In-process implementation of the zone store collaborator.
//!
//! Keeps zones in insertion order and broadcasts a [`ZoneChange`] for every
//! successful write, the way the hosted store pushes notifications to
//! connected clients.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt as _;
use futures::stream::BoxStream;
use response_map_zone_models::{Zone, ZoneChange, ZoneChangeOp, ZoneDraft, ZoneUpdate};
use tokio::sync::broadcast;

use crate::{ZoneBackend, ZoneBackendError};

/// Notification buffer per subscriber before it starts lagging.
const CHANGE_BUFFER: usize = 256;

/// A [`ZoneBackend`] held entirely in memory.
pub struct InMemoryZoneBackend {
    zones: Mutex<Vec<Zone>>,
    changes: broadcast::Sender<ZoneChange>,
    unavailable: AtomicBool,
}

impl Default for InMemoryZoneBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryZoneBackend {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            zones: Mutex::new(Vec::new()),
            changes,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail with
    /// [`ZoneBackendError::Unavailable`] until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ZoneBackendError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ZoneBackendError::Unavailable {
                message: "store is offline".to_string(),
            });
        }
        Ok(())
    }

    fn with_zones<T>(&self, f: impl FnOnce(&mut Vec<Zone>) -> T) -> T {
        let mut zones = self
            .zones
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut zones)
    }

    fn notify(&self, op: ZoneChangeOp, zone: &Zone) {
        // No subscribers is not an error.
        let _ = self.changes.send(ZoneChange {
            op,
            zone: zone.clone(),
        });
    }
}

#[async_trait]
impl ZoneBackend for InMemoryZoneBackend {
    async fn list_active_zones(&self) -> Result<Vec<Zone>, ZoneBackendError> {
        self.check_available()?;
        Ok(self.with_zones(|zones| zones.iter().filter(|z| z.is_active).cloned().collect()))
    }

    async fn list_all_zones(&self) -> Result<Vec<Zone>, ZoneBackendError> {
        self.check_available()?;
        Ok(self.with_zones(|zones| zones.clone()))
    }

    async fn insert_zone(&self, draft: &ZoneDraft) -> Result<Zone, ZoneBackendError> {
        self.check_available()?;
        let zone = Zone {
            id: uuid::Uuid::new_v4().to_string(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            geometry: draft.geometry.clone(),
            color: draft.color.clone(),
            opacity: draft.opacity,
            created_by: draft.created_by.clone(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.with_zones(|zones| zones.push(zone.clone()));
        self.notify(ZoneChangeOp::Insert, &zone);
        Ok(zone)
    }

    async fn update_zone(&self, id: &str, fields: &ZoneUpdate) -> Result<Zone, ZoneBackendError> {
        self.check_available()?;
        let updated = self.with_zones(|zones| {
            let slot = zones.iter_mut().find(|z| z.id == id)?;
            let mut next = fields.apply_to(slot.clone());
            next.updated_at = Some(Utc::now());
            *slot = next.clone();
            Some(next)
        });
        let zone = updated.ok_or_else(|| ZoneBackendError::NotFound { id: id.to_string() })?;
        self.notify(ZoneChangeOp::Update, &zone);
        Ok(zone)
    }

    async fn delete_zone(&self, id: &str) -> Result<(), ZoneBackendError> {
        self.check_available()?;
        let removed = self.with_zones(|zones| {
            let idx = zones.iter().position(|z| z.id == id)?;
            Some(zones.remove(idx))
        });
        let zone = removed.ok_or_else(|| ZoneBackendError::NotFound { id: id.to_string() })?;
        self.notify(ZoneChangeOp::Delete, &zone);
        Ok(())
    }

    fn changes(&self) -> BoxStream<'static, ZoneChange> {
        let rx = self.changes.subscribe();
        futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(change) => return Some((change, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("Zone change subscriber lagged; skipped {skipped} notifications");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

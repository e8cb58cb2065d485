//! Validated zone CRUD with a copy-on-write in-memory snapshot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use response_map_zone_models::{Zone, ZoneChange, ZoneChangeOp, ZoneDraft, ZoneUpdate, apply_change};

use crate::validate::{validate_draft, validate_update};
use crate::{ZoneBackend, ZoneError};

/// Zone CRUD over a [`ZoneBackend`].
///
/// Writes are never committed locally before the backend confirms them.
/// Mutations to the same zone id are serialized; mutations to different
/// ids run concurrently.
pub struct ZoneStore {
    backend: Arc<dyn ZoneBackend>,
    zones: RwLock<Arc<Vec<Zone>>>,
    active_only: AtomicBool,
    locks: Mutex<BTreeMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ZoneStore {
    /// Creates a store with an empty snapshot.
    #[must_use]
    pub fn new(backend: Arc<dyn ZoneBackend>) -> Self {
        Self {
            backend,
            zones: RwLock::new(Arc::new(Vec::new())),
            active_only: AtomicBool::new(true),
            locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// The backend this store writes through.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn ZoneBackend> {
        &self.backend
    }

    /// The zones from the last [`list`](Self::list), kept current by
    /// writes and [`apply_change`](Self::apply_change).
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Zone>> {
        Arc::clone(&self.zones.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Fetches zones from the backend and replaces the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::Backend`] if the store cannot be read.
    pub async fn list(&self, active_only: bool) -> Result<Arc<Vec<Zone>>, ZoneError> {
        let zones = if active_only {
            self.backend.list_active_zones().await?
        } else {
            self.backend.list_all_zones().await?
        };
        log::debug!("Listed {} zones (active_only={active_only})", zones.len());

        let zones = Arc::new(zones);
        self.active_only.store(active_only, Ordering::SeqCst);
        *self.zones.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&zones);
        Ok(zones)
    }

    /// Validates and persists a new zone.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::Validation`] if the draft is invalid, or
    /// [`ZoneError::Backend`] if the write fails.
    pub async fn create(&self, draft: &ZoneDraft) -> Result<Zone, ZoneError> {
        validate_draft(draft)?;
        let zone = self.backend.insert_zone(draft).await?;
        log::info!("Created zone {} ({})", zone.id, zone.name);

        self.apply_change(&ZoneChange {
            op: ZoneChangeOp::Insert,
            zone: zone.clone(),
        });
        Ok(zone)
    }

    /// Applies a partial update to an existing zone.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::Validation`] if the update is invalid,
    /// [`ZoneError::NotFound`] if `id` does not exist, or
    /// [`ZoneError::Backend`] if the write fails.
    pub async fn update(&self, id: &str, fields: &ZoneUpdate) -> Result<Zone, ZoneError> {
        validate_update(fields)?;

        let lock = self.lock_for(id);
        let zone = {
            let _guard = lock.lock().await;
            let zone = self.backend.update_zone(id, fields).await;
            if let Ok(zone) = &zone {
                self.apply_change(&ZoneChange {
                    op: ZoneChangeOp::Update,
                    zone: zone.clone(),
                });
            }
            zone
        };
        self.release(id, &lock);

        let zone = zone?;
        log::info!("Updated zone {id}");
        Ok(zone)
    }

    /// Soft-deletes a zone by clearing its active flag.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] if `id` does not exist, or
    /// [`ZoneError::Backend`] if the write fails.
    pub async fn deactivate(&self, id: &str) -> Result<Zone, ZoneError> {
        self.update(
            id,
            &ZoneUpdate {
                is_active: Some(false),
                ..ZoneUpdate::default()
            },
        )
        .await
    }

    /// Hard-deletes a zone.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] if `id` does not exist, or
    /// [`ZoneError::Backend`] if the write fails.
    pub async fn delete(&self, id: &str) -> Result<(), ZoneError> {
        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock().await;
            let result = self.backend.delete_zone(id).await;
            if result.is_ok() {
                self.replace_snapshot(|zones| {
                    zones.iter().filter(|z| z.id != id).cloned().collect()
                });
            }
            result
        };
        self.release(id, &lock);

        result?;
        log::info!("Deleted zone {id}");
        Ok(())
    }

    /// Folds a change notification into the snapshot.
    ///
    /// When the snapshot was listed with `active_only`, an update that
    /// deactivates a zone removes it.
    pub fn apply_change(&self, change: &ZoneChange) {
        log::debug!("Applying zone change {} for {}", change.op, change.zone.id);

        let deactivated = self.active_only.load(Ordering::SeqCst)
            && change.op != ZoneChangeOp::Delete
            && !change.zone.is_active;

        if deactivated {
            let id = change.zone.id.clone();
            self.replace_snapshot(|zones| zones.iter().filter(|z| z.id != id).cloned().collect());
        } else {
            self.replace_snapshot(|zones| apply_change(zones, change));
        }
    }

    fn replace_snapshot(&self, f: impl FnOnce(&[Zone]) -> Vec<Zone>) {
        let mut zones = self.zones.write().unwrap_or_else(PoisonError::into_inner);
        *zones = Arc::new(f(&zones));
    }

    fn lock_for(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    /// Drops the per-id lock entry once no other caller holds it.
    fn release(&self, id: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held by the caller.
        let current = locks.get(id).is_some_and(|held| Arc::ptr_eq(held, lock));
        if current && Arc::strong_count(lock) <= 2 {
            locks.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use response_map_geometry::LngLat;

    use super::*;
    use crate::memory::InMemoryZoneBackend;
    use crate::{ValidationError, ZoneBackendError};

    fn draft(name: &str) -> ZoneDraft {
        ZoneDraft {
            name: name.to_string(),
            description: None,
            geometry: vec![
                LngLat::new(0.0, 0.0),
                LngLat::new(0.0, 1.0),
                LngLat::new(1.0, 1.0),
                LngLat::new(1.0, 0.0),
                LngLat::new(0.0, 0.0),
            ],
            color: "#3b82f6".to_string(),
            opacity: 0.4,
            created_by: "dispatcher".to_string(),
        }
    }

    fn store() -> (Arc<InMemoryZoneBackend>, ZoneStore) {
        let backend = Arc::new(InMemoryZoneBackend::new());
        let store = ZoneStore::new(backend.clone());
        (backend, store)
    }

    #[tokio::test]
    async fn create_validates_before_persisting() {
        let (backend, store) = store();
        let mut bad = draft("bad");
        bad.geometry.truncate(2);

        let err = store.create(&bad).await.unwrap_err();
        assert!(matches!(err, ZoneError::Validation(ValidationError::Geometry(_))));
        assert!(backend.list_all_zones().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_returns_materialized_zone_and_updates_snapshot() {
        let (_, store) = store();
        let zone = store.create(&draft("Staging")).await.unwrap();
        assert!(!zone.id.is_empty());
        assert_eq!(store.snapshot().as_slice(), std::slice::from_ref(&zone));
    }

    #[tokio::test]
    async fn update_and_delete_missing_zone_are_not_found() {
        let (_, store) = store();
        let rename = ZoneUpdate {
            name: Some("x".to_string()),
            ..ZoneUpdate::default()
        };
        assert_eq!(
            store.update("missing", &rename).await,
            Err(ZoneError::NotFound {
                id: "missing".to_string()
            })
        );
        assert_eq!(
            store.delete("missing").await,
            Err(ZoneError::NotFound {
                id: "missing".to_string()
            })
        );
    }

    #[tokio::test]
    async fn deactivate_drops_zone_from_active_snapshot() {
        let (_, store) = store();
        let a = store.create(&draft("A")).await.unwrap();
        let b = store.create(&draft("B")).await.unwrap();
        store.list(true).await.unwrap();

        let deactivated = store.deactivate(&a.id).await.unwrap();
        assert!(!deactivated.is_active);
        let ids: Vec<String> = store.snapshot().iter().map(|z| z.id.clone()).collect();
        assert_eq!(ids, vec![b.id.clone()]);

        store.list(false).await.unwrap();
        assert_eq!(store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_from_snapshot() {
        let (backend, store) = store();
        let zone = store.create(&draft("A")).await.unwrap();
        store.delete(&zone.id).await.unwrap();
        assert!(store.snapshot().is_empty());
        assert!(backend.list_all_zones().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_write_is_not_committed_locally() {
        let (backend, store) = store();
        let zone = store.create(&draft("A")).await.unwrap();
        backend.set_unavailable(true);

        let err = store
            .update(
                &zone.id,
                &ZoneUpdate {
                    name: Some("B".to_string()),
                    ..ZoneUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ZoneError::Backend(_)));
        assert_eq!(store.snapshot()[0].name, "A");
    }

    #[tokio::test]
    async fn apply_change_tracks_remote_writes() {
        let (backend, store) = store();
        let mut other = backend.changes();
        let zone = backend.insert_zone(&draft("Remote")).await.unwrap();

        let change = futures::StreamExt::next(&mut other).await.unwrap();
        store.apply_change(&change);
        assert_eq!(store.snapshot()[0].id, zone.id);
    }

    /// Wraps the in-memory backend and records the peak number of
    /// concurrent `update_zone` calls.
    struct SlowBackend {
        inner: InMemoryZoneBackend,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ZoneBackend for SlowBackend {
        async fn list_active_zones(&self) -> Result<Vec<Zone>, ZoneBackendError> {
            self.inner.list_active_zones().await
        }

        async fn list_all_zones(&self) -> Result<Vec<Zone>, ZoneBackendError> {
            self.inner.list_all_zones().await
        }

        async fn insert_zone(&self, draft: &ZoneDraft) -> Result<Zone, ZoneBackendError> {
            self.inner.insert_zone(draft).await
        }

        async fn update_zone(
            &self,
            id: &str,
            fields: &ZoneUpdate,
        ) -> Result<Zone, ZoneBackendError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let result = self.inner.update_zone(id, fields).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn delete_zone(&self, id: &str) -> Result<(), ZoneBackendError> {
            self.inner.delete_zone(id).await
        }

        fn changes(&self) -> BoxStream<'static, ZoneChange> {
            self.inner.changes()
        }
    }

    fn slow_store() -> (Arc<SlowBackend>, ZoneStore) {
        let backend = Arc::new(SlowBackend {
            inner: InMemoryZoneBackend::new(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let store = ZoneStore::new(backend.clone());
        (backend, store)
    }

    fn rename(name: &str) -> ZoneUpdate {
        ZoneUpdate {
            name: Some(name.to_string()),
            ..ZoneUpdate::default()
        }
    }

    #[tokio::test]
    async fn same_zone_mutations_are_serialized() {
        let (backend, store) = slow_store();
        let zone = store.create(&draft("A")).await.unwrap();

        let renames: Vec<ZoneUpdate> = (0..5).map(|i| rename(&format!("n{i}"))).collect();
        let results =
            futures::future::join_all(renames.iter().map(|fields| store.update(&zone.id, fields)))
                .await;
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
        assert!(store.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn different_zones_mutate_concurrently() {
        let (backend, store) = slow_store();
        let a = store.create(&draft("A")).await.unwrap();
        let b = store.create(&draft("B")).await.unwrap();

        let (a2, b2) = (rename("A2"), rename("B2"));
        let (ra, rb) = tokio::join!(store.update(&a.id, &a2), store.update(&b.id, &b2));
        assert!(ra.is_ok() && rb.is_ok());
        assert_eq!(backend.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn snapshot_follows_backend_write_order_across_threads() {
        let (backend, store) = slow_store();
        let store = Arc::new(store);
        let zone = store.create(&draft("A")).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let id = zone.id.clone();
                tokio::spawn(async move { store.update(&id, &rename(&format!("n{i}"))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let persisted = backend.list_all_zones().await.unwrap();
        assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
        assert_eq!(store.snapshot()[0].name, persisted[0].name);
        assert!(store.locks.lock().unwrap().is_empty());
    }
}

//! Debounced, sequential recomputation of clusters and zone stats.
//!
//! Sessions are published into a `watch` channel, so a burst of updates
//! collapses to the newest one. After the first change the task waits out
//! the debounce window, takes whatever session is current, and computes a
//! frame for it on the blocking pool. The next computation never starts
//! before the previous one has finished.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use response_map_analysis_models::{Cluster, ClusterPalette, EmergencyZoneStats};
use response_map_config::EngineConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::MapSession;

/// Results computed from one session.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFrame {
    /// Version of the session the frame was computed from.
    pub version: u64,
    /// Clusters over every entity, singletons dropped.
    pub clusters: Arc<Vec<Cluster>>,
    /// One entry per active zone, in zone-list order.
    pub stats: Arc<Vec<EmergencyZoneStats>>,
    /// Shared by every stats entry in the frame.
    pub computed_at: DateTime<Utc>,
}

/// Knobs for [`RecomputePipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Coalescing window after the first change of a burst.
    pub debounce: Duration,
    /// Join distance passed to clustering.
    pub cluster_radius_meters: f64,
    /// Cluster colours.
    pub palette: ClusterPalette,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            cluster_radius_meters: 100.0,
            palette: ClusterPalette::default(),
        }
    }
}

impl From<&EngineConfig> for PipelineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            debounce: config.recompute.debounce(),
            cluster_radius_meters: config.clustering.radius_meters,
            palette: config.clustering.palette.clone(),
        }
    }
}

/// Background task recomputing an [`AnalysisFrame`] whenever the session
/// changes.
pub struct RecomputePipeline {
    sessions: watch::Sender<MapSession>,
    frames: watch::Receiver<Option<Arc<AnalysisFrame>>>,
    task: JoinHandle<()>,
}

impl RecomputePipeline {
    /// Starts the task and schedules a first computation for `initial`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(initial: MapSession, settings: PipelineSettings) -> Self {
        let (sessions, mut session_rx) = watch::channel(initial);
        session_rx.mark_changed();
        let (frame_tx, frames) = watch::channel(None);

        let task = tokio::spawn(run(session_rx, frame_tx, settings));

        Self {
            sessions,
            frames,
            task,
        }
    }

    /// Replaces the session to analyse. Sessions submitted within one
    /// debounce window are coalesced.
    pub fn submit(&self, session: MapSession) {
        self.sessions.send_replace(session);
    }

    /// The most recent successful frame, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<AnalysisFrame>> {
        self.frames.borrow().clone()
    }

    /// A receiver notified on every new frame.
    #[must_use]
    pub fn frames(&self) -> watch::Receiver<Option<Arc<AnalysisFrame>>> {
        self.frames.clone()
    }

    /// Stops accepting sessions, lets any pending computation finish, and
    /// waits for the task to exit.
    pub async fn shutdown(self) {
        drop(self.sessions);
        if let Err(e) = self.task.await {
            log::warn!("Recompute task ended abnormally: {e}");
        }
    }
}

async fn run(
    mut sessions: watch::Receiver<MapSession>,
    frames: watch::Sender<Option<Arc<AnalysisFrame>>>,
    settings: PipelineSettings,
) {
    let settings = Arc::new(settings);

    while sessions.changed().await.is_ok() {
        tokio::time::sleep(settings.debounce).await;
        let session = sessions.borrow_and_update().clone();
        let version = session.version();

        let worker_settings = Arc::clone(&settings);
        let result =
            tokio::task::spawn_blocking(move || session.compute_frame(&worker_settings)).await;

        match result {
            Ok(Ok(frame)) => {
                log::debug!(
                    "Recomputed session v{version}: {} clusters, {} zones",
                    frame.clusters.len(),
                    frame.stats.len()
                );
                frames.send_replace(Some(Arc::new(frame)));
            }
            Ok(Err(e)) => {
                log::warn!("Recompute for session v{version} failed, keeping last frame: {e}");
            }
            Err(e) => {
                log::warn!("Recompute worker for session v{version} panicked: {e}");
            }
        }
    }

    log::debug!("Recompute pipeline stopped");
}

#[cfg(test)]
mod tests {
    use response_map_entity_models::{Entity, EntitySnapshot, EntityStatus, EntityType};
    use response_map_geometry::LngLat;
    use response_map_zone_models::Zone;

    use super::*;
    use crate::SessionUpdate;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            debounce: Duration::from_millis(40),
            ..PipelineSettings::default()
        }
    }

    fn incidents(n: usize) -> EntitySnapshot {
        EntitySnapshot::from_entities(
            (0..n).map(|i| Entity::new(format!("i{i}"), EntityType::Incident, 0.5, 0.5, EntityStatus::Active)),
        )
    }

    async fn next_frame(
        frames: &mut watch::Receiver<Option<Arc<AnalysisFrame>>>,
    ) -> Arc<AnalysisFrame> {
        tokio::time::timeout(Duration::from_secs(5), frames.changed())
            .await
            .expect("frame within timeout")
            .expect("pipeline alive");
        frames.borrow_and_update().clone().expect("frame present")
    }

    #[tokio::test]
    async fn computes_initial_session() {
        let pipeline = RecomputePipeline::spawn(
            MapSession::new(vec![], incidents(3)),
            settings(),
        );
        let mut frames = pipeline.frames();

        let frame = next_frame(&mut frames).await;
        assert_eq!(frame.version, 0);
        assert_eq!(frame.clusters[0].member_count, 3);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn bursts_collapse_to_latest_session() {
        let base = MapSession::default();
        let pipeline = RecomputePipeline::spawn(base.clone(), settings());
        let mut frames = pipeline.frames();
        next_frame(&mut frames).await;

        let mut session = base;
        for n in 2..=6 {
            session = session.apply(SessionUpdate::ReplaceEntities(incidents(n)));
            pipeline.submit(session.clone());
        }

        let frame = next_frame(&mut frames).await;
        assert_eq!(frame.version, session.version());
        assert_eq!(frame.clusters[0].member_count, 6);

        let quiet = tokio::time::timeout(Duration::from_millis(200), frames.changed()).await;
        assert!(quiet.is_err(), "burst should produce exactly one frame");
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn failed_recompute_keeps_last_frame() {
        let good = MapSession::new(vec![], incidents(2));
        let pipeline = RecomputePipeline::spawn(good.clone(), settings());
        let mut frames = pipeline.frames();
        let first = next_frame(&mut frames).await;

        let broken_zone = Zone {
            id: "z".to_string(),
            name: "Broken".to_string(),
            description: None,
            geometry: vec![LngLat::new(0.0, 0.0), LngLat::new(1.0, 1.0)],
            color: "#000".to_string(),
            opacity: 1.0,
            created_by: "ops".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        pipeline.submit(good.apply(SessionUpdate::ReplaceZones(vec![broken_zone])));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pipeline.latest(), Some(first));
        pipeline.shutdown().await;
    }

    #[test]
    fn settings_follow_engine_config() {
        let config = EngineConfig::embedded().unwrap();
        let settings = PipelineSettings::from(&config);
        assert_eq!(settings.debounce, Duration::from_millis(300));
        assert_eq!(settings.palette, config.clustering.palette);
    }
}

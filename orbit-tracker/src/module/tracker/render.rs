///! Boundary between the engine and the two render surfaces
use crate::module::orbit::SampleResult;
use crate::module::store::DataNotice;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orbit_common::{CatalogId, GeodeticPosition, ViewMode};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pull-based position lookup for a render surface's own paint loop
#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn position_at(&self, catalog_id: CatalogId, instant: DateTime<Utc>) -> SampleResult;
}

/// One view (globe or map).
///
/// Implementations paint; they never read engine state on their own.
pub trait RenderAdapter: Send + Sync {
    /// The projection this adapter paints
    fn mode(&self) -> ViewMode;

    fn render(&self, frame: &Frame);

    /// Drop everything currently drawn
    fn clear(&self);

    fn focus(&self, catalog_id: CatalogId);
}

#[derive(Debug, Clone, PartialEq)]
pub struct FramePosition {
    pub catalog_id: CatalogId,
    pub display_name: String,
    pub position: GeodeticPosition,
    /// Instant the position was sampled at; differs from the frame instant during playback
    pub sampled_at: DateTime<Utc>,
    pub selected: bool,
}

/// Everything a view needs to paint one tick
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub mode: ViewMode,
    pub instant: DateTime<Utc>,
    pub positions: Vec<FramePosition>,
    pub selected: Option<CatalogId>,
    pub show_tracks: bool,
    pub notice: Option<DataNotice>,
    pub propagation_failures: usize,
}

impl Frame {
    pub fn contains(&self, catalog_id: CatalogId) -> bool {
        self.positions.iter().any(|p| p.catalog_id == catalog_id)
    }

    pub fn position_of(&self, catalog_id: CatalogId) -> Option<&FramePosition> {
        self.positions.iter().find(|p| p.catalog_id == catalog_id)
    }
}

/// Headless adapter: writes a summary of every frame to the log
pub struct LogRenderAdapter {
    mode: ViewMode,
    frames: AtomicUsize,
}

impl LogRenderAdapter {
    pub fn new(mode: ViewMode) -> Self {
        Self {
            mode,
            frames: AtomicUsize::new(0),
        }
    }

    pub fn frames_rendered(&self) -> usize {
        self.frames.load(Ordering::Relaxed)
    }
}

impl RenderAdapter for LogRenderAdapter {
    fn mode(&self) -> ViewMode {
        self.mode
    }

    fn render(&self, frame: &Frame) {
        let count = self.frames.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(notice) = &frame.notice {
            tracing::warn!("[{}] {}", self.mode, notice.message);
        }

        match frame.selected.and_then(|id| frame.position_of(id)) {
            Some(selected) => tracing::info!(
                "[{}] frame {} at {}: {} objects, {} failed; {} ({}) at {:.3}, {:.3}, {:.0} km",
                self.mode,
                count,
                frame.instant.format("%Y-%m-%d %H:%M:%S UTC"),
                frame.positions.len(),
                frame.propagation_failures,
                selected.display_name,
                selected.catalog_id,
                selected.position.latitude_deg,
                selected.position.longitude_deg,
                selected.position.altitude_meters / 1000.0
            ),
            None => tracing::debug!(
                "[{}] frame {} at {}: {} objects, {} failed",
                self.mode,
                count,
                frame.instant.format("%Y-%m-%d %H:%M:%S UTC"),
                frame.positions.len(),
                frame.propagation_failures
            ),
        }
    }

    fn clear(&self) {
        tracing::info!("[{}] view cleared", self.mode);
    }

    fn focus(&self, catalog_id: CatalogId) {
        tracing::info!("[{}] focusing on {}", self.mode, catalog_id);
    }
}

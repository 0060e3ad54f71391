use chrono::{DateTime, Duration as ChronoDuration, Utc};
use orbit_common::{CatalogId, ElementSet, FilterSpec, Observer, PlaybackState, ViewMode};
use serde::{Deserialize, Serialize};

/// The one selected object.
///
/// Carries its element set when known so either view can re-propagate it
/// without a fetch. `exempt_for` records the filter under which a
/// non-matching user selection was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub catalog_id: CatalogId,
    pub element_set: Option<ElementSet>,
    pub exempt_for: Option<FilterSpec>,
}

impl Selection {
    pub fn is_exempt_under(&self, filter: Option<&FilterSpec>) -> bool {
        match (&self.exempt_for, filter) {
            (Some(exempt), Some(filter)) => exempt == filter,
            _ => false,
        }
    }
}

/// Shared simulated time, anchored to a wall-clock instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationClock {
    pub anchor_wall: DateTime<Utc>,
    pub anchor_sim: DateTime<Utc>,
    pub rate: f64,
}

impl SimulationClock {
    pub fn real_time(now: DateTime<Utc>) -> Self {
        Self {
            anchor_wall: now,
            anchor_sim: now,
            rate: 1.0,
        }
    }

    /// Simulated instant at wall time `wall`
    pub fn now_at(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let elapsed = wall - self.anchor_wall;
        if self.rate == 1.0 {
            return self.anchor_sim.checked_add_signed(elapsed).unwrap_or(self.anchor_sim);
        }

        let scaled = elapsed.num_milliseconds() as f64 * self.rate;
        if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
            return self.anchor_sim;
        }
        ChronoDuration::try_milliseconds(scaled as i64)
            .and_then(|delta| self.anchor_sim.checked_add_signed(delta))
            .unwrap_or(self.anchor_sim)
    }
}

/// User-visible data condition, shown by every view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataNotice {
    pub message: String,
    /// Positions come from a cached snapshot, not a fresh fetch
    pub stale: bool,
    pub retry_available: bool,
}

impl DataNotice {
    pub fn stale(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stale: true,
            retry_available: true,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stale: false,
            retry_available: true,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stale: false,
            retry_available: false,
        }
    }
}

/// Immutable snapshot of everything both views agree on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    pub mode: ViewMode,
    pub selection: Option<Selection>,
    pub filter: Option<FilterSpec>,
    pub playback: PlaybackState,
    pub show_satellites: bool,
    pub show_tracks: bool,
    pub show_only_selected: bool,
    pub overhead_only: bool,
    pub observer: Option<Observer>,
    pub clock: SimulationClock,
    /// Bumped whenever an outstanding fetch becomes obsolete
    pub request_generation: u64,
    pub notice: Option<DataNotice>,
}

impl StoreState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            mode: ViewMode::default(),
            selection: None,
            filter: None,
            playback: PlaybackState::default(),
            show_satellites: true,
            show_tracks: false,
            show_only_selected: false,
            overhead_only: false,
            observer: None,
            clock: SimulationClock::real_time(now),
            request_generation: 0,
            notice: None,
        }
    }

    pub fn selected_id(&self) -> Option<CatalogId> {
        self.selection.as_ref().map(|s| s.catalog_id)
    }

    pub fn is_selected(&self, catalog_id: CatalogId) -> bool {
        self.selected_id() == Some(catalog_id)
    }

    /// Simulated "now" shared by both views
    pub fn sim_now(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        self.clock.now_at(wall)
    }
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

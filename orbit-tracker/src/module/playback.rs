///! Playback clock: per-object sample time for orbit fast-forward
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use orbit_common::{CatalogId, PlaybackState};
use std::time::Duration;

/// Shortest and longest loop horizon, in minutes
pub const MIN_HORIZON_MINUTES: u32 = 30;
pub const MAX_HORIZON_MINUTES: u32 = 7 * 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrozenSample {
    catalog_id: CatalogId,
    instant: DateTime<Utc>,
    reset_epoch: u64,
}

/// Maps wall time onto a looping fast-forward for the selected object.
///
/// Holds the last instant it produced so a paused track stays where it
/// stopped. The memo belongs to one reset epoch and is ignored after a reset.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    loop_period: Duration,
    frozen: Option<FrozenSample>,
}

impl PlaybackClock {
    pub fn new(loop_period: Duration) -> Self {
        Self {
            loop_period: loop_period.max(Duration::from_millis(1)),
            frozen: None,
        }
    }

    /// Sample instant for `catalog_id`.
    ///
    /// `now` is the shared simulated instant, `wall` the wall clock that drives
    /// the loop. Anything but the selected object with tracks shown samples at
    /// `now`. While playing the instant sweeps `[now, now + horizon)` once per
    /// loop period of wall time, whatever the simulation rate; while paused the
    /// last swept instant is held.
    pub fn sample_time_for(
        &mut self,
        catalog_id: CatalogId,
        wall: DateTime<Utc>,
        now: DateTime<Utc>,
        selected: Option<CatalogId>,
        show_tracks: bool,
        playback: &PlaybackState,
    ) -> DateTime<Utc> {
        if selected != Some(catalog_id) || !show_tracks {
            return now;
        }

        if playback.is_playing {
            let instant = now + self.offset_at(wall, playback.horizon.minutes());
            self.frozen = Some(FrozenSample {
                catalog_id,
                instant,
                reset_epoch: playback.reset_epoch,
            });
            return instant;
        }

        match self.frozen {
            Some(frozen) if frozen.catalog_id == catalog_id && frozen.reset_epoch == playback.reset_epoch => {
                frozen.instant
            }
            Some(_) => {
                tracing::debug!("Discarding frozen playback instant for {}", catalog_id);
                self.frozen = None;
                now
            }
            None => now,
        }
    }

    /// Position of wall time `wall` in the loop, in [0, 1)
    pub fn phase(&self, wall: DateTime<Utc>) -> f64 {
        let period_ms = self.loop_period.as_millis().min(i64::MAX as u128) as i64;
        wall.timestamp_millis().rem_euclid(period_ms) as f64 / period_ms as f64
    }

    fn offset_at(&self, wall: DateTime<Utc>, horizon_minutes: u32) -> ChronoDuration {
        let minutes = horizon_minutes.clamp(MIN_HORIZON_MINUTES, MAX_HORIZON_MINUTES);
        let span_ms = minutes as f64 * 60_000.0;
        ChronoDuration::milliseconds((self.phase(wall) * span_ms).floor() as i64)
    }
}

///! Closed command set for the synchronization store.
///!
///! `transition` is the whole state machine: old snapshot + command in, new
///! snapshot + declared side effects out. The old snapshot is never touched.
use super::state::{DataNotice, Selection, SimulationClock, StoreState};
use crate::module::filter::matches;
use chrono::{DateTime, Utc};
use orbit_common::{CatalogId, ElementSet, FilterSpec, HorizonHours, Observer, ViewMode};
use std::sync::Arc;
use thiserror::Error;

/// Who asked for a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOrigin {
    /// Click in either view or a list pick; always honored
    User,
    /// Issued by the engine itself; must satisfy the active filter
    Programmatic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SelectObject {
        catalog_id: CatalogId,
        element_set: Option<ElementSet>,
        origin: SelectionOrigin,
    },
    ClearSelection,
    SetFilter(Option<FilterSpec>),
    SetMode(ViewMode),
    TogglePlayback,
    ResetPlayback,
    SetHorizon(HorizonHours),
    SetShowSatellites(bool),
    SetShowTracks(bool),
    SetShowOnlySelected(bool),
    SetOverheadOnly(bool),
    SetObserver(Option<Observer>),
    SyncClock { sim_time: DateTime<Utc>, rate: f64 },
    BeginRequest,
    SetNotice(Option<DataNotice>),
    RefreshSelection(ElementSet),
}

/// Side effects a transition declares; render adapters and the engine act on them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    SatellitesAutoEnabled,
    TracksForced,
    SelectionCleared(CatalogId),
    PlaybackStopped,
    RefetchRequired,
    ModeChanged { from: ViewMode, to: ViewMode },
    FocusRequested(CatalogId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandRejected {
    #[error("object {0} does not match the active filter")]
    FilterMismatch(CatalogId),

    #[error("no object is selected")]
    NoSelection,

    #[error("unknown object {0}")]
    UnknownObject(CatalogId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Arc<StoreState>,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn has(&self, effect: Effect) -> bool {
        self.effects.contains(&effect)
    }
}

/// Stop playback and void any frozen sample instant
fn stop_playback(next: &mut StoreState, effects: &mut Vec<Effect>) {
    if next.playback.is_playing {
        effects.push(Effect::PlaybackStopped);
    }
    next.playback.is_playing = false;
    next.playback.reset_epoch += 1;
}

fn clear_selection(next: &mut StoreState, effects: &mut Vec<Effect>) {
    if let Some(previous) = next.selection.take() {
        effects.push(Effect::SelectionCleared(previous.catalog_id));
        stop_playback(next, effects);
    }
}

/// Whether the selection still belongs under `filter`, exemption included
fn selection_survives(selection: &Selection, filter: Option<&FilterSpec>) -> bool {
    if filter.is_none() || selection.is_exempt_under(filter) {
        return true;
    }
    selection
        .element_set
        .as_ref()
        .is_some_and(|set| matches(&set.display_name, filter))
}

pub fn transition(
    current: &StoreState,
    command: Command,
    now: DateTime<Utc>,
) -> Result<(StoreState, Vec<Effect>), CommandRejected> {
    let mut next = current.clone();
    let mut effects = Vec::new();

    match command {
        Command::SelectObject {
            catalog_id,
            element_set,
            origin,
        } => {
            if catalog_id == 0 {
                return Err(CommandRejected::UnknownObject(catalog_id));
            }
            if let Some(set) = &element_set
                && set.catalog_id != catalog_id
            {
                return Err(CommandRejected::UnknownObject(catalog_id));
            }

            // Reuse the known element set when re-selecting without one
            let element_set = element_set.or_else(|| {
                current
                    .selection
                    .as_ref()
                    .filter(|s| s.catalog_id == catalog_id)
                    .and_then(|s| s.element_set.clone())
            });

            let filter = current.filter.as_ref();
            let exempt_for = match (filter, &element_set) {
                (None, _) => None,
                (Some(_), Some(set)) if matches(&set.display_name, filter) => None,
                (Some(filter), known) => match origin {
                    SelectionOrigin::User => Some(filter.clone()),
                    SelectionOrigin::Programmatic if known.is_none() => {
                        return Err(CommandRejected::UnknownObject(catalog_id));
                    }
                    SelectionOrigin::Programmatic => {
                        return Err(CommandRejected::FilterMismatch(catalog_id));
                    }
                },
            };

            if current.selected_id().is_some_and(|id| id != catalog_id) {
                stop_playback(&mut next, &mut effects);
            }

            next.selection = Some(Selection {
                catalog_id,
                element_set,
                exempt_for,
            });
            effects.push(Effect::FocusRequested(catalog_id));
        }

        Command::ClearSelection => clear_selection(&mut next, &mut effects),

        Command::SetFilter(filter) => {
            let changed = filter != current.filter;
            if changed {
                next.request_generation += 1;
                next.notice = None;
            }

            let keep = next
                .selection
                .as_ref()
                .is_none_or(|s| selection_survives(s, filter.as_ref()));
            if !keep {
                clear_selection(&mut next, &mut effects);
            } else if let Some(selection) = next.selection.as_mut()
                && !selection.is_exempt_under(filter.as_ref())
            {
                selection.exempt_for = None;
            }

            if !next.show_satellites {
                next.show_satellites = true;
                effects.push(Effect::SatellitesAutoEnabled);
            }
            next.filter = filter;
            if changed {
                effects.push(Effect::RefetchRequired);
            }
        }

        Command::SetMode(mode) => {
            if mode != current.mode {
                next.mode = mode;
                effects.push(Effect::ModeChanged {
                    from: current.mode,
                    to: mode,
                });
                if let Some(id) = current.selected_id() {
                    effects.push(Effect::FocusRequested(id));
                }
            }
        }

        Command::TogglePlayback => {
            if current.selection.is_none() {
                return Err(CommandRejected::NoSelection);
            }
            if current.playback.is_playing {
                next.playback.is_playing = false;
            } else {
                next.playback.is_playing = true;
                if !next.show_tracks || !next.show_only_selected {
                    effects.push(Effect::TracksForced);
                }
                next.show_tracks = true;
                next.show_only_selected = true;
            }
        }

        Command::ResetPlayback => stop_playback(&mut next, &mut effects),

        Command::SetHorizon(horizon) => {
            if horizon != current.playback.horizon {
                next.playback.horizon = horizon;
                next.playback.reset_epoch += 1;
            }
        }

        Command::SetShowSatellites(show) => next.show_satellites = show,

        // Playback never runs over a cluttered scene
        Command::SetShowTracks(show) => {
            next.show_tracks = show;
            if !show && next.playback.is_playing {
                next.playback.is_playing = false;
                effects.push(Effect::PlaybackStopped);
            }
        }
        Command::SetShowOnlySelected(only) => {
            next.show_only_selected = only;
            if !only && next.playback.is_playing {
                next.playback.is_playing = false;
                effects.push(Effect::PlaybackStopped);
            }
        }

        Command::SetOverheadOnly(only) => next.overhead_only = only,

        Command::SetObserver(observer) => next.observer = observer,

        Command::SyncClock { sim_time, rate } => {
            let rate = if rate.is_finite() { rate } else { current.clock.rate };
            next.clock = SimulationClock {
                anchor_wall: now,
                anchor_sim: sim_time,
                rate,
            };
            next.playback.reset_epoch += 1;
        }

        Command::BeginRequest => next.request_generation += 1,

        Command::SetNotice(notice) => next.notice = notice,

        Command::RefreshSelection(set) => {
            if let Some(selection) = next.selection.as_mut()
                && selection.catalog_id == set.catalog_id
            {
                selection.element_set = Some(set);
            }
        }
    }

    Ok((next, effects))
}

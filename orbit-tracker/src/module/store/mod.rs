///! Synchronization store: the single source of truth both views read
///!
///! Every change goes through one [`Command`]; each accepted command swaps in a
///! new immutable [`StoreState`] snapshot.

mod state;
pub use state::{DataNotice, Selection, SimulationClock, StoreState};

mod command;
pub use command::{transition, Command, CommandRejected, Effect, SelectionOrigin, Transition};

use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct SyncStore {
    current: Arc<StoreState>,
}

impl SyncStore {
    pub fn new(initial: StoreState) -> Self {
        Self {
            current: Arc::new(initial),
        }
    }

    /// Current snapshot; holders keep it valid even after later commands
    pub fn state(&self) -> Arc<StoreState> {
        self.current.clone()
    }

    pub fn apply(&mut self, command: Command) -> Result<Transition, CommandRejected> {
        self.apply_at(command, Utc::now())
    }

    pub fn apply_at(&mut self, command: Command, now: DateTime<Utc>) -> Result<Transition, CommandRejected> {
        let label = format!("{:?}", command);
        match transition(&self.current, command, now) {
            Ok((next, effects)) => {
                let next = Arc::new(next);
                self.current = next.clone();
                if !effects.is_empty() {
                    tracing::debug!("Store applied {}: {:?}", short(&label), effects);
                }
                Ok(Transition { state: next, effects })
            }
            Err(e) => {
                tracing::info!("Store rejected {}: {}", short(&label), e);
                Err(e)
            }
        }
    }
}

impl Default for SyncStore {
    fn default() -> Self {
        Self::new(StoreState::default())
    }
}

/// Command name without its payload, for log lines
fn short(label: &str) -> &str {
    label
        .split(|c: char| c == ' ' || c == '(' || c == '{')
        .next()
        .unwrap_or(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_common::{ElementSet, ViewMode};

    #[test]
    fn test_snapshots_are_immutable() {
        let mut store = SyncStore::default();
        let before = store.state();

        let transition = store
            .apply(Command::SelectObject {
                catalog_id: 25544,
                element_set: Some(ElementSet::new(25544, "ISS (ZARYA)", "1", "2")),
                origin: SelectionOrigin::User,
            })
            .unwrap();

        assert!(before.selection.is_none());
        assert_eq!(transition.state.selected_id(), Some(25544));
        assert!(Arc::ptr_eq(&transition.state, &store.state()));
        assert!(transition.has(Effect::FocusRequested(25544)));
    }

    #[test]
    fn test_rejected_command_keeps_state() {
        let mut store = SyncStore::default();
        let before = store.state();
        assert_eq!(store.apply(Command::TogglePlayback), Err(CommandRejected::NoSelection));
        assert!(Arc::ptr_eq(&before, &store.state()));
    }

    #[test]
    fn test_exactly_one_mode() {
        let mut store = SyncStore::default();
        assert_eq!(store.state().mode, ViewMode::ThreeD);
        store.apply(Command::SetMode(ViewMode::TwoD)).unwrap();
        assert_eq!(store.state().mode, ViewMode::TwoD);
    }

    #[test]
    fn test_short_label() {
        assert_eq!(short("SetMode(TwoD)"), "SetMode");
        assert_eq!(short("SelectObject { catalog_id: 1 }"), "SelectObject");
        assert_eq!(short("BeginRequest"), "BeginRequest");
    }
}

///! Per-view refresh drivers
///!
///! Exactly the active view runs a frame loop, and only while satellites are
///! shown. Stopping a driver aborts its task and clears its view before
///! `reconcile` returns.
use super::render::RenderAdapter;
use super::Tracker;
use crate::module::store::{Effect, StoreState, Transition};
use chrono::Utc;
use orbit_common::ViewMode;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

struct Driver {
    handle: JoinHandle<()>,
    /// Cleared under the lock on stop; the loop checks it before every paint
    live: Arc<Mutex<bool>>,
}

pub struct ViewSupervisor {
    tracker: Arc<Tracker>,
    adapters: HashMap<ViewMode, Arc<dyn RenderAdapter>>,
    drivers: HashMap<ViewMode, Driver>,
    frame_interval: Duration,
}

impl ViewSupervisor {
    pub fn new(tracker: Arc<Tracker>, frame_interval: Duration) -> Self {
        Self {
            tracker,
            adapters: HashMap::new(),
            drivers: HashMap::new(),
            frame_interval: frame_interval.max(Duration::from_millis(10)),
        }
    }

    /// Register the adapter for its mode, replacing any previous one
    pub fn register(&mut self, adapter: Arc<dyn RenderAdapter>) {
        let mode = adapter.mode();
        self.stop(mode);
        self.adapters.insert(mode, adapter);
    }

    pub fn is_running(&self, mode: ViewMode) -> bool {
        self.drivers.contains_key(&mode)
    }

    /// Bring the running drivers in line with `state`
    pub fn reconcile(&mut self, state: &StoreState) {
        for mode in ViewMode::ALL {
            let wanted = state.show_satellites && state.mode == mode && self.adapters.contains_key(&mode);
            match (wanted, self.is_running(mode)) {
                (true, false) => self.start(mode),
                (false, true) => self.stop(mode),
                _ => {}
            }
        }
    }

    /// Act on the declared effects of a store transition
    pub fn handle(&mut self, transition: &Transition) {
        self.reconcile(&*transition.state);

        for effect in &transition.effects {
            match effect {
                // Focus follows the mode current at apply time, not at request time
                Effect::FocusRequested(catalog_id) => {
                    if let Some(adapter) = self.adapters.get(&transition.state.mode) {
                        adapter.focus(*catalog_id);
                    }
                }
                Effect::ModeChanged { from, to } => {
                    tracing::info!("View switched from {} to {}", from, to);
                }
                _ => {}
            }
        }
    }

    fn start(&mut self, mode: ViewMode) {
        let Some(adapter) = self.adapters.get(&mode).cloned() else {
            return;
        };
        let tracker = self.tracker.clone();
        let live = Arc::new(Mutex::new(true));
        let gate = live.clone();
        let period = self.frame_interval;

        tracing::info!("Starting {} view driver (every {:?})", mode, period);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let frame = tracker.build_frame(Utc::now()).await;

                let live = gate.lock().unwrap_or_else(|e| e.into_inner());
                if !*live {
                    break;
                }
                adapter.render(&frame);
            }
        });

        self.drivers.insert(mode, Driver { handle, live });
    }

    fn stop(&mut self, mode: ViewMode) {
        let Some(driver) = self.drivers.remove(&mode) else {
            return;
        };
        {
            let mut live = driver.live.lock().unwrap_or_else(|e| e.into_inner());
            *live = false;
        }
        driver.handle.abort();
        if let Some(adapter) = self.adapters.get(&mode) {
            adapter.clear();
        }
        tracing::info!("Stopped {} view driver", mode);
    }

    pub fn shutdown(&mut self) {
        for mode in ViewMode::ALL {
            self.stop(mode);
        }
    }
}

impl Drop for ViewSupervisor {
    fn drop(&mut self) {
        for driver in self.drivers.values() {
            driver.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::elements::test_server::{record, spawn, MockProvider};
    use crate::module::orbit::OrbitSampler;
    use crate::module::store::Command;
    use crate::module::tracker::render::Frame;
    use crate::module::tracker::tests::tracker_with;
    use orbit_common::CatalogId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct RecordingAdapter {
        mode: ViewMode,
        frames: AtomicUsize,
        clears: AtomicUsize,
        focused: Mutex<Vec<CatalogId>>,
    }

    impl RecordingAdapter {
        fn new(mode: ViewMode) -> Arc<Self> {
            Arc::new(Self {
                mode,
                frames: AtomicUsize::new(0),
                clears: AtomicUsize::new(0),
                focused: Mutex::new(Vec::new()),
            })
        }
    }

    impl RenderAdapter for RecordingAdapter {
        fn mode(&self) -> ViewMode {
            self.mode
        }

        fn render(&self, _frame: &Frame) {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }

        fn clear(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }

        fn focus(&self, catalog_id: CatalogId) {
            self.focused.lock().unwrap().push(catalog_id);
        }
    }

    async fn setup() -> (TempDir, Arc<Tracker>, ViewSupervisor, Arc<RecordingAdapter>, Arc<RecordingAdapter>) {
        let temp_dir = TempDir::new().unwrap();
        let base = spawn(Arc::new(MockProvider::new(vec![record(25544, "ISS (ZARYA)")]))).await;
        let tracker = Arc::new(tracker_with(base, temp_dir.path(), OrbitSampler::default(), 512));

        let globe = RecordingAdapter::new(ViewMode::ThreeD);
        let map = RecordingAdapter::new(ViewMode::TwoD);
        let mut supervisor = ViewSupervisor::new(tracker.clone(), Duration::from_millis(10));
        supervisor.register(globe.clone());
        supervisor.register(map.clone());
        (temp_dir, tracker, supervisor, globe, map)
    }

    #[tokio::test]
    async fn test_only_active_view_runs() {
        let (_dir, tracker, mut supervisor, globe, map) = setup().await;
        let state = tracker.state().await;
        supervisor.reconcile(&*state);
        assert!(supervisor.is_running(ViewMode::ThreeD));
        assert!(!supervisor.is_running(ViewMode::TwoD));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(globe.frames.load(Ordering::SeqCst) > 0);
        assert_eq!(map.frames.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mode_switch_stops_and_clears_old_view() {
        let (_dir, tracker, mut supervisor, globe, map) = setup().await;
        let state = tracker.state().await;
        supervisor.reconcile(&*state);

        let transition = tracker.apply(Command::SetMode(ViewMode::TwoD)).await.unwrap();
        supervisor.handle(&transition);
        assert!(!supervisor.is_running(ViewMode::ThreeD));
        assert!(supervisor.is_running(ViewMode::TwoD));
        assert_eq!(globe.clears.load(Ordering::SeqCst), 1);

        // No frame reaches the stopped view after reconcile returns
        let frames = globe.frames.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(globe.frames.load(Ordering::SeqCst), frames);
        assert!(map.frames.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_hiding_satellites_stops_driver() {
        let (_dir, tracker, mut supervisor, globe, _map) = setup().await;
        let state = tracker.state().await;
        supervisor.reconcile(&*state);

        let transition = tracker.apply(Command::SetShowSatellites(false)).await.unwrap();
        supervisor.handle(&transition);
        assert!(!supervisor.is_running(ViewMode::ThreeD));
        assert_eq!(globe.clears.load(Ordering::SeqCst), 1);

        let transition = tracker.apply(Command::SetFilter(None)).await.unwrap();
        assert!(transition.has(Effect::SatellitesAutoEnabled));
        supervisor.handle(&transition);
        assert!(supervisor.is_running(ViewMode::ThreeD));
    }

    #[tokio::test]
    async fn test_focus_goes_to_current_view() {
        let (_dir, tracker, mut supervisor, globe, map) = setup().await;
        tracker.refresh().await.unwrap();
        tracker.apply(Command::SetMode(ViewMode::TwoD)).await.unwrap();

        let transition = tracker.on_user_select(25544).await.unwrap();
        supervisor.handle(&transition);
        assert_eq!(*map.focused.lock().unwrap(), vec![25544]);
        assert!(globe.focused.lock().unwrap().is_empty());
        supervisor.shutdown();
    }
}

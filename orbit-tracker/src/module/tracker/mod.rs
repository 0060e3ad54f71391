///! Tracking engine: owns the store and the loaded catalog, and turns both into frames
///!
///! - `render`: the boundary the two views implement
///! - `supervisor`: per-view refresh drivers
///! - `updater`: periodic element-set refresh

pub mod render;
pub mod supervisor;
pub mod updater;

pub use render::{Frame, FramePosition, LogRenderAdapter, PositionProvider, RenderAdapter};
pub use supervisor::ViewSupervisor;
pub use updater::ElementSetUpdater;

use crate::config::TrackerConfig;
use crate::model::elements::{
    DataError, ElementSetClient, ElementSetService, FetchSource, RetryPolicy, SnapshotCache,
};
use crate::module::filter::{matches, search_catalog, DEFAULT_THRESHOLD};
use crate::module::geocode::GeocodeClient;
use crate::module::orbit::{eci_to_geodetic, is_overhead, OrbitSampler, PropagationFailure, SampleResult};
use crate::module::playback::PlaybackClock;
use crate::module::store::{
    Command, CommandRejected, DataNotice, Effect, SelectionOrigin, StoreState, SyncStore, Transition,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orbit_common::{CatalogId, ElementSet, FilterSpec, GeodeticPosition, Observer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct TrackerOptions {
    /// Objects requested per refresh
    pub limit: usize,
    /// Objects sampled between cooperative yields
    pub chunk_size: usize,
    pub loop_period: Duration,
}

impl TrackerOptions {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            limit: config.provider.default_limit,
            chunk_size: config.refresh.batch_chunk_size.max(1),
            loop_period: Duration::from_secs(config.playback.loop_period_secs),
        }
    }
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

/// Element sets currently loaded, with the filter they were selected under
#[derive(Debug, Default)]
struct Catalog {
    sets: Arc<Vec<ElementSet>>,
    index: HashMap<CatalogId, usize>,
    filter: Option<FilterSpec>,
}

impl Catalog {
    fn new(sets: Vec<ElementSet>, filter: Option<FilterSpec>) -> Self {
        let index = sets
            .iter()
            .enumerate()
            .map(|(i, set)| (set.catalog_id, i))
            .collect();
        Self {
            sets: Arc::new(sets),
            index,
            filter,
        }
    }

    fn get(&self, catalog_id: CatalogId) -> Option<&ElementSet> {
        self.index.get(&catalog_id).and_then(|&i| self.sets.get(i))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied { count: usize, source: FetchSource },
    /// The fetch failed; the last saved snapshot is shown behind a stale notice
    Snapshot {
        count: usize,
        saved_at: DateTime<Utc>,
        error: DataError,
    },
    /// A newer request started while this one was in flight
    Superseded,
}

#[derive(Debug)]
pub struct FilterChange {
    pub transition: Transition,
    /// `None` when the filter did not change and the loaded catalog still applies
    pub refresh: Option<Result<RefreshOutcome, DataError>>,
}

pub struct Tracker {
    store: RwLock<SyncStore>,
    catalog: RwLock<Arc<Catalog>>,
    playback: Mutex<PlaybackClock>,
    sampler: OrbitSampler,
    service: ElementSetService,
    cache: SnapshotCache,
    geocoder: Option<GeocodeClient>,
    options: TrackerOptions,
}

impl Tracker {
    pub fn new(service: ElementSetService, sampler: OrbitSampler, cache: SnapshotCache, options: TrackerOptions) -> Self {
        Self {
            store: RwLock::new(SyncStore::default()),
            catalog: RwLock::new(Arc::new(Catalog::default())),
            playback: Mutex::new(PlaybackClock::new(options.loop_period)),
            sampler,
            service,
            cache,
            geocoder: None,
            options,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> anyhow::Result<Self> {
        let client = ElementSetClient::new(config.provider.clone())?;
        let service = ElementSetService::new(client, RetryPolicy::from(&config.retry));
        let geocoder = GeocodeClient::new(&config.geocode)?;

        Ok(Self::new(
            service,
            OrbitSampler::default(),
            SnapshotCache::new(&config.cache_dir),
            TrackerOptions::from_config(config),
        )
        .with_geocoder(geocoder))
    }

    pub fn with_geocoder(mut self, geocoder: GeocodeClient) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub async fn state(&self) -> Arc<StoreState> {
        self.store.read().await.state()
    }

    pub async fn apply(&self, command: Command) -> Result<Transition, CommandRejected> {
        self.store.write().await.apply(command)
    }

    pub async fn catalog(&self) -> Arc<Vec<ElementSet>> {
        self.catalog.read().await.sets.clone()
    }

    /// Element set from the loaded catalog, else the one carried by the selection
    pub async fn element_set(&self, catalog_id: CatalogId) -> Option<ElementSet> {
        if let Some(set) = self.catalog.read().await.get(catalog_id) {
            return Some(set.clone());
        }
        let state = self.state().await;
        state
            .selection
            .as_ref()
            .filter(|s| s.catalog_id == catalog_id)
            .and_then(|s| s.element_set.clone())
    }

    pub async fn search(&self, query: &str) -> Vec<ElementSet> {
        let catalog = self.catalog().await;
        search_catalog(query, &catalog, DEFAULT_THRESHOLD)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Fetch candidates for the current filter and install them.
    ///
    /// A result whose request generation is no longer current is dropped. An
    /// exhausted fetch falls back to the saved snapshot behind a stale notice,
    /// or surfaces the error with a retry notice when there is none.
    pub async fn refresh(&self) -> Result<RefreshOutcome, DataError> {
        let started = {
            let mut store = self.store.write().await;
            match store.apply(Command::BeginRequest) {
                Ok(transition) => transition.state,
                Err(e) => {
                    tracing::warn!("Failed to open element-set request: {}", e);
                    store.state()
                }
            }
        };
        let generation = started.request_generation;
        let filter = started.filter.clone();
        let filter_id = filter.as_ref().map(|f| f.id.clone());
        let limit = self.options.limit;

        tracing::debug!(
            "Refreshing element sets (generation {}, filter {:?}, limit {})",
            generation,
            filter_id,
            limit
        );

        match self.service.fetch_candidates(limit, filter.as_ref()).await {
            Ok(candidates) => {
                if let Err(e) = self.cache.save(filter_id.as_deref(), limit, &candidates.sets).await {
                    tracing::warn!("Failed to save element-set snapshot: {:#}", e);
                }

                let source = candidates.source;
                Ok(match self.install(generation, filter, candidates.sets, None).await {
                    Some(count) => {
                        tracing::info!("Loaded {} element sets ({:?})", count, source);
                        RefreshOutcome::Applied { count, source }
                    }
                    None => RefreshOutcome::Superseded,
                })
            }
            Err(error) => {
                let snapshot = match self.cache.load(filter_id.as_deref(), limit).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::warn!("Failed to read element-set snapshot: {:#}", e);
                        None
                    }
                };

                if let Some(snapshot) = snapshot {
                    let saved_at = snapshot.saved_at;
                    let notice = DataNotice::stale(format!(
                        "Element data unavailable ({}); showing data from {}",
                        error,
                        saved_at.format("%Y-%m-%d %H:%M UTC")
                    ));
                    tracing::warn!("{}", notice.message);
                    return Ok(match self.install(generation, filter, snapshot.sets, Some(notice)).await {
                        Some(count) => RefreshOutcome::Snapshot { count, saved_at, error },
                        None => RefreshOutcome::Superseded,
                    });
                }

                let mut store = self.store.write().await;
                if store.state().request_generation != generation {
                    tracing::debug!("Ignoring failure of superseded request {}", generation);
                    return Ok(RefreshOutcome::Superseded);
                }
                let notice = DataNotice::failed(format!("Could not load element data: {}", error));
                if let Err(e) = store.apply(Command::SetNotice(Some(notice))) {
                    tracing::warn!("Failed to set data notice: {}", e);
                }
                Err(error)
            }
        }
    }

    /// The retry action attached to a failure notice
    pub async fn retry_refresh(&self) -> Result<RefreshOutcome, DataError> {
        tracing::info!("Retrying element-set refresh");
        self.refresh().await
    }

    /// Swap the loaded catalog, if `generation` is still the current request.
    ///
    /// Store and catalog change under one store write lock so views never see
    /// one without the other.
    async fn install(
        &self,
        generation: u64,
        filter: Option<FilterSpec>,
        sets: Vec<ElementSet>,
        notice: Option<DataNotice>,
    ) -> Option<usize> {
        let mut store = self.store.write().await;
        let state = store.state();
        if state.request_generation != generation {
            tracing::debug!(
                "Discarding stale fetch result (generation {} < {})",
                generation,
                state.request_generation
            );
            return None;
        }

        let count = sets.len();
        let notice = notice.or_else(|| match &filter {
            Some(f) if count == 0 => Some(DataNotice::info(format!("No objects match the '{}' filter", f.id))),
            _ => None,
        });

        let refreshed_selection = {
            let mut catalog = self.catalog.write().await;
            *catalog = Arc::new(Catalog::new(sets, filter));
            state.selected_id().and_then(|id| catalog.get(id).cloned())
        };

        let mut commands = Vec::new();
        if let Some(set) = refreshed_selection {
            commands.push(Command::RefreshSelection(set));
        }
        if state.notice != notice {
            commands.push(Command::SetNotice(notice));
        }
        for command in commands {
            if let Err(e) = store.apply(command) {
                tracing::warn!("Failed to apply refreshed data: {}", e);
            }
        }

        Some(count)
    }

    /// Change the filter, then refetch under it if the store asks for it
    pub async fn set_filter(&self, filter: Option<FilterSpec>) -> Result<FilterChange, CommandRejected> {
        let transition = self.apply(Command::SetFilter(filter)).await?;
        let refresh = if transition.has(Effect::RefetchRequired) {
            Some(self.refresh().await)
        } else {
            None
        };
        Ok(FilterChange { transition, refresh })
    }

    /// Click or list pick in either view
    pub async fn on_user_select(&self, catalog_id: CatalogId) -> Result<Transition, CommandRejected> {
        let known = self.element_set(catalog_id).await;

        let mut store = self.store.write().await;
        if known.is_none() && !store.state().is_selected(catalog_id) {
            return Err(CommandRejected::UnknownObject(catalog_id));
        }
        store.apply(Command::SelectObject {
            catalog_id,
            element_set: known,
            origin: SelectionOrigin::User,
        })
    }

    /// Resolve a place name and make it the observer; `None` leaves the observer as is
    pub async fn set_observer_by_name(&self, query: &str) -> anyhow::Result<Option<Observer>> {
        let Some(geocoder) = &self.geocoder else {
            anyhow::bail!("Geocoding is not configured");
        };
        let Some(place) = geocoder.search(query).await? else {
            return Ok(None);
        };

        let observer = place.to_observer();
        self.apply(Command::SetObserver(Some(observer.clone()))).await?;
        tracing::info!(
            "Observer set to {} ({:.4}, {:.4})",
            place.display_name,
            observer.latitude_deg,
            observer.longitude_deg
        );
        Ok(Some(observer))
    }

    /// Sample every visible object at the shared simulated time for wall time `wall`.
    ///
    /// The playback loop of the selected object is driven by `wall` itself.
    pub async fn build_frame(&self, wall: DateTime<Utc>) -> Frame {
        let state = self.state().await;
        let catalog = self.catalog.read().await.clone();
        let instant = state.sim_now(wall);
        let selected = state.selected_id();

        let mut frame = Frame {
            mode: state.mode,
            instant,
            positions: Vec::new(),
            selected,
            show_tracks: state.show_tracks,
            notice: state.notice.clone(),
            propagation_failures: 0,
        };
        if !state.show_satellites {
            return frame;
        }

        let selected_set = selected.and_then(|id| {
            catalog.get(id).or_else(|| {
                state
                    .selection
                    .as_ref()
                    .and_then(|s| s.element_set.as_ref())
            })
        });

        let candidates: Vec<&ElementSet> = if state.show_only_selected && selected.is_some() {
            selected_set.into_iter().collect()
        } else {
            // The catalog may still belong to the previous filter until the refetch lands
            let refilter = catalog.filter != state.filter;
            let mut candidates: Vec<&ElementSet> = catalog
                .sets
                .iter()
                .filter(|s| {
                    Some(s.catalog_id) == selected || !refilter || matches(&s.display_name, state.filter.as_ref())
                })
                .collect();
            if let Some(set) = selected_set
                && !candidates.iter().any(|s| s.catalog_id == set.catalog_id)
            {
                candidates.push(set);
            }
            candidates
        };

        let observer = if state.overhead_only { state.observer.as_ref() } else { None };
        frame.positions.reserve(candidates.len());

        for chunk in candidates.chunks(self.options.chunk_size.max(1)) {
            {
                let mut clock = self.playback.lock().unwrap_or_else(|e| e.into_inner());
                for set in chunk {
                    let is_selected = selected == Some(set.catalog_id);
                    let sampled_at =
                        clock.sample_time_for(set.catalog_id, wall, instant, selected, state.show_tracks, &state.playback);
                    let gate = if is_selected { None } else { observer };

                    match self.sample_visible(set, sampled_at, gate) {
                        Ok(Some(position)) => frame.positions.push(FramePosition {
                            catalog_id: set.catalog_id,
                            display_name: set.display_name.clone(),
                            position,
                            sampled_at,
                            selected: is_selected,
                        }),
                        Ok(None) => {}
                        Err(e) => {
                            tracing::trace!("Skipping {} this frame: {}", set.catalog_id, e);
                            frame.propagation_failures += 1;
                        }
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        if frame.propagation_failures > 0 {
            tracing::debug!(
                "{} of {} objects failed to propagate at {}",
                frame.propagation_failures,
                candidates.len(),
                instant
            );
        }
        frame
    }

    /// `Ok(None)` when an observer is given and the object is below its horizon
    fn sample_visible(
        &self,
        set: &ElementSet,
        instant: DateTime<Utc>,
        observer: Option<&Observer>,
    ) -> Result<Option<GeodeticPosition>, PropagationFailure> {
        let eci = self.sampler.propagate_eci(set, instant)?;
        if let Some(observer) = observer
            && !is_overhead(observer, &eci, instant)
        {
            return Ok(None);
        }
        eci_to_geodetic(&eci, instant).map(Some)
    }
}

#[async_trait]
impl PositionProvider for Tracker {
    async fn position_at(&self, catalog_id: CatalogId, instant: DateTime<Utc>) -> SampleResult {
        let set = self
            .element_set(catalog_id)
            .await
            .ok_or(PropagationFailure::UnknownObject(catalog_id))?;
        let state = self.state().await;
        let sampled_at = self.playback.lock().unwrap_or_else(|e| e.into_inner()).sample_time_for(
            catalog_id,
            Utc::now(),
            instant,
            state.selected_id(),
            state.show_tracks,
            &state.playback,
        );
        self.sampler.sample(&set, sampled_at)
    }
}

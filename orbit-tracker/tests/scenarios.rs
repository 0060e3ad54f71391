//! End-to-end scenarios against an in-process element-set provider

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use orbit_common::{CatalogId, ElementSet, EciPosition, Observer};
use orbit_tracker::config::ProviderConfig;
use orbit_tracker::model::elements::{ElementSetClient, ElementSetService, FetchSource, RetryPolicy, SnapshotCache};
use orbit_tracker::module::filter::{matches, preset_filter};
use orbit_tracker::module::orbit::{position_from_look_angles, OrbitSampler, PropagationFailure, Propagator};
use orbit_tracker::module::store::{Command, SelectionOrigin, StoreState, SyncStore};
use orbit_tracker::module::tracker::{Tracker, TrackerOptions};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const ISS_LINE1: &str = "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
const ISS_LINE2: &str = "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

struct Provider {
    catalog: Vec<serde_json::Value>,
    group_status: Option<u16>,
    requests: Mutex<Vec<String>>,
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: usize,
}

fn record(id: u32, name: &str, line1: &str, line2: &str) -> serde_json::Value {
    serde_json::json!({
        "OBJECT_NAME": name,
        "NORAD_CAT_ID": id.to_string(),
        "TLE_LINE1": line1,
        "TLE_LINE2": line2,
    })
}

async fn active(State(provider): State<Arc<Provider>>, Query(q): Query<LimitQuery>) -> Response {
    provider.requests.lock().unwrap().push(format!("active:{}", q.limit));
    let rows: Vec<_> = provider.catalog.iter().take(q.limit).cloned().collect();
    Json(rows).into_response()
}

async fn group(State(provider): State<Arc<Provider>>, Query(q): Query<LimitQuery>) -> Response {
    provider.requests.lock().unwrap().push(format!("group:{}", q.limit));
    match provider.group_status {
        Some(code) => StatusCode::from_u16(code).unwrap().into_response(),
        None => Json(Vec::<serde_json::Value>::new()).into_response(),
    }
}

async fn serve(provider: Arc<Provider>) -> String {
    let app = Router::new()
        .route("/satellites/active", get(active))
        .route("/satellites/group/{group_id}", get(group))
        .with_state(provider);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn service(base_url: String) -> ElementSetService {
    let client = ElementSetClient::new(ProviderConfig {
        base_url,
        ..ProviderConfig::default()
    })
    .unwrap();
    ElementSetService::new(
        client,
        RetryPolicy {
            attempts: 1,
            base_delay: Duration::from_millis(1),
        },
    )
}

fn tracker(base_url: String, cache_dir: &std::path::Path, sampler: OrbitSampler) -> Tracker {
    Tracker::new(
        service(base_url),
        sampler,
        SnapshotCache::new(cache_dir),
        TrackerOptions {
            limit: 600,
            chunk_size: 64,
            loop_period: Duration::from_secs(10),
        },
    )
}

#[tokio::test]
async fn scenario_a_group_gateway_timeout_falls_back_to_local_filtering() {
    let catalog = (1..=2000u32)
        .map(|i| {
            let name = if i % 3 == 0 { format!("STARLINK-{}", i) } else { format!("COSMOS {} DEB", i) };
            record(i, &name, "1 line", "2 line")
        })
        .collect();
    let provider = Arc::new(Provider {
        catalog,
        group_status: Some(504),
        requests: Mutex::new(Vec::new()),
    });
    let service = service(serve(provider.clone()).await);

    let filter = preset_filter("starlink").unwrap();
    let candidates = service.fetch_candidates(600, Some(&filter)).await.unwrap();

    assert_eq!(candidates.source, FetchSource::GroupFallback);
    assert_eq!(candidates.sets.len(), 600);
    assert!(candidates.sets.iter().all(|s| s.display_name.contains("STARLINK")));
    assert!(candidates.sets.iter().all(|s| matches(&s.display_name, Some(&filter))));

    let requests = provider.requests.lock().unwrap().clone();
    assert_eq!(requests[0], "group:600");
    let fallback_limit: usize = requests[1].trim_start_matches("active:").parse().unwrap();
    assert!(fallback_limit >= 10_000);
}

#[test]
fn scenario_b_exempt_reselection_survives_same_filter() {
    let x = ElementSet::new(25544, "ISS (ZARYA)", ISS_LINE1, ISS_LINE2);
    let starlink = preset_filter("starlink");
    let mut store = SyncStore::new(StoreState::default());

    let select = || Command::SelectObject {
        catalog_id: x.catalog_id,
        element_set: Some(x.clone()),
        origin: SelectionOrigin::User,
    };

    store.apply(select()).unwrap();
    store.apply(Command::SetFilter(starlink.clone())).unwrap();
    assert!(store.state().selection.is_none());

    store.apply(select()).unwrap();
    assert_eq!(store.state().selected_id(), Some(25544));

    store.apply(Command::SetFilter(starlink)).unwrap();
    assert_eq!(store.state().selected_id(), Some(25544));
}

#[tokio::test]
async fn scenario_c_bad_element_set_is_absent_from_frame() {
    let temp_dir = TempDir::new().unwrap();
    let provider = Arc::new(Provider {
        catalog: vec![
            record(25544, "ISS (ZARYA)", ISS_LINE1, ISS_LINE2),
            record(99999, "BROKEN", "1 99999U garbage", "2 99999 garbage"),
        ],
        group_status: None,
        requests: Mutex::new(Vec::new()),
    });
    let tracker = tracker(serve(provider).await, temp_dir.path(), OrbitSampler::default());
    tracker.refresh().await.unwrap();
    assert_eq!(tracker.catalog().await.len(), 2);

    let wall = Utc.with_ymd_and_hms(2020, 7, 13, 0, 0, 0).unwrap();
    let frame = tracker.build_frame(wall).await;

    assert!(frame.contains(25544));
    assert!(!frame.contains(99999));
    assert_eq!(frame.propagation_failures, 1);

    let iss = frame.position_of(25544).unwrap();
    assert!(iss.position.latitude_deg.abs() <= 52.0);
    assert!(iss.position.longitude_deg > -180.0 && iss.position.longitude_deg <= 180.0);
}

/// Places each object at a precomputed inertial position
struct PlacedPropagator {
    positions: HashMap<CatalogId, EciPosition>,
}

impl Propagator for PlacedPropagator {
    fn propagate(&self, set: &ElementSet, _instant: DateTime<Utc>) -> Result<Option<EciPosition>, PropagationFailure> {
        Ok(self.positions.get(&set.catalog_id).copied())
    }
}

#[tokio::test]
async fn scenario_d_overhead_only_uses_observer_elevation() {
    let temp_dir = TempDir::new().unwrap();
    let instant = Utc.with_ymd_and_hms(2024, 6, 1, 22, 0, 0).unwrap();
    let observer = Observer::new(51.5, -0.1);

    let positions = HashMap::from([
        (1, position_from_look_angles(&observer, 120.0, -3.0, 1800.0, instant)),
        (2, position_from_look_angles(&observer, 300.0, 5.0, 1800.0, instant)),
    ]);
    let sampler = OrbitSampler::new(Arc::new(PlacedPropagator { positions }));

    let provider = Arc::new(Provider {
        catalog: vec![
            record(1, "BELOW HORIZON", "1 line", "2 line"),
            record(2, "ABOVE HORIZON", "1 line", "2 line"),
        ],
        group_status: None,
        requests: Mutex::new(Vec::new()),
    });
    let tracker = tracker(serve(provider).await, temp_dir.path(), sampler);
    tracker.refresh().await.unwrap();
    tracker.apply(Command::SetObserver(Some(observer))).await.unwrap();

    let frame = tracker.build_frame(instant).await;
    assert!(frame.contains(1) && frame.contains(2));

    tracker.apply(Command::SetOverheadOnly(true)).await.unwrap();
    let frame = tracker.build_frame(instant).await;
    assert!(!frame.contains(1));
    assert!(frame.contains(2));
}

///! HTTP client for the element-set provider
///!
///! `GET /satellites/active?limit=N` returns the unfiltered catalog,
///! `GET /satellites/group/{groupId}?limit=N` a server-side pre-filtered group.
use super::types::{parse_payload, DataError, FetchOutcome, FetchSource};
use crate::config::ProviderConfig;
use anyhow::{Context, Result};
use orbit_common::ElementSet;
use std::time::Duration;

#[derive(Clone)]
pub struct ElementSetClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl ElementSetClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        // Per-request timeouts are set on each call; the group and full paths differ
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Single fetch pass, no retries.
    ///
    /// With a group id the narrow endpoint is tried first under the short
    /// timeout; a timeout, 5xx or transport error falls back to the full
    /// catalog at `max(limit, fallback_limit)` rows so local filtering still
    /// has enough candidates. Fallback rows are returned untruncated.
    pub async fn fetch(&self, limit: usize, group_id: Option<&str>) -> Result<FetchOutcome, DataError> {
        let Some(group_id) = group_id else {
            let mut sets = self.fetch_active(limit, self.config.full_timeout()).await?;
            sets.truncate(limit);
            return Ok(FetchOutcome {
                sets,
                source: FetchSource::Full,
            });
        };

        match self.fetch_group(group_id, limit).await {
            Ok(mut sets) => {
                sets.truncate(limit);
                Ok(FetchOutcome {
                    sets,
                    source: FetchSource::Group,
                })
            }
            Err(e) if e.triggers_group_fallback() => {
                let fallback_limit = limit.max(self.config.fallback_limit);
                tracing::warn!(
                    "Group endpoint '{}' failed ({}), falling back to full catalog with limit {}",
                    group_id,
                    e,
                    fallback_limit
                );
                let sets = self
                    .fetch_active(fallback_limit, self.config.full_timeout())
                    .await?;
                Ok(FetchOutcome {
                    sets,
                    source: FetchSource::GroupFallback,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_group(&self, group_id: &str, limit: usize) -> Result<Vec<ElementSet>, DataError> {
        let url = format!(
            "{}/satellites/group/{}?limit={}",
            self.base_url(),
            urlencoding::encode(&group_id.to_uppercase()),
            limit
        );
        self.get_element_sets(&url, self.config.group_timeout()).await
    }

    async fn fetch_active(&self, limit: usize, timeout: Duration) -> Result<Vec<ElementSet>, DataError> {
        let url = format!("{}/satellites/active?limit={}", self.base_url(), limit);
        self.get_element_sets(&url, timeout).await
    }

    async fn get_element_sets(&self, url: &str, timeout: Duration) -> Result<Vec<ElementSet>, DataError> {
        tracing::debug!("GET {} (timeout {:?})", url, timeout);

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(DataError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataError::BadStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(DataError::from_reqwest)?;
        let (sets, dropped) = parse_payload(&body)?;
        if dropped > 0 {
            tracing::debug!("Dropped {} invalid element records from {}", dropped, url);
        }

        Ok(sets)
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! In-process stand-in for the element-set provider
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Copy)]
    pub enum GroupBehavior {
        Serve,
        Status(u16),
        Hang,
    }

    pub struct MockProvider {
        pub catalog: Mutex<Vec<serde_json::Value>>,
        pub group_behavior: GroupBehavior,
        pub active_status: Option<u16>,
        pub active_failures_before_success: usize,
        /// Held before every `/satellites/active` response
        pub active_delay_ms: AtomicU64,
        pub active_calls: AtomicUsize,
        pub group_calls: AtomicUsize,
        pub requested_limits: Mutex<Vec<(String, usize)>>,
    }

    impl MockProvider {
        pub fn new(catalog: Vec<serde_json::Value>) -> Self {
            Self {
                catalog: Mutex::new(catalog),
                group_behavior: GroupBehavior::Serve,
                active_status: None,
                active_failures_before_success: 0,
                active_delay_ms: AtomicU64::new(0),
                active_calls: AtomicUsize::new(0),
                group_calls: AtomicUsize::new(0),
                requested_limits: Mutex::new(Vec::new()),
            }
        }
    }

    #[derive(Deserialize)]
    struct LimitQuery {
        limit: usize,
    }

    pub fn record(id: u32, name: &str) -> serde_json::Value {
        serde_json::json!({
            "OBJECT_NAME": name,
            "NORAD_CAT_ID": id,
            "TLE_LINE1": format!("1 {:05}U 00000A   24001.00000000  .00000000  00000-0  00000-0 0  9990", id),
            "TLE_LINE2": format!("2 {:05}  53.0000   0.0000 0001000   0.0000   0.0000 15.00000000    00", id),
        })
    }

    async fn active(State(state): State<Arc<MockProvider>>, Query(q): Query<LimitQuery>) -> Response {
        let call = state.active_calls.fetch_add(1, Ordering::SeqCst);
        state
            .requested_limits
            .lock()
            .unwrap()
            .push(("active".to_string(), q.limit));

        if call < state.active_failures_before_success {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        if let Some(code) = state.active_status {
            return StatusCode::from_u16(code).unwrap().into_response();
        }

        let delay = state.active_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        let rows: Vec<_> = state.catalog.lock().unwrap().iter().take(q.limit).cloned().collect();
        Json(rows).into_response()
    }

    async fn group(
        State(state): State<Arc<MockProvider>>,
        Path(group_id): Path<String>,
        Query(q): Query<LimitQuery>,
    ) -> Response {
        state.group_calls.fetch_add(1, Ordering::SeqCst);
        state
            .requested_limits
            .lock()
            .unwrap()
            .push((format!("group:{}", group_id), q.limit));

        match state.group_behavior {
            GroupBehavior::Status(code) => StatusCode::from_u16(code).unwrap().into_response(),
            GroupBehavior::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                StatusCode::OK.into_response()
            }
            GroupBehavior::Serve => {
                let needle = group_id.to_uppercase();
                let rows: Vec<_> = state
                    .catalog
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|r| {
                        r["OBJECT_NAME"]
                            .as_str()
                            .map(|n| n.to_uppercase().contains(&needle))
                            .unwrap_or(false)
                    })
                    .take(q.limit)
                    .cloned()
                    .collect();
                Json(rows).into_response()
            }
        }
    }

    /// Serve the mock on an ephemeral port and return its base URL
    pub async fn spawn(provider: Arc<MockProvider>) -> String {
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
}

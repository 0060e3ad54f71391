///! Element-set data service: retry with linear backoff, request coalescing,
///! and candidate selection under a constellation filter.
use super::api_client::ElementSetClient;
use super::types::{DataError, FetchOutcome, FetchSource};
use crate::config::RetryConfig;
use crate::module::filter::matches;
use futures::future::{BoxFuture, FutureExt, Shared};
use orbit_common::{ElementSet, FilterSpec};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay slept before `attempt` (1-based): nothing before the first, then `base × (attempt-1)`
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.saturating_sub(1)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FetchKey {
    limit: usize,
    group_id: Option<String>,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<FetchOutcome>, DataError>>>;

/// Objects selected for display, plus where they came from
#[derive(Debug, Clone, PartialEq)]
pub struct Candidates {
    pub sets: Vec<ElementSet>,
    pub source: FetchSource,
}

#[derive(Clone)]
pub struct ElementSetService {
    client: ElementSetClient,
    retry: RetryPolicy,
    in_flight: Arc<Mutex<HashMap<FetchKey, SharedFetch>>>,
}

impl ElementSetService {
    pub fn new(client: ElementSetClient, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fetch with retries. Identical requests already in flight share one fetch.
    pub async fn fetch(&self, limit: usize, group_id: Option<&str>) -> Result<Arc<FetchOutcome>, DataError> {
        let key = FetchKey {
            limit,
            group_id: group_id.map(|g| g.to_lowercase()),
        };

        let shared = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match in_flight.get(&key) {
                Some(existing) => {
                    tracing::debug!("Joining in-flight fetch (limit {}, group {:?})", limit, key.group_id);
                    existing.clone()
                }
                None => {
                    let this = self.clone();
                    let owned_key = key.clone();
                    let fut = async move {
                        let result = this
                            .fetch_with_retry(owned_key.limit, owned_key.group_id.as_deref())
                            .await
                            .map(Arc::new);
                        this.in_flight
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, fut.clone());
                    fut
                }
            }
        };

        shared.await
    }

    async fn fetch_with_retry(&self, limit: usize, group_id: Option<&str>) -> Result<FetchOutcome, DataError> {
        let attempts = self.retry.attempts.max(1);
        let mut last_error = DataError::EmptyResult;

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.retry.delay_before(attempt);
                tracing::debug!(
                    "Retrying element-set fetch after {:?} (attempt {}/{})",
                    delay,
                    attempt,
                    attempts
                );
                tokio::time::sleep(delay).await;
            }

            match self.client.fetch(limit, group_id).await {
                Ok(outcome) => {
                    tracing::debug!(
                        "Fetched {} element sets ({:?}, limit {}, group {:?})",
                        outcome.sets.len(),
                        outcome.source,
                        limit,
                        group_id
                    );
                    return Ok(outcome);
                }
                Err(e) => {
                    if attempt == attempts {
                        tracing::error!("Element-set fetch failed after {} attempts: {}", attempts, e);
                    } else {
                        tracing::warn!("Attempt {}/{} failed: {}", attempt, attempts, e);
                    }
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Fetch and narrow to the objects the filter admits, at most `limit` of them
    pub async fn fetch_candidates(&self, limit: usize, filter: Option<&FilterSpec>) -> Result<Candidates, DataError> {
        let group_id = filter.and_then(|f| f.server_group_id.as_deref());
        let outcome = self.fetch(limit, group_id).await?;
        let trust_threshold = self.client.config().narrow_trust_threshold;

        Ok(Candidates {
            sets: select_candidates(&outcome, filter, limit, trust_threshold),
            source: outcome.source,
        })
    }
}

/// Apply the filter locally unless the narrow server result is small enough to trust.
///
/// The group endpoint is an optimization only; a large group result (or any
/// unfiltered result) goes through `matches` before truncation to `limit`.
pub fn select_candidates(
    outcome: &FetchOutcome,
    filter: Option<&FilterSpec>,
    limit: usize,
    trust_threshold: usize,
) -> Vec<ElementSet> {
    let trusted = outcome.source == FetchSource::Group && outcome.sets.len() < trust_threshold;

    outcome
        .sets
        .iter()
        .filter(|set| trusted || matches(&set.display_name, filter))
        .take(limit)
        .cloned()
        .collect()
}

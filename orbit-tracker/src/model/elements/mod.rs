///! Element-set data service
///!
///! - `ElementSetClient`: one fetch pass against the provider, with group fallback
///! - `ElementSetService`: retries, request coalescing, candidate selection
///! - `SnapshotCache`: last-known-good sets on disk

mod types;
pub use types::{parse_payload, DataError, FetchOutcome, FetchSource, RawElementRecord};

mod api_client;
pub use api_client::ElementSetClient;

mod service;
pub use service::{select_candidates, Candidates, ElementSetService, RetryPolicy};

mod cache;
pub use cache::{ElementSnapshot, SnapshotCache};

#[cfg(test)]
pub(crate) use api_client::test_server;

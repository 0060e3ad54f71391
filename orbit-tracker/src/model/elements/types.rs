///! Wire records, fetch outcomes and the data-service error taxonomy
use orbit_common::{CatalogId, ElementSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a fetch against the element-set provider.
///
/// Every variant is recoverable; callers retry with backoff before surfacing it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned HTTP {0}")]
    BadStatus(u16),

    #[error("provider returned no usable element sets")]
    EmptyResult,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl DataError {
    /// Errors that make a group fetch fall back to the full catalog
    pub fn triggers_group_fallback(&self) -> bool {
        match self {
            DataError::Timeout | DataError::Transport(_) => true,
            DataError::BadStatus(code) => (500..600).contains(code),
            DataError::EmptyResult | DataError::MalformedPayload(_) => false,
        }
    }

    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DataError::Timeout
        } else if e.is_decode() {
            DataError::MalformedPayload(e.to_string())
        } else {
            DataError::Transport(e.to_string())
        }
    }
}

/// One row as the provider sends it. Field names follow the provider's JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct RawElementRecord {
    #[serde(rename = "OBJECT_NAME", default)]
    pub object_name: Option<String>,

    #[serde(rename = "NORAD_CAT_ID", default)]
    pub norad_cat_id: Option<serde_json::Value>,

    #[serde(rename = "TLE_LINE1", default)]
    pub tle_line1: Option<String>,

    #[serde(rename = "TLE_LINE2", default)]
    pub tle_line2: Option<String>,
}

impl RawElementRecord {
    /// Validate into an element set; `None` means the row is dropped
    pub fn into_element_set(self) -> Option<ElementSet> {
        let catalog_id = parse_catalog_id(self.norad_cat_id.as_ref()?)?;
        let line1 = self.tle_line1?.trim().to_string();
        let line2 = self.tle_line2?.trim().to_string();
        if line1.is_empty() || line2.is_empty() {
            return None;
        }

        let display_name = self
            .object_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("NORAD {}", catalog_id));

        Some(ElementSet {
            catalog_id,
            display_name,
            line1,
            line2,
        })
    }
}

/// Catalog ids arrive as either JSON numbers or strings; both must be positive integers
fn parse_catalog_id(value: &serde_json::Value) -> Option<CatalogId> {
    let id = match value {
        serde_json::Value::Number(n) => n.as_u64()?,
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    if id == 0 {
        return None;
    }
    CatalogId::try_from(id).ok()
}

/// Parse a provider payload, dropping rows that fail validation.
///
/// Returns `(valid sets, dropped row count)`.
pub fn parse_payload(body: &str) -> Result<(Vec<ElementSet>, usize), DataError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| DataError::MalformedPayload(e.to_string()))?;

    let serde_json::Value::Array(rows) = value else {
        return Err(DataError::MalformedPayload(
            "expected a JSON array of element records".to_string(),
        ));
    };

    let total = rows.len();
    let sets: Vec<ElementSet> = rows
        .into_iter()
        .filter_map(|row| serde_json::from_value::<RawElementRecord>(row).ok())
        .filter_map(RawElementRecord::into_element_set)
        .collect();

    if sets.is_empty() {
        return Err(DataError::EmptyResult);
    }

    let dropped = total - sets.len();
    Ok((sets, dropped))
}

/// Where a fetch result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchSource {
    /// Server-side pre-filtered group endpoint
    Group,
    /// Unfiltered catalog requested directly
    Full,
    /// Unfiltered catalog fetched because the group endpoint failed
    GroupFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub sets: Vec<ElementSet>,
    pub source: FetchSource,
}

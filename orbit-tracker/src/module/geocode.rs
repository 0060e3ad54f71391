///! Place-name lookup for the observer location (Nominatim search API)
use crate::config::GeocodeConfig;
use anyhow::{Context, Result};
use orbit_common::Observer;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

impl GeocodeResult {
    pub fn to_observer(&self) -> Observer {
        Observer::new(self.latitude, self.longitude).with_label(self.display_name.clone())
    }
}

/// Nominatim returns coordinates as strings
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Clone)]
pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeocodeClient {
    pub fn new(config: &GeocodeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build geocoding HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Best match for a free-text place query.
    ///
    /// `Ok(None)` for an empty query, a non-success status, no hits, or
    /// unusable coordinates. Transport failures are errors.
    pub async fn search(&self, query: &str) -> Result<Option<GeocodeResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let url = format!(
            "{}/search?format=json&limit=1&q={}",
            self.base_url,
            urlencoding::encode(query)
        );
        tracing::debug!("Geocoding '{}'", query);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .context("Geocoding request failed")?;

        if !response.status().is_success() {
            tracing::warn!("Geocoding '{}' returned {}", query, response.status());
            return Ok(None);
        }

        let places: Vec<Place> = match response.json().await {
            Ok(places) => places,
            Err(e) => {
                tracing::warn!("Unreadable geocoding response for '{}': {}", query, e);
                return Ok(None);
            }
        };

        let Some(place) = places.into_iter().next() else {
            tracing::info!("No geocoding result for '{}'", query);
            return Ok(None);
        };

        let (Ok(latitude), Ok(longitude)) = (place.lat.trim().parse::<f64>(), place.lon.trim().parse::<f64>()) else {
            return Ok(None);
        };
        if !latitude.is_finite() || !longitude.is_finite() {
            return Ok(None);
        }

        Ok(Some(GeocodeResult {
            latitude,
            longitude,
            display_name: place
                .display_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| query.to_string()),
        }))
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// NORAD catalog number (unique, always positive)
pub type CatalogId = u32;

/// One tracked object: identity plus its two fixed-format element lines.
///
/// Element sets are replaced wholesale on refresh and never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSet {
    pub catalog_id: CatalogId,
    pub display_name: String,
    pub line1: String,
    pub line2: String,
}

impl ElementSet {
    pub fn new(
        catalog_id: CatalogId,
        display_name: impl Into<String>,
        line1: impl Into<String>,
        line2: impl Into<String>,
    ) -> Self {
        Self {
            catalog_id,
            display_name: display_name.into(),
            line1: line1.into(),
            line2: line2.into(),
        }
    }
}

/// Geodetic position of an object at one instant.
///
/// Longitude is always in (-180, 180], latitude in [-90, 90].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPosition {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_meters: f64,
}

/// Earth-centered inertial position in kilometers (TEME frame from SGP4)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EciPosition {
    pub x_km: f64,
    pub y_km: f64,
    pub z_km: f64,
}

impl EciPosition {
    pub fn new(x_km: f64, y_km: f64, z_km: f64) -> Self {
        Self { x_km, y_km, z_km }
    }

    pub fn is_finite(&self) -> bool {
        self.x_km.is_finite() && self.y_km.is_finite() && self.z_km.is_finite()
    }
}

/// Ground observer used to gate "overhead" queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    #[serde(default)]
    pub label: Option<String>,
}

impl Observer {
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Which projection is active. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ViewMode {
    #[default]
    #[serde(rename = "3d")]
    ThreeD,
    #[serde(rename = "2d")]
    TwoD,
}

impl ViewMode {
    pub const ALL: [ViewMode; 2] = [ViewMode::ThreeD, ViewMode::TwoD];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::ThreeD => "3d",
            ViewMode::TwoD => "2d",
        }
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "3d" | "globe" => Ok(ViewMode::ThreeD),
            "2d" | "map" => Ok(ViewMode::TwoD),
            _ => Err(format!("Unknown view mode: {}", s)),
        }
    }
}

/// Forward window covered by orbit playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HorizonHours {
    #[serde(rename = "12")]
    H12,
    #[default]
    #[serde(rename = "24")]
    H24,
    #[serde(rename = "48")]
    H48,
    #[serde(rename = "168")]
    H168,
}

impl HorizonHours {
    pub const ALL: [HorizonHours; 4] = [
        HorizonHours::H12,
        HorizonHours::H24,
        HorizonHours::H48,
        HorizonHours::H168,
    ];

    pub fn hours(&self) -> u32 {
        match self {
            HorizonHours::H12 => 12,
            HorizonHours::H24 => 24,
            HorizonHours::H48 => 48,
            HorizonHours::H168 => 168,
        }
    }

    pub fn minutes(&self) -> u32 {
        self.hours() * 60
    }
}

impl std::str::FromStr for HorizonHours {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('h') {
            "12" => Ok(HorizonHours::H12),
            "24" => Ok(HorizonHours::H24),
            "48" => Ok(HorizonHours::H48),
            "168" => Ok(HorizonHours::H168),
            _ => Err(format!("Unsupported playback horizon: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub horizon: HorizonHours,
    /// Bumped on every reset; any frozen sample instant from an older epoch is void
    pub reset_epoch: u64,
}

/// A constellation filter: keyword set plus an optional server-side group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Filter identifier, also used as a secondary match term
    pub id: String,
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub server_group_id: Option<String>,
}

impl FilterSpec {
    pub fn new<I, S>(id: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            server_group_id: None,
        }
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.server_group_id = Some(group_id.into());
        self
    }
}

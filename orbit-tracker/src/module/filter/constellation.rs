///! Constellation filter: keyword matching over normalized object names
use orbit_common::FilterSpec;

/// Uppercase and strip everything that is not an ASCII letter or digit.
///
/// "Starlink-1007" and "STARLINK 1007" both become "STARLINK1007".
pub fn normalize_name(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Whether `display_name` belongs to the filtered constellation.
///
/// Any keyword contained in the normalized name is a match. Failing that, the
/// filter id itself is tried in both directions, which recovers filters whose
/// id was never listed as a keyword. No filter passes everything.
pub fn matches(display_name: &str, filter: Option<&FilterSpec>) -> bool {
    let Some(filter) = filter else {
        return true;
    };

    let name = normalize_name(display_name);

    let keyword_hit = filter
        .keywords
        .iter()
        .map(|k| normalize_name(k))
        .any(|k| !k.is_empty() && name.contains(&k));
    if keyword_hit {
        return true;
    }

    // Empty strings would contain (or be contained by) anything
    let id = normalize_name(&filter.id);
    if id.is_empty() || name.is_empty() {
        return false;
    }
    name.contains(&id) || id.contains(&name)
}

/// A named constellation the views offer as a ready-made filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstellationPreset {
    pub id: &'static str,
    pub label: &'static str,
    pub category: &'static str,
    pub keywords: &'static [&'static str],
    /// Server-side group endpoint id, when the provider has one
    pub group_id: Option<&'static str>,
}

impl ConstellationPreset {
    pub fn to_filter(&self) -> FilterSpec {
        let spec = FilterSpec::new(self.id, self.keywords.iter().copied());
        match self.group_id {
            Some(group) => spec.with_group(group),
            None => spec,
        }
    }
}

pub const CONSTELLATION_PRESETS: &[ConstellationPreset] = &[
    ConstellationPreset { id: "finder", label: "Finder", category: "Finder", keywords: &["FINDER"], group_id: None },
    ConstellationPreset { id: "starlink", label: "Starlink", category: "Internet", keywords: &["STARLINK"], group_id: Some("starlink") },
    ConstellationPreset { id: "kuiper", label: "LEO (Kuiper)", category: "Internet", keywords: &["LEO (KUIPER)", "KUIPER"], group_id: Some("leokuiper") },
    ConstellationPreset { id: "oneweb", label: "OneWeb", category: "Internet", keywords: &["ONEWEB"], group_id: Some("oneweb") },
    ConstellationPreset { id: "guowang", label: "Guowang", category: "Internet", keywords: &["GUOWANG"], group_id: None },
    ConstellationPreset { id: "galaxyspace", label: "GalaxySpace", category: "Internet", keywords: &["GALAXYSPACE"], group_id: None },
    ConstellationPreset { id: "espace", label: "E-space", category: "Internet", keywords: &["E-SPACE", "ESPACE"], group_id: None },
    ConstellationPreset { id: "gps", label: "GPS", category: "Positioning", keywords: &["GPS", "NAVSTAR"], group_id: Some("gps") },
    ConstellationPreset { id: "galileo", label: "Galileo", category: "Positioning", keywords: &["GALILEO"], group_id: Some("galileo") },
    ConstellationPreset { id: "glonass", label: "GLONASS", category: "Positioning", keywords: &["GLONASS"], group_id: Some("glonass") },
    ConstellationPreset { id: "beidou", label: "BeiDou", category: "Positioning", keywords: &["BEIDOU"], group_id: Some("beidou") },
    ConstellationPreset { id: "swarm", label: "Swarm", category: "Science", keywords: &["SWARM"], group_id: Some("swarm") },
    ConstellationPreset { id: "orbcomm", label: "Orbcomm", category: "IoT", keywords: &["ORBCOMM"], group_id: Some("orbcomm") },
    ConstellationPreset { id: "geespace", label: "Geespace", category: "IoT", keywords: &["GEESPACE"], group_id: None },
    ConstellationPreset { id: "tianqi", label: "Tianqi", category: "IoT", keywords: &["TIANQI"], group_id: None },
    ConstellationPreset { id: "spire", label: "Spire", category: "Weather", keywords: &["SPIRE"], group_id: Some("spire") },
    ConstellationPreset { id: "planet", label: "Planet", category: "Earth Imaging", keywords: &["PLANET"], group_id: Some("planet") },
    ConstellationPreset { id: "jilin", label: "Jilin-1", category: "Earth Imaging", keywords: &["JILIN"], group_id: Some("jilin-1") },
    ConstellationPreset { id: "satelog", label: "Satelog", category: "Earth Imaging", keywords: &["SATELOG"], group_id: None },
];

/// Look up a preset by id, case-insensitively
pub fn find_preset(id: &str) -> Option<&'static ConstellationPreset> {
    let id = id.trim();
    CONSTELLATION_PRESETS
        .iter()
        .find(|p| p.id.eq_ignore_ascii_case(id))
}

/// Filter spec for a preset id; unknown ids mean "no filter"
pub fn preset_filter(id: &str) -> Option<FilterSpec> {
    find_preset(id).map(ConstellationPreset::to_filter)
}

/// First preset whose filter admits this name
pub fn detect_constellation(display_name: &str) -> Option<&'static ConstellationPreset> {
    if normalize_name(display_name).is_empty() {
        return None;
    }
    CONSTELLATION_PRESETS
        .iter()
        .find(|p| matches(display_name, Some(&p.to_filter())))
}

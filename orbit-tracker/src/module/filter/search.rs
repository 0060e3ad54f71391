///! Free-text search over the loaded catalog
use orbit_common::ElementSet;
use strsim::jaro_winkler;

/// Default similarity threshold for fuzzy matching
pub const DEFAULT_THRESHOLD: f64 = 0.85;

/// Search the catalog by name or catalog number.
///
/// # Search Priority
/// 1. Case-insensitive substring of the display name, or substring of the catalog id
/// 2. Fuzzy match (Jaro-Winkler similarity >= threshold), best first
///
/// An empty query returns the whole catalog in its original order.
pub fn search_catalog<'a>(query: &str, catalog: &'a [ElementSet], threshold: f64) -> Vec<&'a ElementSet> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return catalog.iter().collect();
    }

    let substring_hits: Vec<&ElementSet> = catalog
        .iter()
        .filter(|set| {
            set.display_name.to_lowercase().contains(&query)
                || set.catalog_id.to_string().contains(&query)
        })
        .collect();
    if !substring_hits.is_empty() {
        return substring_hits;
    }

    fuzzy_match(&query, catalog, threshold)
        .into_iter()
        .map(|(_, set)| set)
        .collect()
}

fn fuzzy_match<'a>(query: &str, catalog: &'a [ElementSet], threshold: f64) -> Vec<(f64, &'a ElementSet)> {
    let mut matches: Vec<(f64, &ElementSet)> = catalog
        .iter()
        .map(|set| (jaro_winkler(query, &set.display_name.to_lowercase()), set))
        .filter(|(score, _)| *score >= threshold)
        .collect();

    matches.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    matches
}

//! Construction des requêtes Overpass QL

use regex::Regex;

use crate::types::BoundingBox;
use crate::OverpassError;

/// Filtre par défaut: sentiers et pistes
pub const DEFAULT_HIGHWAY_PATTERN: &str = "^(path|track)$";

/// Timeout côté serveur Overpass (secondes), repris dans l'en-tête QL
pub const DEFAULT_SERVER_TIMEOUT_SECS: u32 = 25;

/// Filtre sur la valeur du tag `highway`
///
/// Le même motif sert dans la requête QL et pour re-filtrer les ways reçus,
/// un miroir Overpass pouvant renvoyer plus que demandé.
#[derive(Debug, Clone)]
pub struct HighwayFilter {
    pattern: String,
    regex: Regex,
}

impl HighwayFilter {
    pub fn new(pattern: &str) -> Result<Self, OverpassError> {
        if pattern.contains('"') {
            return Err(OverpassError::invalid_filter(
                pattern,
                "double quotes are not allowed",
            ));
        }
        let regex =
            Regex::new(pattern).map_err(|e| OverpassError::invalid_filter(pattern, e.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Teste une valeur de tag `highway`
    pub fn matches(&self, highway: &str) -> bool {
        self.regex.is_match(highway)
    }
}

impl Default for HighwayFilter {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_HIGHWAY_PATTERN.to_string(),
            regex: Regex::new(DEFAULT_HIGHWAY_PATTERN).expect("default pattern is valid"),
        }
    }
}

/// Construit la requête QL: ways filtrés dans la bbox, géométrie incluse
///
/// Overpass attend l'ordre (sud, ouest, nord, est).
pub fn build_query(bbox: &BoundingBox, filter: &HighwayFilter, server_timeout_secs: u32) -> String {
    format!(
        "[out:json][timeout:{}];(way[\"highway\"~\"{}\"]({},{},{},{}););out geom;",
        server_timeout_secs,
        escape_ql(filter.pattern()),
        bbox.min_lat,
        bbox.min_lon,
        bbox.max_lat,
        bbox.max_lon
    )
}

/// Échappe les backslashes pour une chaîne QL entre guillemets
fn escape_ql(s: &str) -> String {
    s.replace('\\', "\\\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_order() {
        let bbox = BoundingBox::new(-120.0, 30.0, -119.9, 30.1).unwrap();
        let query = build_query(&bbox, &HighwayFilter::default(), 25);

        assert_eq!(
            query,
            "[out:json][timeout:25];(way[\"highway\"~\"^(path|track)$\"](30,-120,30.1,-119.9););out geom;"
        );
    }

    #[test]
    fn test_filter_matches() {
        let filter = HighwayFilter::default();
        assert!(filter.matches("path"));
        assert!(filter.matches("track"));
        assert!(!filter.matches("footway"));
        assert!(!filter.matches("pathway"));
    }

    #[test]
    fn test_filter_rejects_invalid() {
        assert!(HighwayFilter::new("^(path").is_err());
        assert!(HighwayFilter::new("a\"b").is_err());
    }

    #[test]
    fn test_escape_backslash() {
        let filter = HighwayFilter::new(r"^foot\w*$").unwrap();
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let query = build_query(&bbox, &filter, 10);
        assert!(query.contains(r#"~"^foot\\w*$""#), "{}", query);
    }
}

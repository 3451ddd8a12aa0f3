//! # overpass
//!
//! Requêtes et parsing Overpass API pour les chemins OSM (`highway=path|track`).
//!
//! ## Features
//!
//! - Construction de requêtes Overpass QL bornées par une bounding box
//! - Filtre regex sur le tag `highway`, appliqué aussi côté client
//! - Parsing des réponses `out geom` en `LineString` du crate `geo`
//! - Aucune I/O réseau: le transport est laissé à l'appelant
//!
//! ## Usage
//!
//! ```rust,ignore
//! use overpass::{build_query, parse_response, BoundingBox, HighwayFilter};
//!
//! let bbox = BoundingBox::new(-120.0, 30.0, -119.9, 30.1)?;
//! let filter = HighwayFilter::default();
//! let ql = build_query(&bbox, &filter, 25);
//!
//! // ... POST `data=<ql>` vers https://overpass-api.de/api/interpreter
//! let result = parse_response(&body, Some(&filter))?;
//! println!("{} chemins", result.features.len());
//! ```

pub mod error;
pub mod parser;
pub mod query;
pub mod types;

pub use error::OverpassError;
pub use parser::ParseResult;
pub use query::{build_query, HighwayFilter, DEFAULT_HIGHWAY_PATTERN, DEFAULT_SERVER_TIMEOUT_SECS};
pub use types::{BoundingBox, LineFeature, TrailTags};

/// Endpoint public par défaut
pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Parse une réponse Overpass brute (JSON).
///
/// # Arguments
///
/// * `data` - Corps de la réponse HTTP
/// * `filter` - Filtre `highway` optionnel appliqué aux ways reçus
///
/// # Returns
///
/// Un `ParseResult` contenant les chemins d'au moins deux vertices,
/// le nombre d'éléments ignorés et l'éventuelle remarque du serveur.
///
/// # Errors
///
/// Retourne `OverpassError` si le JSON est invalide ou si le serveur
/// n'a renvoyé qu'une remarque d'erreur.
pub fn parse_response(data: &[u8], filter: Option<&HighwayFilter>) -> Result<ParseResult, OverpassError> {
    parser::parse(data, filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_validation() {
        assert!(BoundingBox::new(-120.0, 30.0, -119.0, 31.0).is_ok());
        assert!(BoundingBox::new(-119.0, 30.0, -120.0, 31.0).is_err());
        assert!(BoundingBox::new(-120.0, 31.0, -119.0, 31.0).is_err());
        assert!(BoundingBox::new(f64::NAN, 30.0, -119.0, 31.0).is_err());
    }

    #[test]
    fn test_bbox_intersection() {
        let usa = BoundingBox::new(-179.0, 18.0, -66.0, 72.0).unwrap();
        let view = BoundingBox::new(-70.0, 40.0, -60.0, 45.0).unwrap();

        let clipped = view.intersection(&usa).unwrap();
        assert_eq!(clipped.as_array(), [-70.0, 40.0, -66.0, 45.0]);

        let europe = BoundingBox::new(2.0, 45.0, 6.0, 48.0).unwrap();
        assert!(europe.intersection(&usa).is_none());

        // Bord commun: intersection vide
        let edge = BoundingBox::new(-66.0, 40.0, -60.0, 45.0).unwrap();
        assert!(edge.intersection(&usa).is_none());
    }
}

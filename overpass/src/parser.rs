//! Parser pour les réponses JSON Overpass (`out geom`)

use std::collections::HashMap;

use geo::{Coord, LineString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::query::HighwayFilter;
use crate::types::{LineFeature, TrailTags};
use crate::OverpassError;

/// Enveloppe d'une réponse Overpass
#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    elements: Vec<RawElement>,
    #[serde(default)]
    remark: Option<String>,
}

/// Élément OSM brut (node, way ou relation)
#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(rename = "type")]
    kind: String,
    id: i64,
    #[serde(default)]
    geometry: Option<Vec<Option<RawPoint>>>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Vertex `{"lat":..,"lon":..}`, `null` quand le node est hors extrait
#[derive(Debug, Deserialize)]
struct RawPoint {
    lat: f64,
    lon: f64,
}

/// Résultat du parsing d'une réponse
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Chemins retenus, dans l'ordre de la réponse
    pub features: Vec<LineFeature>,

    /// Éléments sans aucune ligne (pas un way, pas de géométrie, < 2 vertices, filtre)
    pub skipped: usize,

    /// Remarque du serveur, le cas échéant
    pub remark: Option<String>,
}

/// Parse une réponse Overpass et retourne les ways sous forme de lignes
///
/// Une remarque serveur sans aucun élément est traitée comme une erreur
/// (timeout ou quota dépassé côté Overpass).
pub fn parse(data: &[u8], filter: Option<&HighwayFilter>) -> Result<ParseResult, OverpassError> {
    let raw: RawResponse = serde_json::from_slice(data)?;

    if raw.elements.is_empty() {
        if let Some(remark) = raw.remark {
            return Err(OverpassError::Remark(remark));
        }
    } else if let Some(ref remark) = raw.remark {
        warn!(remark = %remark, "Réponse Overpass partielle");
    }

    let mut result = ParseResult {
        features: Vec::with_capacity(raw.elements.len()),
        skipped: 0,
        remark: raw.remark,
    };

    for element in raw.elements {
        let pieces = to_line_features(element, filter);
        if pieces.is_empty() {
            result.skipped += 1;
        }
        result.features.extend(pieces);
    }

    debug!(
        features = result.features.len(),
        skipped = result.skipped,
        "Réponse Overpass parsée"
    );

    Ok(result)
}

/// Convertit un élément brut en lignes si c'est un way exploitable.
///
/// Un vertex `null` coupe le way: chaque tronçon d'au moins deux vertices
/// devient une ligne portant l'id et les tags du way.
fn to_line_features(element: RawElement, filter: Option<&HighwayFilter>) -> Vec<LineFeature> {
    if element.kind != "way" {
        return Vec::new();
    }
    let Some(geometry) = element.geometry else {
        return Vec::new();
    };

    let mut tags = element.tags;
    let highway = non_empty(tags.remove("highway"));

    if let Some(filter) = filter {
        match highway.as_deref() {
            Some(value) if filter.matches(value) => {}
            _ => return Vec::new(),
        }
    }

    let tags = TrailTags {
        highway,
        name: non_empty(tags.remove("name")),
        surface: non_empty(tags.remove("surface")),
    };

    geometry
        .split(|p| !p.as_ref().is_some_and(|p| p.lon.is_finite() && p.lat.is_finite()))
        .filter(|run| run.len() >= 2)
        .map(|run| LineFeature {
            id: element.id,
            geometry: run
                .iter()
                .flatten()
                .map(|p| Coord { x: p.lon, y: p.lat })
                .collect::<LineString<f64>>(),
            tags: tags.clone(),
        })
        .collect()
}

/// Tag vide = absent
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

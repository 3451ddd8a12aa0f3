//! Types de données pour le crate overpass

use geo::LineString;

use crate::OverpassError;

/// Rectangle géographique (degrés WGS84)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Crée une bounding box en vérifiant min < max sur les deux axes
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self, OverpassError> {
        let invalid = |reason| OverpassError::InvalidBoundingBox {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
            reason,
        };

        if ![min_lon, min_lat, max_lon, max_lat].iter().all(|v| v.is_finite()) {
            return Err(invalid("coordinates must be finite"));
        }
        if min_lon >= max_lon {
            return Err(invalid("min_lon must be lower than max_lon"));
        }
        if min_lat >= max_lat {
            return Err(invalid("min_lat must be lower than max_lat"));
        }

        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    /// Crée une bounding box depuis `[ouest, sud, est, nord]`
    pub fn from_array(bbox: [f64; 4]) -> Result<Self, OverpassError> {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }

    /// Intersection avec une autre box, `None` si le résultat est vide
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let min_lon = self.min_lon.max(other.min_lon);
        let min_lat = self.min_lat.max(other.min_lat);
        let max_lon = self.max_lon.min(other.max_lon);
        let max_lat = self.max_lat.min(other.max_lat);

        if min_lon >= max_lon || min_lat >= max_lat {
            return None;
        }

        Some(BoundingBox {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    /// Teste si un point (lon, lat) est dans la box (bords inclus)
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

/// Tags OSM conservés pour un chemin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrailTags {
    /// Valeur du tag `highway` (path, track, ...)
    pub highway: Option<String>,

    /// Nom du chemin
    pub name: Option<String>,

    /// Revêtement (`surface`)
    pub surface: Option<String>,
}

/// Un chemin OSM (way) avec sa géométrie et ses tags
#[derive(Debug, Clone, PartialEq)]
pub struct LineFeature {
    /// Identifiant OSM du way
    pub id: i64,

    /// Géométrie, au moins deux vertices (lon, lat)
    pub geometry: LineString<f64>,

    /// Tags retenus
    pub tags: TrailTags,
}

impl LineFeature {
    pub fn vertex_count(&self) -> usize {
        self.geometry.0.len()
    }
}

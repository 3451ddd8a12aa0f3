//! Viewport de la carte et clé de déduplication des requêtes

pub mod mercator;

use std::fmt;

use overpass::{BoundingBox, OverpassError};
use thiserror::Error;

/// Erreurs de construction d'un viewport
#[derive(Debug, Error)]
pub enum ViewportError {
    #[error(transparent)]
    Bounds(#[from] OverpassError),

    #[error("Invalid zoom level: {0}")]
    InvalidZoom(f64),
}

/// Région visible de la carte et niveau de zoom (éventuellement fractionnaire)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bbox: BoundingBox,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(bbox: BoundingBox, zoom: f64) -> Result<Self, ViewportError> {
        if !zoom.is_finite() || zoom < 0.0 {
            return Err(ViewportError::InvalidZoom(zoom));
        }
        Ok(Self { bbox, zoom })
    }

    /// Viewport depuis `[ouest, sud, est, nord]` en degrés
    pub fn from_bounds(bounds: [f64; 4], zoom: f64) -> Result<Self, ViewportError> {
        Self::new(BoundingBox::from_array(bounds)?, zoom)
    }

    /// Viewport depuis une emprise Web Mercator (EPSG:3857, mètres)
    pub fn from_web_mercator(
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
        zoom: f64,
    ) -> Result<Self, ViewportError> {
        let (min_lon, min_lat) = mercator::web_mercator_to_lon_lat(xmin, ymin);
        let (max_lon, max_lat) = mercator::web_mercator_to_lon_lat(xmax, ymax);
        Self::new(BoundingBox::new(min_lon, min_lat, max_lon, max_lat)?, zoom)
    }
}

/// Décimales maximales d'une clé (au-delà, `10^precision` déborde en `i64`)
pub const MAX_KEY_PRECISION: u8 = 9;

/// Empreinte d'une requête: bbox arrondie et zoom
///
/// Deux viewports qui s'arrondissent à la même clé ne déclenchent
/// pas de second chargement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    min_lon: i64,
    min_lat: i64,
    max_lon: i64,
    max_lat: i64,
    precision: u8,
    zoom_centi: i64,
}

impl FetchKey {
    /// Arrondit la bbox à `precision` décimales (bornée à `MAX_KEY_PRECISION`)
    /// et le zoom au centième
    pub fn new(bbox: &BoundingBox, zoom: f64, precision: u8) -> Self {
        let precision = precision.min(MAX_KEY_PRECISION);
        let scale = 10f64.powi(precision as i32);
        let q = |v: f64| (v * scale).round() as i64;

        Self {
            min_lon: q(bbox.min_lon),
            min_lat: q(bbox.min_lat),
            max_lon: q(bbox.max_lon),
            max_lat: q(bbox.max_lat),
            precision,
            zoom_centi: (zoom * 100.0).round() as i64,
        }
    }

    /// Zoom quantifié
    pub fn zoom(&self) -> f64 {
        self.zoom_centi as f64 / 100.0
    }
}

/// Écrit une valeur quantifiée en décimal fixe, sans passer par un flottant
fn write_fixed(f: &mut fmt::Formatter<'_>, value: i64, precision: u8) -> fmt::Result {
    if precision == 0 {
        return write!(f, "{}", value);
    }
    let scale = 10u64.pow(precision as u32);
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    write!(
        f,
        "{}{}.{:0width$}",
        sign,
        abs / scale,
        abs % scale,
        width = precision as usize
    )
}

impl fmt::Display for FetchKey {
    /// Format `ouest,sud,est,nord|zZ`, ex: `-120.000,30.000,-119.900,30.100|z14`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
            .into_iter()
            .enumerate()
        {
            if i > 0 {
                f.write_str(",")?;
            }
            write_fixed(f, v, self.precision)?;
        }

        let whole = self.zoom_centi / 100;
        let frac = self.zoom_centi % 100;
        match frac {
            0 => write!(f, "|z{}", whole),
            _ if frac % 10 == 0 => write!(f, "|z{}.{}", whole, frac / 10),
            _ => write!(f, "|z{}.{:02}", whole, frac),
        }
    }
}

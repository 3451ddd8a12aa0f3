//! Types d'erreurs pour le crate overpass

use thiserror::Error;

/// Erreurs pouvant survenir lors de la construction d'une requête ou du parsing d'une réponse
#[derive(Debug, Error)]
pub enum OverpassError {
    /// Réponse JSON illisible ou ne respectant pas le schéma Overpass
    #[error("Malformed Overpass response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// Le serveur a renvoyé une remarque d'erreur (timeout, quota, etc.)
    #[error("Overpass server remark: {0}")]
    Remark(String),

    /// Bounding box invalide (min >= max ou coordonnée non finie)
    #[error("Invalid bounding box [{min_lon}, {min_lat}, {max_lon}, {max_lat}]: {reason}")]
    InvalidBoundingBox {
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
        reason: &'static str,
    },

    /// Expression de filtre highway invalide
    #[error("Invalid highway filter '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },
}

impl OverpassError {
    /// Crée une erreur de filtre invalide avec contexte
    pub fn invalid_filter(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

//! Sources distantes de chemins

pub mod http;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use overpass::{BoundingBox, LineFeature, OverpassError};
use thiserror::Error;

pub use http::OverpassSource;

/// Erreurs d'une source distante
#[derive(Debug, Error)]
pub enum SourceError {
    /// Erreur réseau ou client HTTP
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Réponse HTTP non 2xx
    #[error("Source returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Délai dépassé
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Réponse illisible ou remarque d'erreur du serveur
    #[error(transparent)]
    Overpass(#[from] OverpassError),
}

/// Source de chemins interrogeable par bounding box
pub trait FeatureSource: Send + Sync {
    /// Charge les chemins contenus dans `bbox`
    fn fetch(
        &self,
        bbox: &BoundingBox,
    ) -> impl Future<Output = Result<Vec<LineFeature>, SourceError>> + Send;
}

impl<T: FeatureSource> FeatureSource for Arc<T> {
    fn fetch(
        &self,
        bbox: &BoundingBox,
    ) -> impl Future<Output = Result<Vec<LineFeature>, SourceError>> + Send {
        (**self).fetch(bbox)
    }
}

//! Source Overpass via HTTP (`reqwest`)
//!
//! Poste la requête QL dans le champ de formulaire `data`, puis parse la
//! réponse JSON avec le crate `overpass`.

use std::time::Duration;

use overpass::{build_query, BoundingBox, HighwayFilter, LineFeature};
use tracing::{debug, warn};

use super::{FeatureSource, SourceError};
use crate::config::SourceConfig;

/// Taille maximale du corps d'erreur conservé dans `SourceError::Status`
const MAX_ERROR_BODY: usize = 200;

/// Client Overpass avec connexion réutilisable et timeout borné
pub struct OverpassSource {
    http: reqwest::Client,
    endpoint: String,
    filter: HighwayFilter,
    server_timeout_secs: u32,
    timeout: Duration,
}

impl OverpassSource {
    pub fn new(config: &SourceConfig, timeout: Duration) -> Result<Self, SourceError> {
        let filter = HighwayFilter::new(&config.highway_pattern)?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("trail-overlay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Http(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            filter,
            server_timeout_secs: config.server_timeout_secs,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_reqwest(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else {
            SourceError::Http(e.to_string())
        }
    }
}

impl FeatureSource for OverpassSource {
    async fn fetch(&self, bbox: &BoundingBox) -> Result<Vec<LineFeature>, SourceError> {
        let query = build_query(bbox, &self.filter, self.server_timeout_secs);
        debug!(endpoint = %self.endpoint, query = %query, "Requête Overpass");

        let response = self
            .http
            .post(&self.endpoint)
            .form(&[("data", query.as_str())])
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            warn!(status = status.as_u16(), "Réponse Overpass en erreur");
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.map_reqwest(e))?;
        let result = overpass::parse_response(&bytes, Some(&self.filter))?;

        debug!(
            features = result.features.len(),
            skipped = result.skipped,
            bytes = bytes.len(),
            "Chemins Overpass reçus"
        );

        Ok(result.features)
    }
}

//! Configuration du synchroniseur

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use overpass::{BoundingBox, HighwayFilter};

use crate::sync::SyncSettings;
use crate::viewport::MAX_KEY_PRECISION;

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Zoom minimum pour afficher (et charger) les chemins
    #[serde(default = "default_min_zoom")]
    pub min_display_zoom: f64,

    /// Région autorisée `[ouest, sud, est, nord]`, `null` pour le monde entier
    #[serde(default)]
    pub allowed_region: Option<[f64; 4]>,

    /// Décimales conservées dans la clé de déduplication (3 ≈ 100 m)
    #[serde(default = "default_precision")]
    pub coordinate_precision: u8,

    /// Timeout d'un chargement complet (secondes)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Délai de stabilisation du viewport (millisecondes)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Titre de la couche affichée
    #[serde(default = "default_title")]
    pub layer_title: String,

    #[serde(default)]
    pub source: SourceConfig,
}

/// Configuration de la source Overpass
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Endpoint de l'interpréteur Overpass
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Regex appliquée au tag `highway`
    #[serde(default = "default_highway_pattern")]
    pub highway_pattern: String,

    /// Timeout annoncé au serveur dans la requête QL (secondes)
    #[serde(default = "default_server_timeout_secs")]
    pub server_timeout_secs: u32,
}

fn default_min_zoom() -> f64 {
    13.0
}

fn default_precision() -> u8 {
    3
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_title() -> String {
    "OSM Paths/Tracks".to_string()
}

fn default_endpoint() -> String {
    overpass::DEFAULT_ENDPOINT.to_string()
}

fn default_highway_pattern() -> String {
    overpass::DEFAULT_HIGHWAY_PATTERN.to_string()
}

fn default_server_timeout_secs() -> u32 {
    overpass::DEFAULT_SERVER_TIMEOUT_SECS
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            highway_pattern: default_highway_pattern(),
            server_timeout_secs: default_server_timeout_secs(),
        }
    }
}

impl SourceConfig {
    /// Compile le filtre `highway`
    pub fn highway_filter(&self) -> Result<HighwayFilter> {
        HighwayFilter::new(&self.highway_pattern).context("Invalid source.highway_pattern")
    }
}

impl SyncConfig {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "usa" => Self::load_embedded(include_str!("presets/usa.json")),
            "world" => Self::load_embedded(include_str!("presets/world.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: usa, world", preset),
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Preset si le nom est connu, fichier JSON sinon
    pub fn resolve(name: &str) -> Result<Self> {
        match name {
            "usa" | "world" => Self::from_preset(name),
            path => Self::load(Path::new(path)),
        }
    }

    /// Surcharges depuis l'environnement (`OVERPASS_URL`, `OVERPASS_TIMEOUT_SECS`, `OVERLAY_MIN_ZOOM`)
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("OVERPASS_URL") {
            self.source.endpoint = url;
        }
        if let Some(secs) = lookup("OVERPASS_TIMEOUT_SECS") {
            self.fetch_timeout_secs = secs
                .parse()
                .context(format!("Invalid OVERPASS_TIMEOUT_SECS: {}", secs))?;
        }
        if let Some(zoom) = lookup("OVERLAY_MIN_ZOOM") {
            self.min_display_zoom = zoom
                .parse()
                .context(format!("Invalid OVERLAY_MIN_ZOOM: {}", zoom))?;
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Région autorisée validée
    pub fn allowed_region(&self) -> Result<Option<BoundingBox>> {
        self.allowed_region
            .map(BoundingBox::from_array)
            .transpose()
            .context("Invalid allowed_region")
    }

    /// Valide la configuration et produit les réglages du synchroniseur
    pub fn settings(&self) -> Result<SyncSettings> {
        if !self.min_display_zoom.is_finite() {
            anyhow::bail!("min_display_zoom must be finite");
        }
        if self.coordinate_precision > MAX_KEY_PRECISION {
            anyhow::bail!(
                "coordinate_precision must be at most {}, got {}",
                MAX_KEY_PRECISION,
                self.coordinate_precision
            );
        }
        if self.fetch_timeout_secs == 0 {
            anyhow::bail!("fetch_timeout_secs must be positive");
        }
        self.source.highway_filter()?;

        Ok(SyncSettings {
            min_display_zoom: self.min_display_zoom,
            allowed_region: self.allowed_region()?,
            coordinate_precision: self.coordinate_precision,
            fetch_timeout: self.fetch_timeout(),
            layer_title: self.layer_title.clone(),
        })
    }
}

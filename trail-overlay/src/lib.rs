//! # trail-overlay
//!
//! Overlay de chemins OpenStreetMap (`highway=path|track`) synchronisé avec
//! le viewport d'une carte.
//!
//! ## Features
//!
//! - Un seul overlay attaché à la fois, remplacé à chaque viewport stabilisé
//! - Pas de requête sous le zoom minimum ni hors de la région autorisée
//! - Déduplication par clé arrondie (bbox + zoom)
//! - Réponses périmées ignorées, chargements bornés par un timeout
//! - Ressources temporaires libérées au remplacement et à la fermeture
//!
//! ## Usage CLI
//!
//! ```bash
//! # Charger une zone et l'écrire en GeoJSON
//! trail-overlay fetch --bbox=-120,30,-119.9,30.1 --output ./trails.geojson
//!
//! # Rejouer une session de navigation (JSON lines)
//! trail-overlay replay --events ./session.jsonl --output-dir ./overlays/
//! ```

pub mod config;
pub mod overlay;
pub mod report;
pub mod source;
pub mod sync;
pub mod viewport;

pub use config::{SourceConfig, SyncConfig};
pub use overlay::{
    InMemoryMapView, LayerId, MapView, MemoryAllocator, OverlayLayer, ResourceAllocator,
    ResourceHandle, TempFileAllocator,
};
pub use report::{SyncReport, SyncStatus};
pub use source::{FeatureSource, OverpassSource, SourceError};
pub use sync::settle::SettleDebouncer;
pub use sync::{SettleOutcome, SyncError, SyncSettings, ViewportOverlaySynchronizer};
pub use viewport::{FetchKey, Viewport, ViewportError};

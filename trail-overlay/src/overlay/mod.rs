//! Overlay de chemins et vue cartographique

pub mod geojson;
pub mod resource;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use overpass::LineFeature;

use crate::viewport::FetchKey;

pub use resource::{MemoryAllocator, ResourceAllocator, ResourceError, ResourceHandle, TempFileAllocator};

/// Identifiant d'un overlay sur la carte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

/// Couche de chemins affichée pour un viewport
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    pub id: LayerId,
    /// Clé de la requête dont l'overlay est issu
    pub key: FetchKey,
    pub title: String,
    /// Ressource temporaire contenant le GeoJSON
    pub handle: ResourceHandle,
    pub features: Arc<[LineFeature]>,
}

impl OverlayLayer {
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

/// Vue cartographique: ajout et retrait de couches
///
/// Appelée sous le verrou du synchroniseur: une implémentation ne doit pas
/// rappeler le synchroniseur depuis ces méthodes.
pub trait MapView: Send + Sync {
    fn add_layer(&self, layer: &OverlayLayer);

    fn remove_layer(&self, id: LayerId);
}

impl<T: MapView + ?Sized> MapView for Arc<T> {
    fn add_layer(&self, layer: &OverlayLayer) {
        (**self).add_layer(layer)
    }

    fn remove_layer(&self, id: LayerId) {
        (**self).remove_layer(id)
    }
}

/// Carte en mémoire qui enregistre les couches attachées
#[derive(Default)]
pub struct InMemoryMapView {
    layers: Mutex<Vec<OverlayLayer>>,
    max_attached: AtomicUsize,
}

impl InMemoryMapView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Couches actuellement attachées
    pub fn attached(&self) -> Vec<OverlayLayer> {
        self.layers.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn attached_count(&self) -> usize {
        self.layers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Nombre maximum de couches attachées simultanément depuis la création
    pub fn max_attached(&self) -> usize {
        self.max_attached.load(Ordering::Relaxed)
    }
}

impl MapView for InMemoryMapView {
    fn add_layer(&self, layer: &OverlayLayer) {
        let mut layers = self.layers.lock().unwrap_or_else(PoisonError::into_inner);
        layers.push(layer.clone());
        self.max_attached.fetch_max(layers.len(), Ordering::Relaxed);
    }

    fn remove_layer(&self, id: LayerId) {
        self.layers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| l.id != id);
    }
}

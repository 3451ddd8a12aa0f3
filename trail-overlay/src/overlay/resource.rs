//! Ressources temporaires adressables adossées aux overlays
//!
//! Chaque overlay est construit depuis un GeoJSON sérialisé exposé via un
//! handle (fichier temporaire, buffer mémoire). Le handle doit être libéré
//! quand l'overlay est retiré.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

/// Erreurs d'allocation de ressource
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Failed to write overlay resource {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource allocator unavailable: {0}")]
    Unavailable(String),
}

/// Handle opaque vers une ressource temporaire (URI)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Allocateur de ressources temporaires
pub trait ResourceAllocator: Send + Sync {
    /// Crée un handle adressable depuis des données sérialisées
    fn create(&self, data: Vec<u8>) -> Result<ResourceHandle, ResourceError>;

    /// Libère un handle (sans effet s'il est inconnu)
    fn release(&self, handle: &ResourceHandle);
}

impl<T: ResourceAllocator + ?Sized> ResourceAllocator for Arc<T> {
    fn create(&self, data: Vec<u8>) -> Result<ResourceHandle, ResourceError> {
        (**self).create(data)
    }

    fn release(&self, handle: &ResourceHandle) {
        (**self).release(handle)
    }
}

/// Fichiers temporaires `overlay-<hash>-<n>.geojson` dans un répertoire
pub struct TempFileAllocator {
    dir: PathBuf,
    counter: AtomicU64,
}

impl TempFileAllocator {
    /// Crée l'allocateur (et le répertoire si besoin)
    pub fn new(dir: &Path) -> Result<Self, ResourceError> {
        std::fs::create_dir_all(dir).map_err(|source| ResourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        Ok(Self {
            dir: dir.to_path_buf(),
            counter: AtomicU64::new(0),
        })
    }

    /// Chemin du fichier derrière un handle
    pub fn path_of(handle: &ResourceHandle) -> PathBuf {
        PathBuf::from(handle.as_str())
    }
}

impl ResourceAllocator for TempFileAllocator {
    fn create(&self, data: Vec<u8>) -> Result<ResourceHandle, ResourceError> {
        let digest = blake3::hash(&data);
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!(
            "overlay-{}-{}.geojson",
            hex::encode(&digest.as_bytes()[..8]),
            n
        ));

        std::fs::write(&path, &data).map_err(|source| ResourceError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), bytes = data.len(), "Ressource overlay créée");
        Ok(ResourceHandle::new(path.to_string_lossy()))
    }

    fn release(&self, handle: &ResourceHandle) {
        let path = Self::path_of(handle);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Ressource overlay libérée"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Impossible de supprimer la ressource"),
        }
    }
}

/// Ressources conservées en mémoire, `mem://<n>`
#[derive(Default)]
pub struct MemoryAllocator {
    next: AtomicU64,
    live: Mutex<HashMap<ResourceHandle, Vec<u8>>>,
}

impl MemoryAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nombre de ressources non libérées
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Contenu d'une ressource vivante
    pub fn get(&self, handle: &ResourceHandle) -> Option<Vec<u8>> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
    }
}

impl ResourceAllocator for MemoryAllocator {
    fn create(&self, data: Vec<u8>) -> Result<ResourceHandle, ResourceError> {
        let handle = ResourceHandle::new(format!("mem://{}", self.next.fetch_add(1, Ordering::Relaxed)));
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.clone(), data);
        Ok(handle)
    }

    fn release(&self, handle: &ResourceHandle) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle);
    }
}

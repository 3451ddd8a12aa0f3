//! Synchronisation de l'overlay de chemins avec le viewport
//!
//! Un `ViewportOverlaySynchronizer` par vue cartographique. Il maintient au
//! plus un overlay attaché, reflétant le dernier viewport stabilisé:
//!
//! ```text
//! settle(viewport)
//!   zoom < min_display_zoom      -> retire l'overlay, pas de requête
//!   bbox ∩ région autorisée = ∅  -> retire l'overlay, pas de requête
//!   clé == dernière clé émise    -> rien
//!   sinon                        -> clé mémorisée AVANT l'await, requête
//!       réponse périmée          -> ignorée
//!       >= 1 chemin              -> ancien overlay retiré et libéré, nouveau ajouté
//!       0 chemin                 -> overlay retiré
//!       échec / timeout          -> overlay retiré, clé oubliée (nouvel essai possible)
//!   settle abandonné en vol      -> clé oubliée
//! ```
//!
//! L'état est protégé par un `Mutex` jamais tenu pendant un `.await`: plusieurs
//! appels concurrents sur une même tâche (`join!`, `FuturesUnordered`) modélisent
//! la boucle d'événements mono-thread d'une UI.

pub mod settle;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use geozero::error::GeozeroError;
use overpass::{BoundingBox, LineFeature};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::overlay::{
    self, LayerId, MapView, OverlayLayer, ResourceAllocator, ResourceError, ResourceHandle,
};
use crate::report::SyncReport;
use crate::source::{FeatureSource, SourceError};
use crate::viewport::{FetchKey, Viewport};

/// Réglages validés du synchroniseur
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub min_display_zoom: f64,
    /// `None`: pas de restriction
    pub allowed_region: Option<BoundingBox>,
    pub coordinate_precision: u8,
    pub fetch_timeout: Duration,
    pub layer_title: String,
}

impl Default for SyncSettings {
    /// Réglages du preset `usa`
    fn default() -> Self {
        Self {
            min_display_zoom: 13.0,
            allowed_region: Some(BoundingBox {
                min_lon: -179.0,
                min_lat: 18.0,
                max_lon: -66.0,
                max_lat: 72.0,
            }),
            coordinate_precision: 3,
            fetch_timeout: Duration::from_secs(30),
            layer_title: "OSM Paths/Tracks".to_string(),
        }
    }
}

/// Échec d'un chargement, absorbé localement
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to serialize overlay: {0}")]
    Serialize(#[from] GeozeroError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Issue d'un événement de viewport stabilisé
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Zoom sous le seuil: overlay retiré
    BelowMinZoom,
    /// Viewport hors de la région autorisée: overlay retiré
    OutsideRegion,
    /// Même clé que la dernière requête émise
    Duplicate(FetchKey),
    /// Nouvel overlay attaché
    Installed { key: FetchKey, features: usize },
    /// Aucun chemin: overlay retiré
    Empty(FetchKey),
    /// Échec du chargement: overlay retiré, clé oubliée
    Failed(FetchKey),
    /// Réponse arrivée après une requête plus récente: ignorée
    Stale(FetchKey),
}

/// Dernière requête émise
#[derive(Debug)]
struct Issued {
    key: FetchKey,
    seq: u64,
}

#[derive(Debug, Default)]
struct State {
    issued: Option<Issued>,
    next_seq: u64,
    overlay: Option<OverlayLayer>,
    next_layer_id: u64,
    report: SyncReport,
}

impl State {
    fn is_latest(&self, seq: u64) -> bool {
        self.issued.as_ref().is_some_and(|i| i.seq == seq)
    }
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Overlay prêt à être attaché
struct Prepared {
    handle: ResourceHandle,
    features: Vec<LineFeature>,
}

/// Oublie la requête `seq` si le settle est abandonné avant sa réponse
/// (timeout de l'appelant, branche perdante d'un `select!`, tâche annulée).
struct IssueGuard<'a> {
    state: &'a Mutex<State>,
    seq: u64,
    armed: bool,
}

impl IssueGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for IssueGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = lock_state(self.state);
        if state.is_latest(self.seq) {
            debug!(seq = self.seq, "Chargement abandonné, clé oubliée");
            state.issued = None;
            state.report.abandoned += 1;
        }
    }
}

/// Maintient un overlay unique cohérent avec le viewport courant
pub struct ViewportOverlaySynchronizer<S, M, A>
where
    S: FeatureSource,
    M: MapView,
    A: ResourceAllocator,
{
    settings: SyncSettings,
    source: S,
    map: M,
    allocator: A,
    state: Mutex<State>,
}

impl<S, M, A> ViewportOverlaySynchronizer<S, M, A>
where
    S: FeatureSource,
    M: MapView,
    A: ResourceAllocator,
{
    pub fn new(settings: SyncSettings, source: S, map: M, allocator: A) -> Self {
        Self {
            settings,
            source,
            map,
            allocator,
            state: Mutex::new(State::default()),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock_state(&self.state)
    }

    /// Clé de la dernière requête émise (en vol ou aboutie)
    pub fn current_key(&self) -> Option<FetchKey> {
        self.lock().issued.as_ref().map(|i| i.key.clone())
    }

    /// Overlay actuellement attaché
    pub fn overlay(&self) -> Option<OverlayLayer> {
        self.lock().overlay.clone()
    }

    /// Copie des compteurs
    pub fn report(&self) -> SyncReport {
        self.lock().report.clone()
    }

    /// Traite un viewport stabilisé.
    ///
    /// Ne retourne qu'une fois l'overlay remplacé ou retiré. Les erreurs sont
    /// journalisées et absorbées: la boucle d'événements n'est jamais interrompue.
    pub async fn on_viewport_settled(&self, viewport: Viewport) -> SettleOutcome {
        let (key, seq, bbox) = {
            let mut state = self.lock();
            state.report.settles += 1;

            if viewport.zoom < self.settings.min_display_zoom {
                trace!(
                    zoom = viewport.zoom,
                    min_zoom = self.settings.min_display_zoom,
                    "Zoom insuffisant"
                );
                state.report.below_min_zoom += 1;
                self.reset(&mut state);
                return SettleOutcome::BelowMinZoom;
            }

            let bbox = match &self.settings.allowed_region {
                Some(region) => match viewport.bbox.intersection(region) {
                    Some(clipped) => clipped,
                    None => {
                        trace!(bbox = ?viewport.bbox.as_array(), "Viewport hors région");
                        state.report.outside_region += 1;
                        self.reset(&mut state);
                        return SettleOutcome::OutsideRegion;
                    }
                },
                None => viewport.bbox,
            };

            let key = FetchKey::new(&bbox, viewport.zoom, self.settings.coordinate_precision);
            if state.issued.as_ref().is_some_and(|i| i.key == key) {
                trace!(key = %key, "Requête déjà émise");
                state.report.duplicates_skipped += 1;
                return SettleOutcome::Duplicate(key);
            }

            let seq = state.next_seq;
            state.next_seq += 1;
            state.issued = Some(Issued {
                key: key.clone(),
                seq,
            });
            state.report.fetches_issued += 1;

            (key, seq, bbox)
        };

        // Settle abandonné pendant le chargement: la clé est oubliée
        let guard = IssueGuard {
            state: &self.state,
            seq,
            armed: true,
        };

        info!(key = %key, "Chargement des chemins");
        let result = self.fetch(&bbox).await;
        guard.disarm();

        // Sérialisation et allocation hors verrou
        let prepared = result.and_then(|features| self.prepare(features));

        let mut state = self.lock();
        if !state.is_latest(seq) {
            debug!(key = %key, "Réponse périmée ignorée");
            state.report.stale_discarded += 1;
            drop(state);
            if let Ok(Some(prepared)) = prepared {
                self.allocator.release(&prepared.handle);
            }
            return SettleOutcome::Stale(key);
        }

        match prepared {
            Ok(None) => {
                debug!(key = %key, "Aucun chemin dans la zone");
                state.report.empty_results += 1;
                self.release_overlay(&mut state);
                SettleOutcome::Empty(key)
            }
            Ok(Some(prepared)) => {
                let count = self.install(&mut state, key.clone(), prepared);
                info!(key = %key, features = count, "Overlay installé");
                SettleOutcome::Installed { key, features: count }
            }
            Err(failure) => {
                warn!(key = %key, error = %failure, "Échec du chargement des chemins");
                state.report.record_failure(&key.to_string(), &failure.to_string());
                self.reset(&mut state);
                SettleOutcome::Failed(key)
            }
        }
    }

    /// Retire l'overlay et oublie la dernière requête. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.lock();
        self.reset(&mut state);
    }

    async fn fetch(&self, bbox: &BoundingBox) -> Result<Vec<LineFeature>, SyncError> {
        let timeout = self.settings.fetch_timeout;
        let mut features = tokio::time::timeout(timeout, self.source.fetch(bbox))
            .await
            .map_err(|_| SyncError::Timeout(timeout))??;

        features.retain(|f| f.vertex_count() >= 2);
        Ok(features)
    }

    /// GeoJSON et ressource de l'overlay, `None` si aucun chemin
    fn prepare(&self, features: Vec<LineFeature>) -> Result<Option<Prepared>, SyncError> {
        if features.is_empty() {
            return Ok(None);
        }
        let data = overlay::geojson::to_bytes(&features)?;
        let handle = self.allocator.create(data)?;
        Ok(Some(Prepared { handle, features }))
    }

    /// Remplace l'overlay courant. L'ancien est retiré et libéré avant l'ajout
    /// du nouveau: jamais deux overlays attachés.
    fn install(&self, state: &mut State, key: FetchKey, prepared: Prepared) -> usize {
        let layer = OverlayLayer {
            id: LayerId(state.next_layer_id),
            key,
            title: self.settings.layer_title.clone(),
            handle: prepared.handle,
            features: prepared.features.into(),
        };
        state.next_layer_id += 1;

        self.release_overlay(state);
        self.map.add_layer(&layer);

        let count = layer.feature_count();
        state.overlay = Some(layer);
        state.report.installs += 1;
        count
    }

    fn release_overlay(&self, state: &mut State) {
        if let Some(layer) = state.overlay.take() {
            self.map.remove_layer(layer.id);
            self.allocator.release(&layer.handle);
            state.report.releases += 1;
            debug!(layer = layer.id.0, key = %layer.key, "Overlay retiré");
        }
    }

    /// Retire l'overlay et oublie la dernière clé: une réponse en vol
    /// devient périmée et la même clé pourra être rechargée.
    fn reset(&self, state: &mut State) {
        self.release_overlay(state);
        state.issued = None;
    }
}

impl<S, M, A> Drop for ViewportOverlaySynchronizer<S, M, A>
where
    S: FeatureSource,
    M: MapView,
    A: ResourceAllocator,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{InMemoryMapView, MemoryAllocator};
    use geo::LineString;
    use overpass::TrailTags;
    use std::sync::Arc;

    /// Source qui renvoie toujours les mêmes chemins
    struct FixedSource(Vec<LineFeature>);

    impl FeatureSource for FixedSource {
        async fn fetch(&self, _bbox: &BoundingBox) -> Result<Vec<LineFeature>, SourceError> {
            Ok(self.0.clone())
        }
    }

    fn line(id: i64, coords: Vec<(f64, f64)>) -> LineFeature {
        LineFeature {
            id,
            geometry: LineString::from(coords),
            tags: TrailTags::default(),
        }
    }

    fn viewport(b: [f64; 4], zoom: f64) -> Viewport {
        Viewport::from_bounds(b, zoom).unwrap()
    }

    #[tokio::test]
    async fn test_install_and_dispose() {
        let map = Arc::new(InMemoryMapView::new());
        let alloc = Arc::new(MemoryAllocator::new());
        let sync = ViewportOverlaySynchronizer::new(
            SyncSettings::default(),
            FixedSource(vec![line(1, vec![(-119.99, 30.01), (-119.98, 30.02)])]),
            map.clone(),
            alloc.clone(),
        );

        let outcome = sync
            .on_viewport_settled(viewport([-120.0, 30.0, -119.9, 30.1], 14.0))
            .await;
        assert!(matches!(outcome, SettleOutcome::Installed { features: 1, .. }));
        assert_eq!(map.attached_count(), 1);
        assert_eq!(alloc.live_count(), 1);

        let overlay = sync.overlay().unwrap();
        let data = alloc.get(&overlay.handle).unwrap();
        assert!(String::from_utf8(data).unwrap().contains("FeatureCollection"));

        sync.dispose();
        sync.dispose();
        assert_eq!(map.attached_count(), 0);
        assert_eq!(alloc.live_count(), 0);
        assert!(sync.current_key().is_none());
        assert_eq!(sync.report().releases, 1);
    }

    #[tokio::test]
    async fn test_short_lines_dropped() {
        let map = Arc::new(InMemoryMapView::new());
        let sync = ViewportOverlaySynchronizer::new(
            SyncSettings::default(),
            FixedSource(vec![line(1, vec![(-119.99, 30.01)])]),
            map.clone(),
            MemoryAllocator::new(),
        );

        let outcome = sync
            .on_viewport_settled(viewport([-120.0, 30.0, -119.9, 30.1], 14.0))
            .await;
        assert!(matches!(outcome, SettleOutcome::Empty(_)));
        assert_eq!(map.attached_count(), 0);
    }

    #[tokio::test]
    async fn test_region_clipping_in_key() {
        let sync = ViewportOverlaySynchronizer::new(
            SyncSettings::default(),
            FixedSource(vec![line(1, vec![(-67.0, 40.0), (-66.5, 40.5)])]),
            InMemoryMapView::new(),
            MemoryAllocator::new(),
        );

        // Viewport à cheval sur la frontière est de la région: bbox rognée
        let outcome = sync
            .on_viewport_settled(viewport([-67.0, 40.0, -65.0, 41.0], 13.0))
            .await;
        match outcome {
            SettleOutcome::Installed { key, .. } => {
                assert_eq!(key.to_string(), "-67.000,40.000,-66.000,41.000|z13")
            }
            other => panic!("unexpected: {:?}", other),
        }

        let outside = sync
            .on_viewport_settled(viewport([2.0, 45.0, 2.1, 45.1], 15.0))
            .await;
        assert_eq!(outside, SettleOutcome::OutsideRegion);
        assert!(sync.overlay().is_none());
    }

    #[tokio::test]
    async fn test_no_region_restriction() {
        let settings = SyncSettings {
            allowed_region: None,
            ..Default::default()
        };
        let sync = ViewportOverlaySynchronizer::new(
            settings,
            FixedSource(vec![line(1, vec![(2.0, 45.0), (2.05, 45.05)])]),
            InMemoryMapView::new(),
            MemoryAllocator::new(),
        );

        let outcome = sync
            .on_viewport_settled(viewport([2.0, 45.0, 2.1, 45.1], 15.0))
            .await;
        assert!(matches!(outcome, SettleOutcome::Installed { .. }));
    }

    #[tokio::test]
    async fn test_drop_releases_resources() {
        let map = Arc::new(InMemoryMapView::new());
        let alloc = Arc::new(MemoryAllocator::new());
        {
            let sync = ViewportOverlaySynchronizer::new(
                SyncSettings::default(),
                FixedSource(vec![line(1, vec![(-119.99, 30.01), (-119.98, 30.02)])]),
                map.clone(),
                alloc.clone(),
            );
            sync.on_viewport_settled(viewport([-120.0, 30.0, -119.9, 30.1], 14.0))
                .await;
            assert_eq!(alloc.live_count(), 1);
        }
        assert_eq!(map.attached_count(), 0);
        assert_eq!(alloc.live_count(), 0);
    }
}

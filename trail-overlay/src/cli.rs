//! Définition et implémentation des commandes CLI
//!
//! - `fetch`: bbox → Overpass → GeoJSON
//! - `replay`: session de navigation (JSON lines) → synchroniseur

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Subcommand;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use trail_overlay::overlay::geojson::export_to_geojson;
use trail_overlay::{
    FeatureSource, InMemoryMapView, OverpassSource, SettleDebouncer, SettleOutcome, SyncConfig,
    TempFileAllocator, Viewport, ViewportOverlaySynchronizer,
};

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch trails for a single bounding box and write them as GeoJSON
    Fetch {
        /// Bounding box as west,south,east,north (degrees), e.g. -120,30,-119.9,30.1
        #[arg(long, allow_hyphen_values = true)]
        bbox: String,

        /// Map zoom level; below the configured minimum nothing is fetched
        #[arg(long)]
        zoom: Option<f64>,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Config preset name (usa/world) or path to a JSON config
        #[arg(long, default_value = "usa")]
        config: String,
    },

    /// Replay a recorded viewport session through the synchronizer
    Replay {
        /// JSON lines file: {"bbox":[w,s,e,n],"zoom":z,"delay_ms":n}
        #[arg(short, long)]
        events: PathBuf,

        /// Directory for overlay resource files
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Config preset name (usa/world) or path to a JSON config
        #[arg(long, default_value = "usa")]
        config: String,

        /// Copy the last overlay to <output-dir>/overlay.geojson before disposal
        #[arg(long)]
        keep: bool,

        /// Save the sync report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

/// Une ligne du fichier de session
#[derive(Debug, Deserialize)]
struct ReplayEvent {
    bbox: [f64; 4],
    zoom: f64,
    /// Attente avant émission
    #[serde(default)]
    delay_ms: u64,
    /// `bbox` en Web Mercator (EPSG:3857)
    #[serde(default)]
    mercator: bool,
}

/// Exécute la commande fetch
pub async fn cmd_fetch(bbox: &str, zoom: Option<f64>, output: &Path, config_spec: &str) -> Result<()> {
    let config = load_config(config_spec)?;
    let settings = config.settings()?;

    let bounds = parse_bbox(bbox)?;
    let viewport = Viewport::from_bounds(bounds, zoom.unwrap_or(settings.min_display_zoom))
        .context("Invalid --bbox")?;

    if viewport.zoom < settings.min_display_zoom {
        println!(
            "Zoom {} below minimum display zoom {}: nothing fetched",
            viewport.zoom, settings.min_display_zoom
        );
        return Ok(());
    }

    let query_bbox = match &settings.allowed_region {
        Some(region) => viewport
            .bbox
            .intersection(region)
            .context("Bounding box is outside the allowed region")?,
        None => viewport.bbox,
    };

    let source = OverpassSource::new(&config.source, config.fetch_timeout())
        .context("Failed to create Overpass client")?;

    println!("=== Fetch ===");
    println!("Endpoint: {}", source.endpoint());
    println!("Config: {}", config_spec);
    println!("Bbox: {:?}", query_bbox.as_array());

    let start = Instant::now();
    let mut features = source
        .fetch(&query_bbox)
        .await
        .context("Overpass query failed")?;
    features.retain(|f| f.vertex_count() >= 2);
    let fetch_duration = start.elapsed();

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    export_to_geojson(&features, output)?;

    let vertices: usize = features.iter().map(|f| f.vertex_count()).sum();
    println!("\n=== Summary ===");
    println!("Trails: {}", features.len());
    println!("Vertices: {}", vertices);
    println!("Fetch duration: {:.2?}", fetch_duration);
    println!("Output: {}", output.display());

    Ok(())
}

/// Exécute la commande replay
pub async fn cmd_replay(
    events_path: &Path,
    output_dir: &Path,
    config_spec: &str,
    keep: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_spec)?;
    let settings = config.settings()?;

    let content = std::fs::read_to_string(events_path)
        .with_context(|| format!("Cannot read {}", events_path.display()))?;
    let events = parse_events(&content)?;

    println!("=== Replay ===");
    println!("Events: {}", events.len());
    println!("Config: {}", config_spec);
    println!("Debounce: {:?}", config.debounce());
    println!("Output dir: {}", output_dir.display());

    let source = OverpassSource::new(&config.source, config.fetch_timeout())
        .context("Failed to create Overpass client")?;
    let allocator = TempFileAllocator::new(output_dir)
        .with_context(|| format!("Cannot use {}", output_dir.display()))?;
    let sync = ViewportOverlaySynchronizer::new(settings, source, InMemoryMapView::new(), allocator);

    let (tx, rx) = mpsc::channel(64);
    let mut debouncer = SettleDebouncer::new(rx, config.debounce());

    let feeder = tokio::spawn(async move {
        for (delay, viewport) in events {
            tokio::time::sleep(delay).await;
            if tx.send(viewport).await.is_err() {
                break;
            }
        }
    });

    // Les chargements en vol avancent pendant qu'on attend le prochain viewport
    let start = Instant::now();
    let mut in_flight = FuturesUnordered::new();
    let mut input_open = true;
    loop {
        tokio::select! {
            settled = debouncer.next_settled(), if input_open => match settled {
                Some(viewport) => {
                    debug!(zoom = viewport.zoom, bbox = ?viewport.bbox.as_array(), "Viewport stabilisé");
                    in_flight.push(sync.on_viewport_settled(viewport));
                }
                None => input_open = false,
            },
            Some(outcome) = in_flight.next(), if !in_flight.is_empty() => log_outcome(&outcome),
            else => break,
        }
    }
    feeder.await.context("Event feeder panicked")?;

    let max_attached = sync.map().max_attached();
    if max_attached > 1 {
        warn!(max_attached, "Plusieurs overlays attachés simultanément");
    }

    if keep {
        match sync.overlay() {
            Some(layer) => {
                let target = output_dir.join("overlay.geojson");
                std::fs::copy(TempFileAllocator::path_of(&layer.handle), &target)
                    .with_context(|| format!("Cannot copy overlay to {}", target.display()))?;
                println!("Last overlay ({}): {}", layer.key, target.display());
            }
            None => println!("No overlay attached at end of session"),
        }
    }
    sync.dispose();

    let report = sync.report();
    report.display();
    println!("Duration: {:.2?}", start.elapsed());
    println!("Max overlays attached: {}", max_attached);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .with_context(|| format!("Cannot write report {}", path.display()))?;
    }

    info!(summary = %report.summary(), "Rejeu terminé");
    Ok(())
}

fn log_outcome(outcome: &SettleOutcome) {
    match outcome {
        SettleOutcome::Installed { key, features } => {
            println!("  installed {} ({} trails)", key, features)
        }
        SettleOutcome::Empty(key) => println!("  empty     {}", key),
        SettleOutcome::Failed(key) => println!("  failed    {}", key),
        SettleOutcome::Stale(key) => println!("  stale     {}", key),
        SettleOutcome::Duplicate(key) => debug!(key = %key, "Doublon"),
        SettleOutcome::BelowMinZoom | SettleOutcome::OutsideRegion => {
            debug!(outcome = ?outcome, "Overlay retiré")
        }
    }
}

fn load_config(name: &str) -> Result<SyncConfig> {
    let mut config = SyncConfig::resolve(name)?;
    config.apply_env()?;
    Ok(config)
}

/// Parse `ouest,sud,est,nord`
fn parse_bbox(raw: &str) -> Result<[f64; 4]> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        anyhow::bail!("Expected 4 comma-separated values (west,south,east,north), got: {}", raw);
    }

    let mut bounds = [0.0; 4];
    for (slot, part) in bounds.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .with_context(|| format!("Invalid coordinate '{}' in bbox", part))?;
    }
    Ok(bounds)
}

/// Parse une session JSON lines en (délai, viewport)
fn parse_events(content: &str) -> Result<Vec<(Duration, Viewport)>> {
    let mut events = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: ReplayEvent = serde_json::from_str(line)
            .with_context(|| format!("Invalid event at line {}", i + 1))?;
        let [w, s, e, n] = event.bbox;
        let viewport = if event.mercator {
            Viewport::from_web_mercator(w, s, e, n, event.zoom)
        } else {
            Viewport::from_bounds(event.bbox, event.zoom)
        }
        .with_context(|| format!("Invalid viewport at line {}", i + 1))?;

        events.push((Duration::from_millis(event.delay_ms), viewport));
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        assert_eq!(
            parse_bbox("-120,30,-119.9,30.1").unwrap(),
            [-120.0, 30.0, -119.9, 30.1]
        );
        assert_eq!(
            parse_bbox(" -120 , 30 , -119.9 , 30.1 ").unwrap(),
            [-120.0, 30.0, -119.9, 30.1]
        );
    }

    #[test]
    fn test_parse_bbox_invalid() {
        assert!(parse_bbox("-120,30,-119.9").is_err());
        assert!(parse_bbox("-120,30,-119.9,30.1,5").is_err());
        assert!(parse_bbox("-120,30,west,30.1").is_err());
        assert!(parse_bbox("").is_err());
    }

    #[test]
    fn test_parse_events() {
        let content = r#"
{"bbox":[-120.0,30.0,-119.9,30.1],"zoom":14,"delay_ms":100}

{"bbox":[-120.0,30.0,-119.9,30.1],"zoom":10}
{"bbox":[-13358338.9,3503549.8,-13347206.9,3516424.2],"zoom":14.5,"mercator":true}
"#;
        let events = parse_events(content).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].0, Duration::from_millis(100));
        assert_eq!(events[0].1.zoom, 14.0);
        assert_eq!(events[1].0, Duration::ZERO);

        let mercator = events[2].1;
        assert!((mercator.bbox.min_lon - -120.0).abs() < 1e-3);
        assert!((mercator.bbox.max_lon - -119.9).abs() < 1e-3);
        assert!(mercator.bbox.min_lat > 29.9 && mercator.bbox.max_lat < 30.2);
    }

    #[test]
    fn test_parse_events_reports_line() {
        let content = "{\"bbox\":[-120.0,30.0,-119.9,30.1],\"zoom\":14}\n{\"bbox\":[1,2,3],\"zoom\":14}\n";
        let err = parse_events(content).unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let inverted = "{\"bbox\":[-119.9,30.0,-120.0,30.1],\"zoom\":14}\n";
        assert!(parse_events(inverted).is_err());

        let negative_zoom = "{\"bbox\":[-120.0,30.0,-119.9,30.1],\"zoom\":-1}\n";
        assert!(parse_events(negative_zoom).is_err());
    }
}

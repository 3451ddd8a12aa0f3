//! Point d'entrée CLI pour trail-overlay

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// `.env` du répertoire courant, sinon celui du binaire (OVERPASS_URL, ...)
fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")));
    if let Some(path) = beside_exe {
        let _ = dotenvy::from_path(path);
    }
}

mod cli;

use cli::Commands;

/// Overlay de chemins OSM synchronisé avec le viewport d'une carte
#[derive(Parser)]
#[command(name = "trail-overlay")]
#[command(author, version)]
#[command(about = "Charger les chemins OSM (path/track) d'un viewport depuis Overpass")]
#[command(long_about = "Charge les chemins OSM d'une zone depuis Overpass.\n\n'fetch' charge une bbox unique, 'replay' rejoue une session de navigation à travers le synchroniseur.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Fetch {
            bbox,
            zoom,
            output,
            config,
        } => {
            info!(bbox = %bbox, zoom = ?zoom, output = %output.display(), "Chargement d'une zone");
            cli::cmd_fetch(&bbox, zoom, &output, &config).await?;
        }
        Commands::Replay {
            events,
            output_dir,
            config,
            keep,
            report,
        } => {
            info!(events = %events.display(), output_dir = %output_dir.display(), "Rejeu d'une session");
            cli::cmd_replay(&events, &output_dir, &config, keep, report.as_deref()).await?;
        }
    }

    Ok(())
}

/// `-q` l'emporte sur `-v`
fn log_level(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    // RUST_LOG affine par module (ex: trail_overlay::sync=trace)
    let filter = EnvFilter::from_default_env().add_directive(log_level(verbose, quiet).into());

    fmt()
        .with_env_filter(filter)
        .with_target(verbose > 0)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0, false), Level::INFO);
        assert_eq!(log_level(1, false), Level::DEBUG);
        assert_eq!(log_level(3, false), Level::TRACE);
        assert_eq!(log_level(2, true), Level::WARN);
    }

    #[test]
    fn test_parse_fetch_with_negative_bbox() {
        let cli = Cli::try_parse_from([
            "trail-overlay",
            "fetch",
            "--bbox",
            "-120,30,-119.9,30.1",
            "--zoom",
            "14",
            "-o",
            "out.geojson",
        ])
        .unwrap();
        match cli.command {
            Commands::Fetch { bbox, zoom, config, .. } => {
                assert_eq!(bbox, "-120,30,-119.9,30.1");
                assert_eq!(zoom, Some(14.0));
                assert_eq!(config, "usa");
            }
            _ => panic!("expected fetch"),
        }
    }
}

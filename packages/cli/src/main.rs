#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the safe-route toolchain.
//!
//! Loads a geofence `GeoJSON` file and runs one operation against it:
//! the destination pre-check, route segmentation, replay of a recorded
//! position track, or construction of avoid polygons for a routing
//! request. Results are printed to stdout as JSON; diagnostics go through
//! `log` (set `RUST_LOG=info` to see them).

mod config;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use safe_route_geofence::{EventSink, Fanout, GeofenceCollection, LogSink, TrackingSession};
use safe_route_geofence_models::{Position, PositionSample, TransitionEvent};
use safe_route_route::{
    DestinationGate, GateDecision, RouteGeometry, build_avoid_polygons, effective_avoid_levels,
    segment_route, summarize_route,
};
use serde::Deserialize;

use crate::config::SafeRouteConfig;

#[derive(Parser)]
#[command(name = "safe_route", about = "Geofence and route risk tool")]
struct Cli {
    /// TOML config file (defaults to `$SAFE_ROUTE_CONFIG`, then built-in
    /// defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a destination lies inside a forbidden zone
    Check {
        /// Geofence `GeoJSON` `FeatureCollection`
        #[arg(long)]
        zones: PathBuf,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Record that the user accepted a forbidden destination
        #[arg(long)]
        consent: bool,
    },
    /// Tag each edge of a route with the most severe zone it touches
    Segment {
        /// Geofence `GeoJSON` `FeatureCollection`
        #[arg(long)]
        zones: PathBuf,
        /// Route `GeoJSON` (a `LineString`, or a routing response)
        #[arg(long)]
        route: PathBuf,
    },
    /// Replay a CSV of positions and print every enter/exit transition
    Track {
        /// Geofence `GeoJSON` `FeatureCollection`
        #[arg(long)]
        zones: PathBuf,
        /// CSV with `latitude,longitude[,accuracy][,timestamp]` columns
        #[arg(long)]
        positions: PathBuf,
    },
    /// Build avoid polygons for a routing request
    Avoid {
        /// Geofence `GeoJSON` `FeatureCollection`
        #[arg(long)]
        zones: PathBuf,
        /// Trip start as `lat,lng`
        #[arg(long, value_parser = parse_lat_lng, allow_hyphen_values = true)]
        start: Option<Position>,
        /// Trip end as `lat,lng`
        #[arg(long, value_parser = parse_lat_lng, allow_hyphen_values = true)]
        end: Option<Position>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = SafeRouteConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Check {
            zones,
            lat,
            lng,
            consent,
        } => check(&config, &zones, Position::new(lat, lng)?, consent)?,
        Commands::Segment { zones, route } => segment(&config, &zones, &route)?,
        Commands::Track { zones, positions } => track(&config, &zones, &positions)?,
        Commands::Avoid { zones, start, end } => avoid(&config, &zones, start, end)?,
    }

    Ok(())
}

fn load_zones(
    config: &SafeRouteConfig,
    path: &Path,
) -> Result<GeofenceCollection, Box<dyn std::error::Error>> {
    log::info!("Loading geofences from {}", path.display());
    let raw = std::fs::read_to_string(path)?;
    Ok(GeofenceCollection::from_geojson_str(&raw, &config.schema)?)
}

/// Runs the destination pre-check and prints the gate, plus the override
/// entry when `consent` is given for a forbidden destination.
fn check(
    config: &SafeRouteConfig,
    zones: &Path,
    destination: Position,
    consent: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let geofences = load_zones(config, zones)?;
    let gate = DestinationGate::evaluate(&destination, Some(&geofences));
    println!("{}", serde_json::to_string_pretty(&gate)?);

    if gate.requires_consent() {
        match gate.resolve(&destination, consent) {
            GateDecision::Proceed(Some(entry)) => {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            }
            GateDecision::Proceed(None) => {}
            GateDecision::Abort => {
                log::info!("Pass --consent to proceed to this destination anyway");
            }
        }
    }

    Ok(())
}

fn segment(
    config: &SafeRouteConfig,
    zones: &Path,
    route: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let geofences = load_zones(config, zones)?;
    let route = RouteGeometry::from_geojson_str(&std::fs::read_to_string(route)?)?;
    log::info!("Segmenting route with {} vertices", route.len());

    let segments = segment_route(&route, Some(&geofences));
    let summary = summarize_route(&segments);

    let output = serde_json::json!({
        "segments": segments,
        "summary": summary,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// One row of a recorded position track.
#[derive(Debug, Deserialize)]
struct PositionRow {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    accuracy: Option<f64>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Replays a position track through a tracking session. Each transition is
/// logged and its log entry printed as one JSON line.
fn track(
    config: &SafeRouteConfig,
    zones: &Path,
    positions: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let geofences = load_zones(config, zones)?;

    let print_entry = |event: &TransitionEvent| match serde_json::to_string(&event.log_entry()) {
        Ok(line) => println!("{line}"),
        Err(e) => log::error!("Failed to serialize log entry: {e}"),
    };
    let mut session = TrackingSession::new(Fanout(LogSink, print_entry));

    let mut reader = csv::Reader::from_path(positions)?;
    let stats = replay(&mut reader, &geofences, &mut session);

    log::info!(
        "Replayed {} samples ({} skipped), {} transitions, ending inside {} zone(s)",
        stats.samples,
        stats.skipped,
        stats.events,
        session.containment().len()
    );
    session.stop();

    Ok(())
}

/// Counts from one track replay.
#[derive(Debug, Default, PartialEq, Eq)]
struct ReplayStats {
    samples: usize,
    skipped: usize,
    events: usize,
}

/// Feeds every usable row to `session`. Rows that fail to parse or carry
/// out-of-range coordinates are skipped with a warning.
fn replay<R: std::io::Read, S: EventSink>(
    reader: &mut csv::Reader<R>,
    geofences: &GeofenceCollection,
    session: &mut TrackingSession<S>,
) -> ReplayStats {
    let mut stats = ReplayStats::default();

    for (line, row) in reader.deserialize::<PositionRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                log::warn!("Skipping row {}: {e}", line + 1);
                stats.skipped += 1;
                continue;
            }
        };
        let position = match Position::new(row.latitude, row.longitude) {
            Ok(position) => position,
            Err(e) => {
                log::warn!("Skipping row {}: {e}", line + 1);
                stats.skipped += 1;
                continue;
            }
        };
        let position = match row.accuracy {
            Some(accuracy) => position.with_accuracy(accuracy),
            None => position,
        };
        let sample = row.timestamp.map_or_else(
            || PositionSample::now(position),
            |at| PositionSample::at(position, at),
        );

        stats.events += session.observe(&sample, Some(geofences));
        stats.samples += 1;
    }

    stats
}

fn avoid(
    config: &SafeRouteConfig,
    zones: &Path,
    start: Option<Position>,
    end: Option<Position>,
) -> Result<(), Box<dyn std::error::Error>> {
    let geofences = load_zones(config, zones)?;
    let requested = &config.routing.avoid_risk_levels;

    let levels = match (start, end) {
        (Some(start), Some(end)) => effective_avoid_levels(&start, &end, &geofences, requested),
        _ => requested.clone(),
    };

    let avoid_polygons =
        build_avoid_polygons(&geofences, &levels, config.routing.avoid_polygon_limit);

    let output = serde_json::json!({
        "avoidRiskLevels": levels,
        "avoidPolygons": avoid_polygons,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn parse_lat_lng(raw: &str) -> Result<Position, String> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected `lat,lng`, got `{raw}`"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
    Position::new(lat, lng).map_err(|e| e.to_string())
}

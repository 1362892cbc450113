#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI for exercising the event map outside a UI host.
//!
//! ```text
//! event_map cluster --events events.json [--config map.toml]
//! event_map clamp --center 32.08,34.78 --radius 2000 --point 32.1,34.8
//! event_map simulate --events events.json --highlight <id> [--attach-after-ms 700]
//! ```
//!
//! Set `RUST_LOG=debug` to watch the controller's decisions.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use event_map_cluster::GridClusterer;
use event_map_geo::{clamp_to_radius, distance_meters};
use event_map_viewport::config::MapConfig;
use event_map_viewport::highlight::HighlightStatus;
use event_map_viewport::map::{MapHandle, MapListener, RegionUpdate, ViewCommand};
use event_map_viewport::store::ViewportStateStore;
use event_map_viewport::view::EventMapView;
use event_map_viewport_models::{EventMarkerGroup, EventSummary, GeoPoint, Viewport};

/// How often the simulated host checks for due work.
const SIMULATION_TICK: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "event_map", about = "Cluster events and simulate the event map viewport")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group events into map markers and print them as JSON
    Cluster {
        /// JSON file with an array of events
        #[arg(long)]
        events: PathBuf,
        /// TOML map config (defaults are used when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Project a point back onto a geofence circle
    Clamp {
        /// Geofence center as `lat,lng`
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        center: GeoPoint,
        /// Geofence radius in meters
        #[arg(long)]
        radius: f64,
        /// Point to clamp as `lat,lng`
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        point: GeoPoint,
    },
    /// Highlight an event against a simulated map and report the outcome
    Simulate {
        /// JSON file with an array of events
        #[arg(long)]
        events: PathBuf,
        /// ID of the event to highlight
        #[arg(long)]
        highlight: String,
        /// Delay before the simulated map attaches its markers
        #[arg(long, default_value = "700")]
        attach_after_ms: u64,
        /// TOML map config (defaults are used when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn parse_point(value: &str) -> Result<GeoPoint, String> {
    let (lat, lng) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `lat,lng`, got {value:?}"))?;
    let latitude: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("bad latitude {lat:?}: {e}"))?;
    let longitude: f64 = lng
        .trim()
        .parse()
        .map_err(|e| format!("bad longitude {lng:?}: {e}"))?;
    GeoPoint::checked(latitude, longitude).map_err(|e| e.to_string())
}

fn load_config(path: Option<&Path>) -> Result<MapConfig, Box<dyn std::error::Error>> {
    Ok(path.map_or_else(|| Ok(MapConfig::default()), MapConfig::from_path)?)
}

fn load_events(path: &Path) -> Result<Vec<EventSummary>, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let events: Vec<EventSummary> = serde_json::from_str(&contents)?;
    log::info!("Loaded {} events from {}", events.len(), path.display());
    Ok(events)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Cluster { events, config } => {
            let config = load_config(config.as_deref())?;
            let events = load_events(&events)?;
            let clustering = GridClusterer::from_options(config.cluster_options()).cluster(&events);
            println!("{}", serde_json::to_string_pretty(&clustering)?);
        }
        Commands::Clamp {
            center,
            radius,
            point,
        } => {
            let clamped = clamp_to_radius(center, point, radius);
            println!("{clamped}");
            println!("{:.3} m from center", distance_meters(center, clamped));
        }
        Commands::Simulate {
            events,
            highlight,
            attach_after_ms,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let events = load_events(&events)?;
            let status = simulate(
                config,
                events,
                &highlight,
                Duration::from_millis(attach_after_ms),
            )
            .await?;
            println!("{highlight}: {status}");
        }
    }

    Ok(())
}

/// A stand-in for a UI map whose markers attach some time after mounting.
#[derive(Default)]
struct SimulatedMap {
    pending: Vec<ViewCommand>,
    attached: BTreeSet<String>,
}

impl MapHandle for SimulatedMap {
    fn apply_view(&mut self, command: &ViewCommand) {
        log::info!(
            "Map moving to {} at zoom {} ({})",
            command.viewport.center,
            command.viewport.zoom,
            command.reason
        );
        self.pending.push(command.clone());
    }

    fn open_marker_popup(&mut self, group_key: &str) -> bool {
        let opened = self.attached.contains(group_key);
        log::info!(
            "Opening popup for {group_key}: {}",
            if opened { "ok" } else { "marker not attached" }
        );
        opened
    }
}

struct LoggingListener;

impl MapListener for LoggingListener {
    fn on_region_change(&self, viewport: &Viewport) {
        log::info!("Region changed to {} zoom {}", viewport.center, viewport.zoom);
    }

    fn on_marker_press(&self, group: &EventMarkerGroup) {
        log::info!("Marker {} pressed", group.key);
    }

    fn on_event_press(&self, event: &EventSummary) {
        log::info!("Event {} pressed", event.id);
    }
}

/// Reports every queued move back to the view as settled where it asked.
fn settle_moves(view: &mut EventMapView<SimulatedMap>) {
    let moves = view
        .map_mut()
        .map(|map| std::mem::take(&mut map.pending))
        .unwrap_or_default();
    for command in moves {
        view.on_region_settled(RegionUpdate::from_command(command.id, command.viewport));
    }
}

async fn simulate(
    config: MapConfig,
    events: Vec<EventSummary>,
    event_id: &str,
    attach_after: Duration,
) -> Result<HighlightStatus, Box<dyn std::error::Error>> {
    let coordinate = events
        .iter()
        .find(|event| event.id == event_id)
        .and_then(EventSummary::placed_coordinate)
        .ok_or_else(|| format!("event {event_id:?} not found or has no coordinate"))?;

    let mut view = EventMapView::new(config, ViewportStateStore::shared(), Arc::new(LoggingListener));
    view.set_events(events);

    let started = tokio::time::Instant::now().into_std();
    view.set_highlight(Some((event_id, coordinate)), started);
    if let Some(source) = view.attach_map(SimulatedMap::default()) {
        log::info!("Initial center from {source}");
    }
    settle_moves(&mut view);

    let mut interval = tokio::time::interval(SIMULATION_TICK);
    let mut markers_attached = false;
    loop {
        let now = interval.tick().await.into_std();

        if !markers_attached && now.saturating_duration_since(started) >= attach_after {
            markers_attached = true;
            let keys: Vec<String> = view
                .clustering()
                .groups
                .iter()
                .map(|group| group.key.clone())
                .collect();
            log::info!("Attaching {} markers", keys.len());
            for key in &keys {
                if let Some(map) = view.map_mut() {
                    map.attached.insert(key.clone());
                }
                view.on_marker_attached(key);
            }
        }

        let status = view.tick(now);
        settle_moves(&mut view);
        if matches!(status, HighlightStatus::Opened | HighlightStatus::Abandoned) {
            return Ok(status);
        }
    }
}

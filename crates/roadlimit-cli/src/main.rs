//! RoadLimit command line front end
//!
//! `track` runs the live polling loop; the remaining subcommands are the
//! operator conveniences the dashboard prototype offered as buttons:
//! a one-shot online-vs-offline lookup, a manual TTL send, and a port list.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use roadlimit_core::client::{http_client, GeoSpeedLimitClient, OverpassClient};
use roadlimit_core::config::AppConfig;
use roadlimit_core::demo::DriveSimulator;
use roadlimit_core::logbook::{EventLog, LogCategory};
use roadlimit_core::offline::OfflineLookup;
use roadlimit_core::serial::{self, format_bytes, TtlLink};
use roadlimit_core::tracker::{FixSource, Tracker};

#[derive(Parser, Debug)]
#[command(author, version, about = "Live road speed limit resolver with TTL display output", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tracking loop
    Track(TrackArgs),
    /// Resolve the speed limit once for a coordinate, online and offline
    Lookup(LookupArgs),
    /// Send a single value to the TTL display
    Send(SendArgs),
    /// List available serial ports
    Ports,
}

#[derive(Parser, Debug)]
struct TrackArgs {
    /// Run on a simulated drive instead of gpsd
    #[arg(long)]
    demo: bool,

    /// gpsd address override
    #[arg(long)]
    gpsd: Option<String>,

    /// Serial port override
    #[arg(long)]
    port: Option<String>,

    /// Run without the TTL display
    #[arg(long)]
    no_serial: bool,

    /// OSM extract file override
    #[arg(long)]
    extract: Option<PathBuf>,

    /// Event log lines to print on shutdown
    #[arg(long, default_value_t = 20)]
    log_tail: usize,
}

#[derive(Parser, Debug)]
struct LookupArgs {
    lat: f64,
    lon: f64,

    /// OSM extract file to compare against
    #[arg(long)]
    extract: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct SendArgs {
    /// Value to put on the wire (0-255)
    value: u32,

    /// Serial port override
    #[arg(long)]
    port: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Track(args) => track(config, args).await,
        Command::Lookup(args) => lookup(config, args).await,
        Command::Send(args) => send(config, args).await,
        Command::Ports => ports(),
    }
}

async fn track(config: AppConfig, args: TrackArgs) -> Result<()> {
    let client = GeoSpeedLimitClient::new(&config).context("building lookup client")?;
    if !client.has_here() {
        warn!("no HERE credentials configured, resolving via Overpass only");
    }

    let source = if args.demo {
        println!("Running a simulated drive (no GPS hardware)");
        FixSource::demo(DriveSimulator::new())
    } else {
        let addr = args.gpsd.as_deref().unwrap_or(&config.gpsd_addr);
        FixSource::connect_gpsd(addr)
            .await
            .with_context(|| format!("connecting to gpsd at {addr}"))?
    };

    let log = EventLog::shared();
    let mut tracker = Tracker::new(source, client).with_log(log.clone());

    let extract = args.extract.or(config.offline_extract.clone());
    if let Some(path) = extract {
        match OfflineLookup::load(&path) {
            Ok(offline) => tracker = tracker.with_offline(offline),
            Err(err) => warn!(error = %err, "offline extract disabled"),
        }
    }

    if !args.no_serial {
        match open_link(&config, args.port.as_deref()) {
            Ok(mut link) => {
                let reader_log = log.clone();
                link.start_reader(move |data| {
                    if let Ok(mut log) = reader_log.lock() {
                        log.add(LogCategory::Serial, format!("read {}", format_bytes(data)));
                    }
                })
                .ok();
                // Probe byte so a wiring fault shows up before the first real send
                if let Err(err) = link.send_speed(54).await {
                    warn!(error = %err, "TTL probe send failed");
                }
                tracker = tracker.with_link(link);
            }
            // The loop still runs and resolves; only the output leg is missing
            Err(err) => warn!(error = %err, "TTL display unavailable"),
        }
    }

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    println!("Tracking (session {}) - Ctrl-C to stop", tracker.session());
    let stats = tracker.run(cancel).await;

    println!("\nSession summary:");
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if args.log_tail > 0 {
        if let Ok(log) = log.lock() {
            println!("\nRecent events:");
            for entry in log.recent(args.log_tail) {
                println!("  {entry}");
            }
        }
    }

    Ok(())
}

/// One-shot comparison of the online Overpass answer and the local extract
async fn lookup(config: AppConfig, args: LookupArgs) -> Result<()> {
    println!("Speed limit at {:.5}, {:.5}:", args.lat, args.lon);

    let overpass = OverpassClient::new(http_client()?, config.overpass.endpoint.clone());
    match overpass.speed_limit_near(args.lat, args.lon).await {
        Ok(Some(speed)) => println!("  online (Overpass):  {speed} km/h"),
        Ok(None) => println!("  online (Overpass):  no data"),
        Err(err) => println!("  online (Overpass):  error: {err}"),
    }

    let extract = args.extract.or(config.offline_extract);
    match extract {
        Some(path) => {
            let offline = OfflineLookup::load(&path)
                .with_context(|| format!("loading extract {}", path.display()))?;
            match offline.find_speed_limit(args.lat, args.lon) {
                Some(hit) => println!(
                    "  offline (extract):  {} km/h on {} ({:.0}m away, {:.0}% confidence)",
                    hit.speed_kmh,
                    hit.road_name.as_deref().unwrap_or("unnamed road"),
                    hit.distance_m,
                    hit.confidence * 100.0
                ),
                None => println!("  offline (extract):  no road within range"),
            }
        }
        None => println!("  offline (extract):  not configured"),
    }

    Ok(())
}

async fn send(config: AppConfig, args: SendArgs) -> Result<()> {
    let link = open_link(&config, args.port.as_deref())?;
    link.send_speed(args.value)
        .await
        .with_context(|| format!("sending {} to {}", args.value, link.port_name()))?;
    println!("Sent {} (0x{:02X}) to {}", args.value, args.value, link.port_name());
    Ok(())
}

fn ports() -> Result<()> {
    let ports = serial::list_ports();
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for port in ports {
        let usb = match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => format!(" [{vid:04x}:{pid:04x}]"),
            _ => String::new(),
        };
        let product = port.product.as_deref().unwrap_or("");
        println!("{}{usb} {product}", port.name);
    }
    Ok(())
}

/// Open the TTL link on the configured, overridden, or first detected port
fn open_link(config: &AppConfig, override_port: Option<&str>) -> Result<TtlLink> {
    let name = match override_port.or(config.serial.port.as_deref()) {
        Some(name) => name.to_string(),
        None => serial::first_port().context("no serial port detected")?.name,
    };
    TtlLink::open(&name, config.serial.baud_rate)
        .with_context(|| format!("opening TTL display on {name}"))
}

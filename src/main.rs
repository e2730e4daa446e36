use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use lightning_node::NodeConfig;
use lightning_node::SensorNode;
use lightning_node::clock::{RealTimeClock, SoftRtc};
use lightning_node::config::AfeMode;
use lightning_node::detector::EventClassifier;
use lightning_node::hal::{CancelToken, GpsReceiver, NullPin, StdDelay};
use lightning_node::nmea::NmeaReceiver;
use lightning_node::output::{OutputFormat, WriterSink, create_formatter, session_filename};
use lightning_node::position::{Coordinates, FixAcquirer};
use lightning_node::simulation::{SimulatedGps, SimulatedStorm, StormConfig};

#[derive(Parser, Debug)]
#[command(name = "lightning_node")]
#[command(about = "Lightning sensor node: fix once, then log every strike and disturber", long_about = None)]
struct Args {
    /// TOML configuration file ([node], [positioning], [detector], [output], [storm])
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Record format: csv, json
    #[arg(short = 'f', long, value_enum)]
    format: Option<OutputFormat>,

    /// Emit a header line before the first record
    #[arg(long)]
    header: bool,

    /// Write records to `<dir>/<name>_<epoch>_(<lat>,<long>).<ext>` instead of stdout
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Stop after this many records
    #[arg(short = 'n', long)]
    max_records: Option<u64>,

    /// NMEA serial device; without it a simulated receiver is used
    #[arg(long)]
    gps_port: Option<PathBuf>,

    /// Run with sentinel coordinates and an unset clock
    #[arg(long)]
    no_gps: bool,

    /// Run without the detector, emitting sentinel records
    #[arg(long)]
    no_detector: bool,

    /// Detector front-end mode: indoor, outdoor
    #[arg(long, value_enum)]
    mode: Option<AfeMode>,

    /// Random seed for the simulated storm (random if not specified)
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated receiver position as "lat,long"
    #[arg(long, default_value = "28.6024,-81.2001")]
    sim_position: String,

    /// Polls the simulated receiver spends without a fix
    #[arg(long, default_value = "3")]
    sim_fix_polls: u32,

    /// Probability that a simulated interrupt pin read finds the line raised
    #[arg(long)]
    interrupt_probability: Option<f64>,
}

/// Bench-only section of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BenchConfig {
    storm: StormConfig,
}

fn load_config(path: Option<&Path>) -> Result<(NodeConfig, BenchConfig)> {
    let Some(path) = path else {
        return Ok((NodeConfig::default(), BenchConfig::default()));
    };
    let content = fs::read_to_string(path).context("Failed to read config file")?;
    let node = NodeConfig::from_toml_str(&content).context("Invalid node configuration")?;
    let bench = toml::from_str(&content).context("Failed to parse [storm] section")?;
    Ok((node, bench))
}

fn parse_position(s: &str) -> Result<Coordinates> {
    let (lat, long) = s
        .split_once(',')
        .context("Position must be given as \"lat,long\"")?;
    Ok(Coordinates::new(
        lat.trim().parse().context("Invalid latitude")?,
        long.trim().parse().context("Invalid longitude")?,
    ))
}

fn open_receiver(args: &Args) -> Result<Box<dyn GpsReceiver>> {
    match &args.gps_port {
        Some(port) => {
            let device = File::options()
                .read(true)
                .write(true)
                .open(port)
                .with_context(|| format!("Failed to open {}", port.display()))?;
            let writer = device.try_clone().context("Failed to clone serial handle")?;
            log::info!("Using NMEA receiver on {}", port.display());
            Ok(Box::new(NmeaReceiver::new(
                BufReader::new(device),
                writer,
                NullPin,
            )))
        }
        None => {
            let position = parse_position(&args.sim_position)?;
            log::info!("Using simulated receiver at {:?}", position);
            Ok(Box::new(SimulatedGps::new(position, args.sim_fix_polls)))
        }
    }
}

fn ctrlc_handler(cancel: CancelToken) -> Result<()> {
    ctrlc::set_handler(move || {
        cancel.cancel();
    })
    .context("Error setting Ctrl+C handler")
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let (mut config, bench) = load_config(args.config.as_deref())?;
    if args.no_gps {
        config.positioning.enabled = false;
    }
    if args.no_detector {
        config.detector.enabled = false;
    }
    if let Some(mode) = args.mode {
        config.detector.calibration.mode = mode;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    config.output.header |= args.header;
    config.validate()?;

    let mut storm_config = bench.storm;
    if let Some(seed) = args.seed {
        storm_config = storm_config.with_seed(seed);
    }
    if let Some(p) = args.interrupt_probability {
        storm_config.interrupt_probability = p;
    }

    let cancel = CancelToken::new();
    ctrlc_handler(cancel.clone())?;

    let mut rtc = SoftRtc::new();
    let mut acquirer = FixAcquirer::new(open_receiver(&args)?, StdDelay, &config.positioning)
        .with_cancel(cancel.clone());
    let coordinates = acquirer
        .acquire_fix(&mut rtc)
        .context("Fix acquisition failed")?;

    let storm = SimulatedStorm::new(storm_config)?;
    let classifier = EventClassifier::new(
        storm.sensor(),
        storm.pin(),
        NullPin,
        StdDelay,
        &config.detector,
    )?;

    let writer: Box<dyn Write> = match &args.output_dir {
        Some(dir) => {
            fs::create_dir_all(dir).context("Failed to create output directory")?;
            let ext = match config.output.format {
                OutputFormat::Csv => "csv",
                OutputFormat::Json => "json",
            };
            let name = session_filename(
                &config.node.name,
                rtc.snapshot().epoch_seconds(),
                &coordinates,
            );
            let path = dir.join(format!("{}.{}", name, ext));
            log::info!("Writing records to {}", path.display());
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(file)
        }
        None => Box::new(io::stdout()),
    };
    let sink = WriterSink::new(
        writer,
        create_formatter(config.output.format, config.output.header),
    );

    let mut node = SensorNode::with_fix(
        coordinates,
        rtc,
        classifier,
        sink,
        StdDelay,
        Duration::from_millis(config.detector.disabled_interval_ms),
    );

    let sent = node.run(&cancel, args.max_records)?;
    eprintln!(
        "{} records ({} disturbers, {} noise interrupts)",
        sent,
        node.events().disturber_count(),
        node.events().noise_count()
    );

    Ok(())
}

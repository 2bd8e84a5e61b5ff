use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use cubesync::{DeltaMode, InterpolationMode, SyncConfig};

#[derive(Parser)]
#[command(name = "cubesync-harness")]
#[command(about = "Runs a sender and a receiver over a simulated link")]
pub struct Args {
    #[arg(short, long, help = "TOML file with the base configuration")]
    pub config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = ModeArg::RelativeOrientation)]
    pub mode: ModeArg,

    #[arg(long, value_enum)]
    pub interpolation: Option<InterpolationArg>,

    #[arg(short, long, default_value_t = 20.0, help = "Simulated seconds to run")]
    pub duration: f64,

    #[arg(short, long, default_value_t = 60)]
    pub tick_rate: u32,

    #[arg(long, default_value_t = 1.0, help = "Seconds between statistics reports")]
    pub report_interval: f64,

    #[arg(short = 'n', long)]
    pub objects: Option<usize>,

    #[arg(long)]
    pub send_rate: Option<f32>,

    #[arg(long, help = "Playout delay in ms")]
    pub playout_delay: Option<f64>,

    #[arg(long)]
    pub max_packet_bytes: Option<usize>,

    #[arg(long, help = "One-way latency in ms")]
    pub latency: Option<f64>,

    #[arg(long, help = "Jitter in ms")]
    pub jitter: Option<f64>,

    #[arg(long, help = "Packet loss percentage (0-100)")]
    pub loss_percent: Option<f64>,

    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Uncompressed,
    QuantizedAbsolute,
    NotChanged,
    ChangedIndex,
    RelativeIndex,
    RelativePosition,
    RelativeOrientation,
}

impl From<ModeArg> for DeltaMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Uncompressed => DeltaMode::Uncompressed,
            ModeArg::QuantizedAbsolute => DeltaMode::QuantizedAbsolute,
            ModeArg::NotChanged => DeltaMode::NotChanged,
            ModeArg::ChangedIndex => DeltaMode::ChangedIndex,
            ModeArg::RelativeIndex => DeltaMode::RelativeIndex,
            ModeArg::RelativePosition => DeltaMode::RelativePosition,
            ModeArg::RelativeOrientation => DeltaMode::RelativeOrientation,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum InterpolationArg {
    Linear,
    Hermite,
    HermiteWithExtrapolation,
}

impl From<InterpolationArg> for InterpolationMode {
    fn from(mode: InterpolationArg) -> Self {
        match mode {
            InterpolationArg::Linear => InterpolationMode::Linear,
            InterpolationArg::Hermite => InterpolationMode::Hermite,
            InterpolationArg::HermiteWithExtrapolation => InterpolationMode::HermiteWithExtrapolation,
        }
    }
}

/// Reads the optional config file, then lets command-line flags override it.
pub fn load(args: &Args) -> Result<SyncConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            SyncConfig::from_toml_str(&source)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => SyncConfig::default(),
    };

    if let Some(objects) = args.objects {
        config.protocol.num_objects = objects;
    }
    if let Some(send_rate) = args.send_rate {
        config.protocol.send_rate = send_rate;
    }
    if let Some(delay) = args.playout_delay {
        config.protocol.playout_delay = delay / 1000.0;
    }
    if let Some(interpolation) = args.interpolation {
        config.protocol.interpolation = interpolation.into();
    }
    if let Some(bytes) = args.max_packet_bytes {
        config.packer.max_packet_bytes = bytes;
    }
    if let Some(latency) = args.latency {
        config.link.latency = latency / 1000.0;
    }
    if let Some(jitter) = args.jitter {
        config.link.jitter = jitter / 1000.0;
    }
    if let Some(loss) = args.loss_percent {
        config.link.loss_percent = loss;
    }
    if let Some(seed) = args.seed {
        config.link.seed = seed;
    }

    config.validate()?;
    Ok(config)
}

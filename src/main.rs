use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pathtrack_rs::config::EngineConfig;
use pathtrack_rs::export::DirectoryExporter;
use pathtrack_rs::pump::{FramePump, ImageSequenceSource, PumpEvent, PumpOptions};
use pathtrack_rs::session::{SessionRegistry, SessionRequest};
use pathtrack_rs::tracker::{Region, TemplateConfig, TemplateTracker, TrackingCapability};

/// Track targets through a directory of frames and export their paths.
#[derive(Parser, Debug)]
#[command(name = "pathtrack", version)]
struct Args {
    /// Directory of PNG/JPEG frames, processed in file name order
    #[arg(long)]
    frames: PathBuf,

    /// Initial target region as x,y,width,height; repeat once per target
    #[arg(long = "region", required = true)]
    regions: Vec<Region>,

    /// Playback rate; defaults to the configured nominal rate
    #[arg(long)]
    fps: Option<f64>,

    /// Keep at most this many path points per target
    #[arg(long)]
    max_path: Option<usize>,

    /// Mark the session for grayscale rendering
    #[arg(long)]
    monochrome: bool,

    /// Export directory
    #[arg(long, default_value = "experiments")]
    out: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if args.max_path.is_some() {
        config.max_path_len = args.max_path;
    }
    config.validate()?;

    let mut source = ImageSequenceSource::open(&args.frames)?;
    if source.remaining() == 0 {
        bail!("no frames found in {}", args.frames.display());
    }
    if let Some(fps) = args.fps {
        source = source.with_rate(fps);
    }

    let registry = SessionRegistry::new(
        config.clone(),
        Arc::new(|_target: u32| -> Box<dyn TrackingCapability> {
            Box::new(TemplateTracker::new(TemplateConfig::default()))
        }),
    )?
    .with_exporter(Arc::new(DirectoryExporter::new(args.out.clone())));

    let id = registry.create(&SessionRequest::new(args.regions, args.monochrome))?;
    let session = registry.lookup(&id)?;
    info!(session_id = %id, frames = source.remaining(), "replaying frame sequence");

    let pump = FramePump::spawn(session, Box::new(source), PumpOptions::from_config(&config))?;
    loop {
        match pump.next_event(Duration::from_millis(500)) {
            Some(PumpEvent::EndOfStream) => break,
            Some(PumpEvent::InitializationFailed { reason }) => {
                pump.shutdown();
                bail!("could not lock onto every target: {reason}");
            }
            Some(PumpEvent::SourceLost { reason }) => {
                warn!(%reason, "frame source lost, finalizing what was tracked");
                break;
            }
            Some(PumpEvent::SessionStopped) => break,
            None if !pump.is_running() => break,
            None => {
                if let Some(latest) = pump.latest() {
                    info!(frame = latest.snapshot.frame_index, "{}", latest.snapshot.metrics);
                }
            }
        }
    }
    pump.shutdown();

    let report = registry.stop(&id)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

//! clipwatch daemon.
//!
//! Two subcommands mirror the two long-running processes of the system:
//! `watch` runs the capture-detect-record loop against a device or the
//! local duplication socket, and `duplicate` owns the physical device and
//! republishes its frames so multiple consumers can share it.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipwatch_capture::{
    CalibratedSource, FfmpegReader, FfmpegReaderConfig, FrameReader,
};
use clipwatch_detect::{BackgroundDiff, MotionDetector};
use clipwatch_encoder::{create_clip_encoder, JsonMetadataStore};
use clipwatch_engine::{CaptureOrchestrator, EncoderFactory, ShutdownCoordinator};
use clipwatch_relay::{FramePublisher, RelaySubscriber};
use clipwatch_types::{CancelToken, DetectionStrategy, RegionOfInterest, WatchConfig};

#[derive(Parser)]
#[command(name = "clipwatch", about = "Motion-triggered clip recorder")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch a video source and record clips around detected activity.
    Watch(WatchArgs),

    /// Own the capture device and republish frames over the local socket.
    Duplicate(DuplicateArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// Capture device path or source URI.
    #[arg(long, env = "CLIPWATCH_SOURCE", default_value = "/dev/video0")]
    source: String,

    /// Requested capture width in pixels (best-effort).
    #[arg(long, env = "CLIPWATCH_WIDTH", default_value_t = 640)]
    width: u32,

    /// Requested capture height in pixels (best-effort).
    #[arg(long, env = "CLIPWATCH_HEIGHT", default_value_t = 400)]
    height: u32,

    /// Pixel format requested from a V4L2 device.
    #[arg(long, env = "CLIPWATCH_INPUT_FORMAT", default_value = "yuyv422")]
    input_format: String,

    /// Frame-rate override; skips calibration timing when set.
    #[arg(long, env = "CLIPWATCH_FORCED_FRAME_RATE")]
    forced_frame_rate: Option<f64>,
}

#[derive(Args)]
struct WatchArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Consume frames from the duplication socket instead of the device.
    #[arg(long)]
    from_relay: bool,

    /// Duplication socket path.
    #[arg(
        long,
        env = "CLIPWATCH_RELAY_SOCKET",
        default_value = "/tmp/clipwatch-relay.sock"
    )]
    relay_socket: PathBuf,

    /// Activity checks per second.
    #[arg(long, env = "CLIPWATCH_CHECKS_PER_SECOND", default_value_t = 2.0)]
    checks_per_second: f64,

    /// Fraction of region pixels that must change to count as activity.
    #[arg(long, env = "CLIPWATCH_MOTION_THRESHOLD", default_value_t = 0.07)]
    motion_threshold: f64,

    /// Seconds of video kept before the triggering frame.
    #[arg(long, env = "CLIPWATCH_PRE_ROLL", default_value_t = 2.0)]
    pre_roll: f64,

    /// Seconds recording continues after the last activity.
    #[arg(long, env = "CLIPWATCH_POST_ROLL", default_value_t = 2.0)]
    post_roll: f64,

    /// Monitored region: top-left X, percent.
    #[arg(long, env = "CLIPWATCH_ROI_LEFT", default_value_t = 0.0)]
    roi_left: f64,

    /// Monitored region: top-left Y, percent.
    #[arg(long, env = "CLIPWATCH_ROI_TOP", default_value_t = 0.0)]
    roi_top: f64,

    /// Monitored region: bottom-right X, percent.
    #[arg(long, env = "CLIPWATCH_ROI_RIGHT", default_value_t = 100.0)]
    roi_right: f64,

    /// Monitored region: bottom-right Y, percent.
    #[arg(long, env = "CLIPWATCH_ROI_BOTTOM", default_value_t = 100.0)]
    roi_bottom: f64,

    /// Directory receiving finished clips.
    #[arg(long, env = "CLIPWATCH_VIDEOS_DIR", default_value = "videos")]
    videos_dir: PathBuf,

    /// Directory receiving clip thumbnails.
    #[arg(long, env = "CLIPWATCH_THUMBNAILS_DIR", default_value = "thumbnails")]
    thumbnails_dir: PathBuf,

    /// Directory receiving clip metadata records.
    #[arg(long, env = "CLIPWATCH_RECORDS_DIR", default_value = "records")]
    records_dir: PathBuf,
}

#[derive(Args)]
struct DuplicateArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Duplication socket path.
    #[arg(
        long,
        env = "CLIPWATCH_RELAY_SOCKET",
        default_value = "/tmp/clipwatch-relay.sock"
    )]
    relay_socket: PathBuf,
}

/// Initialize logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "clipwatch_daemon=info,clipwatch_engine=info,clipwatch_capture=info,clipwatch_detect=info,clipwatch_encoder=info,clipwatch_relay=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn install_interrupt_handler(cancel: CancelToken) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        info!("Interrupt received, shutting down");
        cancel.cancel();
    })
    .context("failed to install interrupt handler")
}

fn open_device_reader(args: &SourceArgs) -> anyhow::Result<FfmpegReader> {
    let reader = FfmpegReader::open(&FfmpegReaderConfig {
        source: args.source.clone(),
        width: args.width,
        height: args.height,
        input_format: Some(args.input_format.clone()),
        input_frame_rate: args.forced_frame_rate,
    })?;
    Ok(reader)
}

fn run_watch(args: WatchArgs) -> anyhow::Result<()> {
    let config = WatchConfig {
        source: args.source.source.clone(),
        width: args.source.width,
        height: args.source.height,
        region: RegionOfInterest {
            top_left_x: args.roi_left,
            top_left_y: args.roi_top,
            bottom_right_x: args.roi_right,
            bottom_right_y: args.roi_bottom,
        },
        checks_per_second: args.checks_per_second,
        motion_threshold: args.motion_threshold,
        pre_roll_seconds: args.pre_roll,
        post_roll_seconds: args.post_roll,
        forced_frame_rate: args.source.forced_frame_rate,
        videos_dir: args.videos_dir.clone(),
        thumbnails_dir: args.thumbnails_dir.clone(),
        ..Default::default()
    };

    let cancel = CancelToken::new();
    install_interrupt_handler(cancel.clone())?;

    let reader: Box<dyn FrameReader> = if args.from_relay {
        info!(socket = %args.relay_socket.display(), "Subscribing to frame publisher");
        Box::new(RelaySubscriber::connect(&args.relay_socket)?)
    } else {
        Box::new(open_device_reader(&args.source)?)
    };

    let source = CalibratedSource::open(reader, config.forced_frame_rate)
        .context("failed to calibrate capture source")?;
    let calibration = source.calibration();

    let store = Arc::new(
        JsonMetadataStore::open(&args.records_dir, &config.thumbnails_dir)
            .context("failed to open metadata store")?,
    );

    let detector = match config.strategy {
        DetectionStrategy::FrameDiff => MotionDetector::frame_diff(
            config.check_interval_frames(calibration.frame_rate),
            config.region,
            BackgroundDiff::new(config.motion_threshold),
        ),
        DetectionStrategy::Classifier => {
            anyhow::bail!(
                "the classifier strategy needs an embedding application to supply a model; \
                 this daemon ships the frame-diff check only"
            )
        }
    };

    let factory: EncoderFactory = Box::new(create_clip_encoder);

    let orchestrator = CaptureOrchestrator::new(
        Box::new(source),
        Box::new(detector),
        store,
        factory,
        config,
        cancel.clone(),
    );

    let mut coordinator = ShutdownCoordinator::new(cancel.clone());
    let loop_cancel = cancel.clone();
    let capture_thread = thread::spawn(move || {
        if let Err(e) = orchestrator.run() {
            error!("Capture loop ended: {e}");
        }
        // Wake the main thread whether the loop ended on its own or not.
        loop_cancel.cancel();
    });
    coordinator.register("capture-loop", capture_thread);

    while !cancel.is_cancelled() {
        thread::sleep(Duration::from_millis(200));
    }
    coordinator.shutdown();

    Ok(())
}

fn run_duplicate(args: DuplicateArgs) -> anyhow::Result<()> {
    let cancel = CancelToken::new();
    install_interrupt_handler(cancel.clone())?;

    let reader = open_device_reader(&args.source)?;
    let publisher = FramePublisher::new(&args.relay_socket, Box::new(reader));
    publisher.run(cancel)?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Command::Watch(args) => run_watch(args),
        Command::Duplicate(args) => run_duplicate(args),
    }
}

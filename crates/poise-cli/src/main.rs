use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use poise_core::replay::Recording;
use poise_core::{FrameOrchestrator, LandmarkModel, OnnxLandmarker, Projector, RunSummary, StopReason};
use poise_hw::Camera;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod display;

use config::Config;
use display::{OutputFormat, QuitSignal, StreamDisplay};

#[derive(Parser)]
#[command(name = "poise", about = "Confidence-analysis metrics from face and pose landmarks")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the live camera feed until Ctrl-C
    ///
    /// The ONNX landmark backend is experimental: models run on the whole
    /// frame without a face/person crop, so the subject should fill most of
    /// the frame.
    Run {
        /// Emit one JSON object per frame instead of text
        #[arg(long)]
        json: bool,
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },
    /// Re-run the metrics over a recorded landmark file (JSON lines)
    Replay {
        /// Recording path
        path: PathBuf,
        /// Emit one JSON object per frame instead of text
        #[arg(long)]
        json: bool,
    },
    /// List V4L2 capture devices
    Devices,
}

fn output_format(json: bool) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the per-frame records.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let quit_flag = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&quit_flag);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("quit requested");
                flag.store(true, Ordering::Relaxed);
            }
        });
    }

    match cli.command {
        Commands::Run { json, max_frames } => {
            let quit = QuitSignal::new(quit_flag, max_frames);
            let summary = tokio::task::spawn_blocking(move || run_live(&config, output_format(json), quit))
                .await
                .context("pipeline thread panicked")??;
            report(&summary);
        }
        Commands::Replay { path, json } => {
            let quit = QuitSignal::new(quit_flag, None);
            let projector = Projector::new(config.rounding);
            let summary = tokio::task::spawn_blocking(move || {
                run_replay(&path, projector, output_format(json), quit)
            })
            .await
            .context("pipeline thread panicked")??;
            report(&summary);
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}\t{}\t{}\t{}", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}

/// Open the camera and both models (fail fast), then run the frame loop.
fn run_live(config: &Config, format: OutputFormat, quit: QuitSignal) -> Result<RunSummary> {
    let mut camera = Camera::open(&config.camera_device, config.capture_width, config.capture_height)?;
    tracing::info!(
        device = %config.camera_device,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        driver = ?camera.driver(),
        "camera opened"
    );
    camera.discard_frames(config.warmup_frames)?;

    let face = OnnxLandmarker::load(&config.face_model_path(), LandmarkModel::FACE_MESH)?;
    let pose = OnnxLandmarker::load(&config.pose_model_path(), LandmarkModel::POSE)?;

    let display = StreamDisplay::new(std::io::stdout(), format, quit);
    let orchestrator =
        FrameOrchestrator::new(camera, face, pose, display, Projector::new(config.rounding))?;
    Ok(orchestrator.run())
}

fn run_replay(
    path: &std::path::Path,
    projector: Projector,
    format: OutputFormat,
    quit: QuitSignal,
) -> Result<RunSummary> {
    let recording = Recording::open(path).with_context(|| format!("loading {}", path.display()))?;
    tracing::info!(path = %path.display(), frames = recording.len(), "replaying recording");

    let display = StreamDisplay::new(std::io::stdout(), format, quit);
    let orchestrator = FrameOrchestrator::new(
        recording.source(),
        recording.face_detector(),
        recording.pose_detector(),
        display,
        projector,
    )?;
    Ok(orchestrator.run())
}

fn report(summary: &RunSummary) {
    match &summary.stop_reason {
        StopReason::CaptureFailed(msg) | StopReason::RenderFailed(msg) => {
            tracing::error!(frames = summary.frames_processed, reason = %msg, "stopped on failure");
        }
        reason => {
            tracing::info!(frames = summary.frames_processed, ?reason, "done");
        }
    }
}

mod cli;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use siasplit::segmentation::{SegmentationRequest, Segmenter};
use siasplit::upload::{McClient, UploadOrchestrator, UploadRequest};
use siasplit_av::{FfmpegTranscoder, FfprobeProber, ToolRegistry};
use siasplit_core::config::Config;
use siasplit_core::events::Event;
use siasplit_core::{EventBus, EventPayload, QualityProfile, QualityTable};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "siasplit=trace,siasplit_av=trace,siasplit_core=debug".to_string()
        } else {
            "siasplit=info,siasplit_av=info,siasplit_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config = Config::load_or_default(cli.config.as_deref());
    for warning in config.validate() {
        tracing::warn!("Config: {warning}");
    }

    match cli.command {
        Commands::Split {
            input,
            qualities,
            width,
            height,
            output_dir,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(split(
                config,
                input,
                qualities,
                width.zip(height),
                output_dir,
            ))
        }
        Commands::Upload {
            endpoint,
            host_url,
            access_key,
            secret_key,
            output_dir,
        } => {
            let mut config = config;
            let storage = &mut config.storage;
            if let Some(endpoint) = endpoint {
                storage.endpoint = endpoint;
            }
            if host_url.is_some() {
                storage.host_url = host_url;
            }
            if let Some(key) = access_key {
                storage.access_key = key;
            }
            if let Some(key) = secret_key {
                storage.secret_key = key;
            }
            if let Some(dir) = output_dir {
                config.segmentation.output_dir = dir;
            }

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(upload(config))
        }
        Commands::CheckTools => check_tools(&config),
        Commands::Qualities => {
            list_qualities();
            Ok(())
        }
    }
}

async fn split(
    config: Config,
    input: PathBuf,
    qualities: Vec<QualityProfile>,
    dimensions: Option<(u32, u32)>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let registry = ToolRegistry::discover(&config.tools);
    let ffmpeg = registry.require("ffmpeg")?.path.clone();
    let ffprobe = registry.require("ffprobe")?.path.clone();

    let seg = &config.segmentation;
    let prober = FfprobeProber::new(ffprobe, Duration::from_secs(seg.probe_timeout_secs));
    let transcoder = FfmpegTranscoder::new(
        ffmpeg,
        seg.video_codec.clone(),
        seg.audio_codec.clone(),
        Duration::from_secs(seg.transcode_timeout_secs),
    );
    let output_dir = output_dir.unwrap_or_else(|| seg.output_dir.clone());

    let bus = Arc::new(EventBus::default());
    let printer = spawn_event_printer(&bus);
    let segmenter = Segmenter::new(
        Arc::new(prober),
        Arc::new(transcoder),
        QualityTable::standard(),
        output_dir,
        bus,
    );

    tracing::info!("Splitting {}", input.display());
    let result = segmenter
        .run(SegmentationRequest {
            input,
            dimensions,
            qualities,
        })
        .await;

    // Closing the bus lets the printer drain and exit.
    drop(segmenter);
    let _ = printer.await;

    let outcome = result.context("segmentation failed")?;
    println!();
    println!("Master playlist: {}", outcome.master_playlist.display());
    for variant in &outcome.variants {
        println!(
            "  {} {} ({} bit/s)",
            variant.resolution, variant.file_name, variant.bandwidth
        );
    }
    Ok(())
}

async fn upload(config: Config) -> Result<()> {
    let registry = ToolRegistry::discover(&config.tools);
    let mc = registry.require("mc")?.path.clone();

    let storage = &config.storage;
    let client = McClient::from_config(mc, storage);

    let bus = Arc::new(EventBus::default());
    let printer = spawn_event_printer(&bus);
    let orchestrator = UploadOrchestrator::new(
        Arc::new(client),
        storage.root_bucket.clone(),
        storage.cleanup_on_failure,
        bus,
    );

    let result = orchestrator
        .run(UploadRequest {
            endpoint: storage.endpoint.clone(),
            host_url: storage.host_url.clone(),
            access_key: storage.access_key.clone(),
            secret_key: storage.secret_key.clone(),
            output_dir: config.segmentation.output_dir.clone(),
        })
        .await;

    drop(orchestrator);
    let _ = printer.await;

    let outcome = result.context("upload failed")?;
    println!();
    println!("{}", outcome.url);
    Ok(())
}

/// Print progress events until the bus is dropped.
fn spawn_event_printer(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {skipped} progress events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_event(event: &Event) {
    let time = event.timestamp.format("%H:%M:%S");
    match &event.payload {
        EventPayload::SegmentationStarted { .. } => println!("[{time}] split: started"),
        EventPayload::SegmentationProgress { message, .. } => println!("[{time}] split: {message}"),
        EventPayload::SegmentationFinished { .. } => println!("[{time}] split: finished"),
        EventPayload::UploadStarted { .. } => println!("[{time}] upload: started"),
        EventPayload::UploadProgress { message, .. } => println!("[{time}] upload: {message}"),
        EventPayload::UploadFinished { .. } => println!("[{time}] upload: finished"),
        EventPayload::UploadPathReady { url, .. } => println!("[{time}] upload: ready at {url}"),
    }
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them or set their paths in the config.");
    }

    Ok(())
}

fn list_qualities() {
    println!("{:<8} {:>7} {:>12} {:>12}", "Quality", "Height", "Video kb/s", "Audio kb/s");
    for (quality, spec) in QualityTable::standard().iter() {
        println!(
            "{:<8} {:>7} {:>12} {:>12}",
            quality.label(),
            spec.height,
            spec.video_bitrate_kbps,
            spec.audio_bitrate_kbps
        );
    }
    println!(
        "{:<8} {:>7} {:>12} {:>12}",
        QualityProfile::Source.label(),
        "native",
        "probed",
        "probed"
    );
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use vcam::config::{JsonSettingsStore, SourceKind};
use vcam::logging::init_logging;
use vcam::pipeline::FramePipeline;
use vcam::session::SessionHandle;
use vcam::source::FileAccess;
use vcam::target::MemoryTarget;
use vcam::video::ffmpeg::FfmpegOpener;
use vcam::{CameraApi, SettingsStore, Size, SourceConfig, VirtualCamera};

#[derive(Parser)]
#[command(name = "vcam")]
#[command(about = "Feed substituted camera frames from a still image or a looping video")]
#[command(version)]
struct Cli {
    /// JSON settings file
    settings: PathBuf,

    /// Requested frame width
    #[arg(default_value = "1280")]
    width: u32,

    /// Requested frame height
    #[arg(default_value = "720")]
    height: u32,

    /// Number of frames to produce
    #[arg(default_value = "3")]
    count: usize,

    /// How long to paint the in-memory preview, in milliseconds
    #[arg(long, default_value = "1000")]
    paint_ms: u64,

    /// Write a default settings file and exit
    #[arg(long)]
    init: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let store = Arc::new(JsonSettingsStore::new(&cli.settings));
    if cli.init {
        store.write(&SourceConfig::default())?;
        println!("wrote {}", store.path().display());
        return Ok(());
    }

    let config = store.read();
    init_logging(cli.verbose || config.verbose);
    ffmpeg_source::init()?;
    if config.source_kind == SourceKind::Video {
        if let Some(locator) = config.source_locator.as_deref() {
            match ffmpeg_source::metadata::probe(locator) {
                Ok(info) => log::info!("source video {}:\n{}", locator, info),
                Err(e) => log::warn!("cannot probe {}: {:#}", locator, e),
            }
        }
    }

    let pipeline = FramePipeline::new(store, Arc::new(FileAccess), Arc::new(FfmpegOpener));
    let camera = Arc::new(VirtualCamera::with_runtime(
        pipeline,
        tokio::runtime::Handle::current(),
    ));

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        let mut updates = camera.diagnostics().stream();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = updates.next() => match next {
                        Some(snapshot) => log::info!("diagnostics: {:?}", snapshot),
                        None => break,
                    },
                }
            }
        }
    });

    let paint = Duration::from_millis(cli.paint_ms);
    let size = Size::new(cli.width, cli.height);
    let count = cli.count;
    let produced = tokio::task::spawn_blocking({
        let camera = camera.clone();
        move || produce(&camera, size, count)
    })
    .await?;
    log::info!("produced {} of {} frame(s)", produced, count);

    let target = Arc::new(MemoryTarget::new(size));
    let handle = SessionHandle::new(camera.allocate_owner(), 0);
    camera.sessions().update_size(handle, size);
    if camera.start_painting(CameraApi::Legacy, handle, target.clone(), size) {
        tokio::select! {
            _ = tokio::time::sleep(paint) => {},
            _ = tokio::signal::ctrl_c() => log::info!("interrupted"),
        }
    }
    let snapshot = camera.diagnostics().snapshot();

    tokio::task::spawn_blocking({
        let camera = camera.clone();
        move || camera.shutdown()
    })
    .await?;
    println!("painted {} frame(s)", target.posts());
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    cancel.cancel();
    watcher.await?;
    tokio::task::spawn_blocking(move || drop(camera)).await?;
    Ok(())
}

/// Pulls `count` frames in the configured output format.
fn produce(camera: &VirtualCamera, size: Size, count: usize) -> usize {
    let format = camera.config().output_format;
    let mut produced = 0;
    for i in 0..count {
        match camera.produce_frame(CameraApi::Legacy, size.width, size.height, format) {
            Some(frame) => {
                println!("frame {}: {} {} ({} bytes)", i, frame.format, frame.size, frame.len());
                produced += 1;
            }
            None => println!("frame {}: no substitute", i),
        }
    }
    produced
}

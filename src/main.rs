// Frameband - Main Entry Point
//
// Drives a synthetic machine core through the filter pipeline and presents
// the result in a window, or headless into a capture or snapshot backend.

use anyhow::{Context, Result};
use clap::Parser;
use frameband::blend::{self, BlendId};
use frameband::config::{VideoConfig, CONFIG_FILE};
use frameband::display::{
    run_window, Backend, CapturePresenter, FrameSource, Pattern, PatternSource, Presenter,
    SnapshotPresenter,
};
use frameband::filter::{self, FilterId};
use frameband::pipeline::FramePipeline;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::time::Instant;

/// Source width of the synthetic machine core
const SOURCE_WIDTH: usize = 240;
/// Source height of the synthetic machine core
const SOURCE_HEIGHT: usize = 160;

#[derive(Parser)]
#[command(name = "frameband")]
#[command(version, about = "Band-parallel frame filter pipeline")]
struct Cli {
    /// Configuration file (created with defaults if missing)
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Enlargement filter, overrides the configuration
    #[arg(short, long)]
    filter: Option<FilterId>,

    /// Inter-frame blend, overrides the configuration
    #[arg(short, long)]
    blend: Option<BlendId>,

    /// Band worker threads (0 filters on the main thread)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Run without a window for the given number of frames
    #[arg(long, value_name = "FRAMES")]
    headless: Option<u64>,

    /// With --headless, write every frame as PNG into the snapshot directory
    #[arg(long)]
    snapshot: bool,

    /// Show static color bars instead of a moving gradient
    #[arg(long)]
    bars: bool,

    /// List available filters and blends and exit
    #[arg(long)]
    list: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .set_thread_level(LevelFilter::Debug)
        .build();
    TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto)
        .context("failed to initialise logging")
}

fn list_catalogs() {
    println!("Filters:");
    for id in FilterId::ALL {
        println!(
            "  {:<12} {}x  {}",
            id.key(),
            filter::enlarge_factor_of(id),
            filter::name_of(id)
        );
    }
    println!();
    println!("Blends:");
    for id in BlendId::ALL {
        println!("  {:<12} {}", id.key(), blend::name_of(id));
    }
}

fn run_headless(
    pipeline: &mut FramePipeline,
    source: &mut PatternSource,
    mut backend: Backend,
    frames: u64,
) -> Result<()> {
    let start = Instant::now();
    for _ in 0..frames {
        let frame = pipeline
            .deliver_frame(source.next_frame())
            .context("frame delivery failed")?;
        backend.present(frame).context("presentation failed")?;
    }
    let elapsed = start.elapsed();

    info!(
        "{} frames in {:.2}s ({:.1} FPS)",
        pipeline.frames_delivered(),
        elapsed.as_secs_f64(),
        pipeline.frames_delivered() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    if let Backend::Snapshot(snapshot) = &backend {
        info!(
            "Wrote {} snapshots to {}",
            snapshot.written().len(),
            snapshot.directory().display()
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list {
        list_catalogs();
        return Ok(());
    }

    init_logging(cli.verbose)?;
    info!("Frameband v{}", env!("CARGO_PKG_VERSION"));

    let mut config = VideoConfig::load_or_default(&cli.config);
    info!("Configuration loaded from '{}'", cli.config.display());
    if let Some(filter) = cli.filter {
        config.filter = filter;
    }
    if let Some(blend) = cli.blend {
        config.blend = blend;
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }

    let settings = config.pipeline_settings(SOURCE_WIDTH, SOURCE_HEIGHT)?;
    let pattern = if cli.bars {
        Pattern::Bars
    } else {
        Pattern::Gradient
    };
    let mut source = PatternSource::new(SOURCE_WIDTH, SOURCE_HEIGHT, settings.depth, pattern)?;

    let mut pipeline = FramePipeline::with_osd(config.osd_state());
    pipeline
        .configure(settings)
        .context("invalid pipeline configuration")?;
    info!(
        "  Filter: {} / Blend: {} / Workers: {} / Depth: {}",
        config.filter,
        config.blend,
        pipeline.worker_count(),
        settings.depth
    );

    match cli.headless {
        Some(frames) => {
            let backend = if cli.snapshot {
                Backend::Snapshot(SnapshotPresenter::new(&config.snapshot_dir))
            } else {
                Backend::Capture(CapturePresenter::new())
            };
            run_headless(&mut pipeline, &mut source, backend, frames)?;
        }
        None => {
            pipeline.osd_mut().show_message("F: FILTER  B: BLEND");
            info!("Press F to cycle filters, B to cycle blends, Esc to exit.");
            run_window(config.window_config(), pipeline, source)
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            info!("Display window closed.");
        }
    }

    Ok(())
}

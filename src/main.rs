use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use muralkit::{
    export_file_name, init_logging, DeviceApi, DeviceClient, DiagnosticsCache, EventBus,
    JobSession, ManualScheduler, PollEvent, SimulationStatus, TokioFrameScheduler, TuningStore,
    UiTuning,
};
use muralkit_visualizer::{format_distance, format_duration, format_speed};
use tracing::{info, warn};

/// Preview and live-track wall plotter jobs
#[derive(Debug, Parser)]
#[command(name = "muralkit", version, about)]
struct Cli {
    /// Log one JSON object per line
    #[arg(long, global = true)]
    log_json: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a summary of a command file
    Info { file: PathBuf },

    /// Render the planned path and a full preview run to SVG
    Preview {
        file: PathBuf,
        /// Resume point as a percentage of the plan
        #[arg(long, default_value_t = 0.0)]
        start_percent: f64,
        #[arg(long, short, default_value = "preview.svg")]
        out: PathBuf,
        #[arg(long, default_value_t = 1200.0)]
        width: f64,
        #[arg(long, default_value_t = 800.0)]
        height: f64,
        /// Preview speed-up over the device feed rate
        #[arg(long, default_value_t = 15.0)]
        speed: f64,
    },

    /// Load the job from a device and follow its progress
    Watch {
        /// Device base URL, e.g. http://192.168.4.1
        #[arg(long)]
        device: String,
        #[arg(long, default_value_t = 0.0)]
        start_percent: f64,
        /// Write the live view here when the watch ends
        #[arg(long)]
        svg: Option<PathBuf>,
    },

    /// Save the device's command stream to a file
    Download {
        #[arg(long)]
        device: String,
        /// Target directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Show or change UI tuning
    Tuning {
        #[command(subcommand)]
        action: TuningAction,
    },
}

#[derive(Debug, Subcommand)]
enum TuningAction {
    Show,
    /// Set one value, e.g. `STATUS_POLL_MS 500`
    Set { key: String, value: String },
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json)?;
    info!("MuralKit {} (built {})", muralkit::VERSION, muralkit::BUILD_DATE);

    let mut store = match &cli.storage {
        Some(path) => TuningStore::open(path),
        None => TuningStore::open_default(),
    };

    match cli.command {
        Command::Info { file } => info_cmd(&file, store.load()).await,
        Command::Preview {
            file,
            start_percent,
            out,
            width,
            height,
            speed,
        } => preview_cmd(&file, store.load(), start_percent, &out, (width, height), speed).await,
        Command::Watch {
            device,
            start_percent,
            svg,
        } => watch_cmd(&device, store.load(), start_percent, svg.as_deref()).await,
        Command::Download { device, dir } => download_cmd(&device, &dir).await,
        Command::Tuning { action } => tuning_cmd(&mut store, action),
    }
}

fn read_commands(file: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
}

async fn info_cmd(file: &Path, tuning: UiTuning) -> anyhow::Result<()> {
    let text = read_commands(file)?;
    let session = JobSession::new(
        Arc::new(EventBus::new()),
        Arc::new(TokioFrameScheduler::default()),
        tuning,
        1200.0,
        800.0,
    );
    let model = session.load_commands(&text).await?;
    let bounds = model.bounds();

    println!("{}", model.summary());
    println!("Header total: {}", format_distance(model.header_total()));
    println!("Computed:     {}", format_distance(model.computed_distance()));
    println!("Drawn:        {}", format_distance(model.drawn_distance()));
    println!("Height:       {:.1} mm", model.height());
    println!(
        "Bounds:       x {:.1}..{:.1}, y {:.1}..{:.1} mm",
        bounds.min_x, bounds.max_x, bounds.min_y, bounds.max_y
    );
    Ok(())
}

async fn preview_cmd(
    file: &Path,
    tuning: UiTuning,
    start_percent: f64,
    out: &Path,
    (width, height): (f64, f64),
    speed: f64,
) -> anyhow::Result<()> {
    let text = read_commands(file)?;
    let scheduler = Arc::new(ManualScheduler::new());
    let session = JobSession::new(
        Arc::new(EventBus::new()),
        scheduler.clone(),
        tuning,
        width,
        height,
    );
    session.set_speed_multiplier(speed);
    session.load_commands(&text).await?;
    if let Some(resume) = session.select_start_percent(start_percent) {
        info!(
            "Preview from line {} ({})",
            resume.start_line,
            format_distance(resume.start_dist)
        );
    }

    // Frames are fired on a synthetic clock so the render is deterministic
    let frame = Duration::from_secs_f64(1.0 / f64::from(tuning.preview_fps.max(5)));
    let mut now = Instant::now();
    let mut frames = 0u64;
    session.start_simulation();
    while session.preview_status() == Some(SimulationStatus::Running) && scheduler.fire(now) {
        now += frame;
        frames += 1;
    }
    info!(
        "Preview took {} of simulated time over {} frames",
        format_duration(Duration::from_secs_f64(frames as f64 * frame.as_secs_f64())),
        frames
    );

    let svg = session.preview_svg().context("no plan loaded")?;
    std::fs::write(out, svg).with_context(|| format!("writing {}", out.display()))?;
    println!("Wrote {}", out.display());
    Ok(())
}

async fn watch_cmd(
    device: &str,
    tuning: UiTuning,
    start_percent: f64,
    svg: Option<&Path>,
) -> anyhow::Result<()> {
    let client: Arc<dyn DeviceApi> = Arc::new(DeviceClient::new(device)?);
    let session = JobSession::new(
        Arc::new(EventBus::new()),
        Arc::new(TokioFrameScheduler::default()),
        tuning,
        1200.0,
        800.0,
    );

    let diagnostics = DiagnosticsCache::new(Arc::clone(&client));
    session.set_feed_rate(diagnostics.feed_rate().await);

    session.load_from_device(client.as_ref()).await?;
    session.select_start_percent(start_percent);

    let mut events = session.start_polling(Arc::clone(&client));
    let mut job_seen = false;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let now = Instant::now();
                // Attaching to an idle device: the first running sample starts the job
                let running = matches!(&event, PollEvent::Status(status) if status.running);
                if !job_seen && running {
                    job_seen = true;
                    session.job_started(now);
                }
                let Some(update) = session.apply_poll_event(event, now) else { continue };

                let stats = update.stats;
                info!(
                    "{:.1}% | done {} | left {} | {} | elapsed {} | ETA {}",
                    stats.progress,
                    format_distance(stats.done_mm),
                    format_distance(stats.left_mm),
                    format_speed(stats.avg_speed_mm_s.unwrap_or(0.0)),
                    stats.elapsed.map(format_duration).unwrap_or_else(|| "—".into()),
                    stats.eta.map(format_duration).unwrap_or_else(|| "—".into()),
                );

                if update.finished.is_some() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                break;
            }
        }
    }

    session.stop_polling();
    session.job_stopped(Instant::now());

    if let Some(path) = svg {
        if let Some(doc) = session.live_svg() {
            std::fs::write(path, doc).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

async fn download_cmd(device: &str, dir: &Path) -> anyhow::Result<()> {
    let client = DeviceClient::new(device)?;
    let text = client
        .download_commands(Duration::from_millis(
            muralkit_core::constants::COMMANDS_DOWNLOAD_TIMEOUT_MS,
        ))
        .await?;

    let path = dir.join(export_file_name(&chrono::Local::now()));
    std::fs::write(&path, &text).with_context(|| format!("writing {}", path.display()))?;
    println!("Saved {} bytes to {}", text.len(), path.display());
    Ok(())
}

fn tuning_cmd(store: &mut TuningStore, action: TuningAction) -> anyhow::Result<()> {
    let tuning = match action {
        TuningAction::Show => store.load(),
        TuningAction::Set { key, value } => {
            let mut tuning = store.load();
            let applied = tuning.set(&key, &value)?;
            store.save(&tuning)?;
            info!("{} = {}", key.to_ascii_uppercase(), applied);
            tuning
        }
        TuningAction::Reset => store.reset()?,
    };

    for (key, value) in tuning.entries() {
        println!("{:<24} {}", key, value);
    }
    Ok(())
}

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use reel_core::hash::{hash_bytes, hash_frame};
use reel_core::ReelConfig;
use reel_encode::FfmpegBackend;
use reel_export::{ExportJob, ExportPipeline, ExportProgress, SettlePolicy};
use reel_ir::{validate_scene, Scene, CURVES};
use reel_render::{PlaybackController, SceneRenderer};

#[derive(Parser)]
#[command(
    name = "reel",
    version,
    about = "Reel - animated text and image scenes, exported frame by frame"
)]
struct Cli {
    /// Config file (default: ./reel.config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene to MP4
    Export {
        /// Scene JSON document
        #[arg()]
        scene: PathBuf,

        /// Output file path (default: <scene name>.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        overrides: ExportOverrides,
    },

    /// Render a single frame to PNG
    Frame {
        #[arg()]
        scene: PathBuf,

        /// Time in seconds
        #[arg(short, long, default_value_t = 0.0)]
        time: f64,

        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,

        /// Output width (default: the scene's native width)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (default: the scene's native height)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Check a scene document for errors
    Validate {
        #[arg()]
        scene: PathBuf,
    },

    /// Summarize an MP4 file
    Probe {
        #[arg()]
        file: PathBuf,
    },

    /// List the available entry animations
    Animations {
        /// Print the curve table as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Export flags. Unset flags fall back to the config file.
#[derive(Args, Debug, Default, Clone, PartialEq)]
struct ExportOverrides {
    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Frame rate (default: the scene's target fps)
    #[arg(long)]
    fps: Option<u32>,

    /// Bits per second
    #[arg(long)]
    bitrate: Option<u64>,

    /// Frames between keyframes
    #[arg(long)]
    keyframe_interval: Option<u32>,

    /// Settle wait after each seek, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    /// FFmpeg binary
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// libx264 preset
    #[arg(long)]
    preset: Option<String>,
}

impl ExportOverrides {
    fn apply(&self, config: &mut ReelConfig) {
        let export = &mut config.export;
        if let Some(v) = self.width {
            export.width = v;
        }
        if let Some(v) = self.height {
            export.height = v;
        }
        if let Some(v) = self.fps {
            export.fps = v;
        }
        if let Some(v) = self.bitrate {
            export.bitrate = v;
        }
        if let Some(v) = self.keyframe_interval {
            export.keyframe_interval = v;
        }
        if let Some(v) = self.settle_ms {
            export.settle_ms = v;
        }
        if let Some(v) = &self.ffmpeg {
            config.encoder.ffmpeg_path = v.clone();
        }
        if let Some(v) = &self.preset {
            config.encoder.preset = v.clone();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Export {
            scene,
            output,
            overrides,
        } => run_async(cmd_export(config, scene, output, overrides)),
        Commands::Frame {
            scene,
            time,
            output,
            width,
            height,
        } => cmd_frame(&config, &scene, time, &output, width, height),
        Commands::Validate { scene } => cmd_validate(&scene),
        Commands::Probe { file } => cmd_probe(&file),
        Commands::Animations { json } => cmd_animations(json),
    }
}

fn run_async<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;
    runtime.block_on(future)
}

fn load_config(path: Option<&Path>) -> Result<ReelConfig> {
    match path {
        Some(path) => ReelConfig::load_from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("failed to read working directory")?;
            ReelConfig::discover(&cwd).context("failed to load reel.config.toml")
        }
    }
}

fn load_scene(path: &Path) -> Result<Scene> {
    Scene::load(path).with_context(|| format!("failed to load scene: {}", path.display()))
}

fn renderer_for(config: &ReelConfig, scene_path: &Path) -> SceneRenderer {
    let renderer = SceneRenderer::new(config);
    match scene_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => renderer.with_asset_root(dir),
        _ => renderer,
    }
}

fn default_output(scene: &Scene) -> PathBuf {
    let stem: String = scene
        .name()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "output".to_string() } else { stem };
    PathBuf::from(format!("{}.mp4", stem))
}

async fn cmd_export(
    mut config: ReelConfig,
    scene_path: PathBuf,
    output: Option<PathBuf>,
    overrides: ExportOverrides,
) -> Result<()> {
    overrides.apply(&mut config);
    let scene = load_scene(&scene_path)?;
    let output = output.unwrap_or_else(|| default_output(&scene));
    let job = export_job(&scene, &config, &overrides);

    println!("Exporting {}", scene_path.display());
    println!(
        "   {}x{} @ {} fps, {} frames, {:.1} Mbit/s",
        job.width,
        job.height,
        job.fps,
        job.total_frames().unwrap_or(0),
        job.bitrate as f64 / 1_000_000.0
    );

    let controller = PlaybackController::new(scene, renderer_for(&config, &scene_path));
    let backend = Arc::new(FfmpegBackend::from_config(&config.encoder));
    let mut pipeline = ExportPipeline::new(controller, backend)
        .with_settle(SettlePolicy::ReadySignal {
            timeout: Duration::from_millis(config.export.settle_ms),
        })
        .on_progress(Box::new(print_progress));

    let token = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling export");
            token.cancel();
        }
    });

    let start = Instant::now();
    let buffer = pipeline.export(job).await.context("export failed")?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(&output, &buffer.bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!();
    println!("   Wrote {}", output.display());
    println!(
        "   {} frames, {} skipped, {:.1} KiB in {:.2}s",
        buffer.frame_count,
        buffer.skipped_frames.len(),
        buffer.bytes.len() as f64 / 1024.0,
        start.elapsed().as_secs_f64()
    );
    println!("   SHA-256: {}", hash_bytes(&buffer.bytes));
    if !buffer.skipped_frames.is_empty() {
        println!("   Skipped frame indices: {:?}", buffer.skipped_frames);
    }
    Ok(())
}

/// Job for `scene` under `config`. Without an `--fps` flag the scene's own
/// target frame rate wins over the config value.
fn export_job(scene: &Scene, config: &ReelConfig, overrides: &ExportOverrides) -> ExportJob {
    let job = ExportJob::from_config(scene.clone(), &config.export);
    match overrides.fps {
        Some(_) => job,
        None => job.with_fps(scene.target_fps()),
    }
}

fn print_progress(p: ExportProgress) {
    let step = (p.total_frames / 10).max(1);
    if p.frames_done % step == 0 || p.frames_done == p.total_frames {
        eprintln!(
            "   {:>3.0}%  frame {}/{}",
            p.progress * 100.0,
            p.frames_done,
            p.total_frames
        );
    }
}

fn cmd_frame(
    config: &ReelConfig,
    scene_path: &Path,
    time: f64,
    output: &Path,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<()> {
    let scene = load_scene(scene_path)?;
    let width = width.unwrap_or(scene.native_width());
    let height = height.unwrap_or(scene.native_height());

    let mut controller = PlaybackController::new(scene, renderer_for(config, scene_path));
    controller.seek(time);
    let rendered = controller.render_current(width, height);
    for diagnostic in &rendered.diagnostics {
        println!("   warning: {}", diagnostic);
    }

    let frame = rendered.frame;
    let hash = hash_frame(&frame);
    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data)
        .context("frame buffer size does not match its dimensions")?;
    img.save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Rendered t={:.3}s at {}x{} -> {} ({})",
        controller.time(),
        width,
        height,
        output.display(),
        hash.short()
    );
    Ok(())
}

fn cmd_validate(scene_path: &Path) -> Result<()> {
    let scene = load_scene(scene_path)?;
    println!("Checking {}", scene_path.display());

    validate_scene(&scene).map_err(|errors| {
        let msgs: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
        anyhow::anyhow!("Validation errors:\n  {}", msgs.join("\n  "))
    })?;

    println!(
        "   OK: '{}', {} layers, {:.2}s, {}x{} @ {} fps ({} frames)",
        scene.name(),
        scene.layers().len(),
        scene.duration_seconds(),
        scene.native_width(),
        scene.native_height(),
        scene.target_fps(),
        scene.frame_count()
    );
    Ok(())
}

fn cmd_probe(file: &Path) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let info = reel_encode::probe(&bytes)
        .with_context(|| format!("failed to parse {}", file.display()))?;

    println!("{}", file.display());
    println!("   Brand:      {}", info.major_brand);
    println!("   Codec:      {}", info.codec);
    println!("   Size:       {}x{}", info.width, info.height);
    println!("   Frames:     {}", info.sample_count);
    println!("   Duration:   {:.3}s", info.duration_us as f64 / 1_000_000.0);
    if let Some(fps) = info.frame_rate() {
        println!("   Frame rate: {:.3} fps", fps);
    }
    if let Some(bitrate) = info.avg_bitrate {
        println!("   Bitrate:    {:.2} Mbit/s", bitrate as f64 / 1_000_000.0);
    }
    println!("   Keyframes:  {:?}", info.keyframes);
    println!("   Fast start: {}", if info.moov_before_mdat { "yes" } else { "no" });
    Ok(())
}

fn cmd_animations(json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(CURVES)?;
        println!("{}", out);
        return Ok(());
    }
    for curve in CURVES.iter() {
        println!("   {:<16} {}", curve.id, curve.label);
    }
    Ok(())
}

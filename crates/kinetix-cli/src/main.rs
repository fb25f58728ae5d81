mod demo;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kinetix_core::{Duration, ExportMode, KinetixConfig, KinetixError, OutputFormat};
use kinetix_engine::{AspectRatio, Engine, ResolutionPreset};
use kinetix_export::{AbortController, ExportOptions, ExportPipeline};
use kinetix_render::{Canvas, TextRenderer};

const DEFAULT_CONFIG_FILE: &str = "kinetix.toml";

#[derive(Parser)]
#[command(
    name = "kinetix",
    version,
    about = "Kinetix: deterministic canvas animation and frame-accurate video export"
)]
struct Cli {
    /// Configuration file (default: ./kinetix.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one frame of the showcase scene to PNG
    Frame {
        /// Timeline position in milliseconds
        #[arg(short, long, default_value_t = 0.0)]
        time: f64,

        /// Output PNG path
        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,

        #[command(flatten)]
        canvas: CanvasArgs,
    },

    /// Export the showcase scene to a video file
    Export {
        /// Output file; the format is taken from the extension unless --format is set
        #[arg()]
        output: PathBuf,

        /// Output format: mp4, webm, gif, apng
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Capture mode: offline or realtime
        #[arg(short, long, value_parser = parse_mode)]
        mode: Option<ExportMode>,

        /// Frames per second
        #[arg(long)]
        fps: Option<f64>,

        /// Timeline length in milliseconds
        #[arg(short, long)]
        duration: Option<f64>,

        /// Output size relative to the canvas (1.0 = original, 0.5 = data saver)
        #[arg(short, long)]
        quality: Option<f64>,

        #[command(flatten)]
        canvas: CanvasArgs,
    },

    /// Write a configuration file with every default filled in
    Init {
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version and encoder info
    Info {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

/// Canvas size overrides shared by the rendering commands.
#[derive(Args, Debug, Default)]
struct CanvasArgs {
    /// Aspect ratio preset (16:9, 9:16, 1:1, 4:3, 3:4, 21:9, 4:5)
    #[arg(long)]
    aspect: Option<String>,

    /// Resolution preset (480p, 720p, 1080p, 4K)
    #[arg(long)]
    resolution: Option<String>,

    /// Background color as hex
    #[arg(long)]
    background: Option<String>,
}

impl CanvasArgs {
    fn apply(&self, config: &mut KinetixConfig) -> Result<()> {
        let canvas = &mut config.canvas;
        if let Some(label) = &self.aspect {
            let aspect = AspectRatio::from_label(label)
                .with_context(|| format!("unknown aspect ratio '{}'", label))?;
            (canvas.width, canvas.height) = aspect.apply(canvas.width, canvas.height);
        }
        if let Some(label) = &self.resolution {
            let preset = ResolutionPreset::from_label(label)
                .with_context(|| format!("unknown resolution '{}'", label))?;
            (canvas.width, canvas.height) = preset.apply(canvas.width, canvas.height);
        }
        if let Some(bg) = &self.background {
            canvas.background = bg.clone();
        }
        Ok(())
    }
}

fn parse_mode(s: &str) -> Result<ExportMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "offline" => Ok(ExportMode::Offline),
        "realtime" | "real-time" => Ok(ExportMode::Realtime),
        other => Err(format!("unknown export mode '{}' (offline, realtime)", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Frame {
            time,
            output,
            canvas,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            canvas.apply(&mut config)?;
            cmd_frame(&config, time, &output)
        }
        Commands::Export {
            output,
            format,
            mode,
            fps,
            duration,
            quality,
            canvas,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            canvas.apply(&mut config)?;
            let ext_format = output
                .extension()
                .and_then(|e| e.to_str())
                .and_then(OutputFormat::from_extension);
            if let Some(f) = format.or(ext_format) {
                config.export.format = f;
            }
            if let Some(m) = mode {
                config.export.mode = m;
            }
            if let Some(f) = fps {
                config.export.fps = f;
            }
            if let Some(d) = duration {
                config.canvas.duration_ms = d;
            }
            if let Some(q) = quality {
                config.export.quality_scale = q;
            }
            cmd_export(&config, &output).await
        }
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Info { json } => cmd_info(json),
    }
}

fn load_config(path: Option<&Path>) -> Result<KinetixConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(KinetixConfig::default());
            }
            default
        }
    };
    let config = KinetixConfig::load_from_file(&path)
        .with_context(|| format!("failed to load config: {}", path.display()))?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(config)
}

fn build_engine(config: &KinetixConfig) -> Result<Engine> {
    let text = Arc::new(TextRenderer::from_config(&config.fonts));
    if !text.has_fonts() {
        tracing::warn!("no fonts found; text renders as placeholder blocks");
    }
    let canvas = Canvas::with_text_renderer(config.canvas.width, config.canvas.height, text);
    let mut engine = Engine::from_config(Some(canvas), config)?;
    engine.edit_scene(demo::populate);
    Ok(engine)
}

fn cmd_frame(config: &KinetixConfig, time: f64, output: &Path) -> Result<()> {
    let start = Instant::now();
    let mut engine = build_engine(config)?;
    engine.seek(time);

    let frame = engine.capture_frame();
    let hash = kinetix_core::hash::hash_frame(&frame);
    let (width, height) = (frame.width, frame.height);
    let image = image::RgbaImage::from_raw(width, height, frame.data)
        .context("captured frame has an unexpected size")?;
    image
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("🎬 Kinetix frame @ {:.0}ms", engine.current_time());
    println!("   ✓ Rendered {}x{} in {:.1}ms", width, height, start.elapsed().as_secs_f64() * 1000.0);
    println!("   Hash:   {}", hash);
    println!("   📦 Output: {}", output.display());
    Ok(())
}

async fn cmd_export(config: &KinetixConfig, output: &Path) -> Result<()> {
    let mut engine = build_engine(config)?;
    let options = ExportOptions::from_config(
        &config.export,
        Duration::from_millis(engine.total_duration()),
    );

    println!("🎬 Kinetix Export v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "   Canvas:  {}x{}, {}",
        engine.canvas().width(),
        engine.canvas().height(),
        options.duration
    );
    println!(
        "   Output:  {:?} {:?} @ {}fps ({} frames)",
        options.format,
        options.mode,
        options.fps,
        options.total_frames()
    );

    let controller = AbortController::new();
    let abort = controller.signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            controller.abort();
        }
    });

    let mut pipeline = ExportPipeline::spawn()?;
    let start = Instant::now();
    let mut last_step = -1;
    let result = pipeline
        .export(
            &mut engine,
            &options,
            |p| {
                let step = (p / 10.0).floor() as i32;
                if step > last_step {
                    last_step = step;
                    println!("   … {:>3.0}%", p);
                }
            },
            &abort,
        )
        .await;

    let output_data = match result {
        Ok(out) => out,
        Err(KinetixError::Cancelled) => {
            pipeline.shutdown();
            anyhow::bail!("export cancelled");
        }
        Err(e) => {
            for line in pipeline.logs() {
                eprintln!("   {}", line);
            }
            pipeline.shutdown();
            return Err(e).context("export failed");
        }
    };
    pipeline.shutdown();

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(output, &output_data.data)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "   ✓ Encoded {} frames ({}x{}, {}) in {:.1}s",
        output_data.frames,
        output_data.width,
        output_data.height,
        output_data.mime_type(),
        start.elapsed().as_secs_f64()
    );
    println!("   📦 Output: {} ({} bytes)", output.display(), output_data.data.len());
    println!("   Hash:   {}", kinetix_core::hash::hash_bytes(&output_data.data));
    Ok(())
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("'{}' already exists (use --force to overwrite)", path.display());
    }
    KinetixConfig::default()
        .save_to_file(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("✓ Wrote default configuration to {}", path.display());
    Ok(())
}

fn cmd_info(json: bool) -> Result<()> {
    let ffmpeg = kinetix_export::ffmpeg::is_available();
    let defaults = KinetixConfig::default();
    if json {
        let info = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "ffmpeg": ffmpeg,
            "formats": ["mp4", "webm", "gif", "apng"],
            "defaults": defaults,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("🎬 Kinetix Animation Engine");
    println!("   Version:   {}", env!("CARGO_PKG_VERSION"));
    println!("   Renderer:  CPU canvas");
    println!(
        "   Canvas:    {}x{}, {}ms",
        defaults.canvas.width, defaults.canvas.height, defaults.canvas.duration_ms
    );
    println!("   Formats:   MP4 (H.264), WebM (VP9), GIF, APNG");
    println!(
        "   FFmpeg:    {}",
        if ffmpeg {
            "available ✓"
        } else {
            "NOT FOUND ✗ (MP4/WebM unavailable)"
        }
    );
    Ok(())
}

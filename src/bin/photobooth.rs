use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use photobooth::{
    AssetRegistry, CaptureSession, Compositor, NullDetector, RenderSettings, Surface,
    assets::media::VideoFeed, face::MODEL_UNAVAILABLE_MSG, select_layout,
};

#[derive(Parser, Debug)]
#[command(name = "photobooth", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full timed capture session headlessly and write the strip PNG.
    Capture(CaptureArgs),
    /// Composite a single decorated preview frame as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct CaptureArgs {
    /// Layout preset id (3x2, 4x1, 2x2, 2x1, 1x1).
    #[arg(long, default_value = "3x2")]
    layout: String,

    /// Countdown seconds per frame.
    #[arg(long, default_value_t = 3)]
    countdown: u32,

    /// Video file standing in for the live camera (looped). Omitting it
    /// produces a strip of letterboxed backing cells.
    #[arg(long)]
    camera: Option<PathBuf>,

    /// Root directory for themes/filters/grains/fonts.
    #[arg(long, default_value = "assets")]
    assets_root: PathBuf,

    /// RenderSettings JSON file; defaults apply when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Output directory for photo_strip.png.
    #[arg(long, default_value = "out")]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Layout preset id (3x2, 4x1, 2x2, 2x1, 1x1).
    #[arg(long, default_value = "3x2")]
    layout: String,

    /// Video file to pull the preview frame from.
    #[arg(long)]
    camera: Option<PathBuf>,

    /// Seconds into the camera source to sample.
    #[arg(long, default_value_t = 0.0)]
    at: f64,

    /// Root directory for themes/filters/grains/fonts.
    #[arg(long, default_value = "assets")]
    assets_root: PathBuf,

    /// RenderSettings JSON file; defaults apply when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Capture(args) => cmd_capture(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn read_settings(path: Option<&Path>) -> anyhow::Result<RenderSettings> {
    let Some(path) = path else {
        return Ok(RenderSettings::default());
    };
    let file = std::fs::File::open(path)
        .with_context(|| format!("open settings '{}'", path.display()))?;
    let settings: RenderSettings =
        serde_json::from_reader(std::io::BufReader::new(file)).context("parse settings JSON")?;
    settings.validate()?;
    Ok(settings)
}

/// Register every asset the settings refer to, by naming convention
/// under the assets root: themes/<id>.png, filters/<id>.png,
/// dialogue/<id>.png, grains/<id>.mp4, fonts/<id>.ttf.
fn build_registry(root: &Path, settings: &RenderSettings) -> AssetRegistry {
    let mut registry = AssetRegistry::new(root);

    if let Some(theme) = &settings.theme {
        registry.register_image(theme.clone(), format!("themes/{theme}.png"));
    }
    if let Some(filter) = &settings.filter {
        registry.register_image(filter.clone(), format!("filters/{filter}.png"));
    }
    if let Some(bubble) = &settings.dialogue.bubble {
        registry.register_image(bubble.clone(), format!("dialogue/{bubble}.png"));
    }
    if let Some(grain) = &settings.grain {
        registry.register_video(grain.clone(), format!("grains/{grain}.mp4"));
    }
    if settings.timestamp.enabled {
        let font = &settings.timestamp.font;
        registry.register_font(font.clone(), format!("fonts/{font}.ttf"));
    }
    if settings.dialogue.enabled {
        let font = &settings.dialogue.font;
        registry.register_font(font.clone(), format!("fonts/{font}.ttf"));
    }

    registry.load_all();

    // Grain clips that failed to decode degrade to the deterministic
    // noise texture so previews still show grain.
    if let Some(grain) = &settings.grain
        && registry.natural_size(grain).is_none()
    {
        eprintln!("grain '{grain}' unavailable, using generated noise texture");
        registry.insert_image(grain.clone(), photobooth::assets::decode::noise_image(1, 320, 240));
    }

    registry
}

fn open_camera(path: Option<&Path>) -> Option<VideoFeed> {
    let path = path?;
    match VideoFeed::open(path) {
        Ok(feed) => Some(feed),
        Err(e) => {
            eprintln!("camera unavailable ({e}); strip will show backing only");
            None
        }
    }
}

fn cmd_capture(args: CaptureArgs) -> anyhow::Result<()> {
    let settings = read_settings(args.settings.as_deref())?;
    let mut registry = build_registry(&args.assets_root, &settings);
    let mut camera = open_camera(args.camera.as_deref());

    if settings.face_overlays_active() {
        // No detection backend is bundled with the CLI.
        eprintln!("{MODEL_UNAVAILABLE_MSG}");
    }
    let mut detector = NullDetector;

    let layout = select_layout(&args.layout);
    let mut session = CaptureSession::new(layout, args.countdown)?;
    let mut compositor = Compositor::new();

    let (ow, oh) = camera
        .as_ref()
        .map(|c| (c.info.width, c.info.height))
        .unwrap_or((640, 480));
    let mut overlay = Surface::new(ow, oh);
    let mut engine = photobooth::OverlayEngine::new();
    let generation = engine.restart();

    session.start(&mut compositor, &registry, &settings)?;

    let mut elapsed = 0.0f64;
    let mut exported: Option<PathBuf> = None;
    loop {
        let now = chrono::Local::now().naive_local();
        let frame = camera.as_mut().and_then(|c| c.frame_at(elapsed).ok());

        engine.tick(
            generation,
            frame.as_ref(),
            &mut detector,
            &mut compositor,
            &mut overlay,
            &mut registry,
            &settings,
            elapsed,
            now,
        )?;

        let mut ctx = photobooth::TickContext {
            compositor: &mut compositor,
            registry: &mut registry,
            settings: &settings,
            overlay: &overlay,
            camera_frame: frame.as_ref(),
            elapsed_sec: elapsed,
            now,
        };
        let event = session.tick(&mut ctx)?;

        if let Some(status) = &event.status {
            eprintln!("{status}");
        }
        if event.strip_complete {
            exported = Some(session.export_strip(&args.out)?);
        }
        if event.start_available {
            break;
        }

        elapsed += 1.0;
    }

    let path = exported.context("session ended without exporting a strip")?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let settings = read_settings(args.settings.as_deref())?;
    let mut registry = build_registry(&args.assets_root, &settings);
    let mut camera = open_camera(args.camera.as_deref());

    let layout = select_layout(&args.layout);
    let mut session = CaptureSession::new(layout, 1)?;
    let mut compositor = Compositor::new();

    session.redraw_idle_canvas(&mut compositor, &registry, &settings)?;

    let now = chrono::Local::now().naive_local();
    let frame = camera.as_mut().and_then(|c| c.frame_at(args.at).ok());
    let overlay = Surface::new(
        frame.as_ref().map(|f| f.width).unwrap_or(640),
        frame.as_ref().map(|f| f.height).unwrap_or(480),
    );

    let mut ctx = photobooth::TickContext {
        compositor: &mut compositor,
        registry: &mut registry,
        settings: &settings,
        overlay: &overlay,
        camera_frame: frame.as_ref(),
        elapsed_sec: args.at,
        now,
    };
    session.capture_frame_now(0, &mut ctx)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let strip = session.strip();
    image::save_buffer_with_format(
        &args.out,
        &strip.data,
        strip.width,
        strip.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

//! modelview - drive the viewer headlessly from the command line.
//!
//! Loads a glTF/GLB model from disk or http(s), resolves its external
//! resources, optionally sets up an environment and animation, then renders a
//! fixed number of synthetic frames through the recording engine and logs
//! what would have been drawn.

use clap::Parser;
use modelview::config::{load_config_from_file, ViewerConfig};
use modelview::engine::{HeadlessEngine, RenderTarget};
use modelview::fetch::{fetch_resources, DownloadCache, ResourceLocation};
use modelview::{FrameStatus, Viewer, ViewerEvent};
use std::path::PathBuf;

const TARGET_WIDTH: u32 = 1280;
const TARGET_HEIGHT: u32 = 720;

#[derive(Parser)]
#[command(name = "modelview")]
#[command(about = "Load a glTF model and render it headlessly")]
#[command(version)]
struct Cli {
    /// Model path or http(s) URL (.gltf or .glb)
    model: String,

    /// Viewer config JSON (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of frames to render
    #[arg(long, default_value_t = 120)]
    frames: u32,

    /// Synthetic display rate
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Animation index to play
    #[arg(long)]
    animation: Option<usize>,

    /// Loop the animation
    #[arg(long = "loop")]
    looping: bool,

    /// Animation speed multiplier (negative plays backwards)
    #[arg(long, allow_negative_numbers = true)]
    speed: Option<f64>,

    /// KTX indirect light
    #[arg(long)]
    ibl: Option<String>,

    /// KTX skybox
    #[arg(long)]
    skybox: Option<String>,

    /// Radiance HDR panorama used for both light and skybox
    #[arg(long)]
    hdri: Option<String>,

    /// Flick the orbit camera by DX,DY pixels per frame before rendering
    #[arg(long, value_parser = parse_pair, allow_hyphen_values = true)]
    orbit: Option<(f64, f64)>,

    /// Directory used to cache downloaded resources
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// MSAA sample count (2 or 4; anything else disables it)
    #[arg(long)]
    msaa: Option<u8>,

    /// Use filmic tone mapping
    #[arg(long)]
    filmic: bool,

    /// Draw the model's triangle edges
    #[arg(long)]
    wireframe: bool,

    /// Draw the model's bounding box
    #[arg(long)]
    bounds: bool,

    /// Log per-frame and gesture detail
    #[arg(long)]
    debug_logging: bool,
}

fn parse_pair(value: &str) -> Result<(f64, f64), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected DX,DY, got {value:?}"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .map_err(|err| format!("invalid number {part:?}: {err}"))
    };
    Ok((parse(x)?, parse(y)?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if !(cli.fps.is_finite() && cli.fps > 0.0) {
        return Err(format!("--fps must be positive, got {}", cli.fps).into());
    }

    let config = match &cli.config {
        Some(path) => load_config_from_file(path)?,
        None => ViewerConfig::default(),
    };
    let cache = cli.cache_dir.as_ref().map(DownloadCache::new).transpose()?;

    let mut viewer = Viewer::new(HeadlessEngine::new(), &config)?;
    viewer.setup(RenderTarget(0), TARGET_WIDTH, TARGET_HEIGHT)?;
    viewer.set_debug_logging_enabled(cli.debug_logging)?;
    if let Some(samples) = cli.msaa {
        viewer.set_msaa(samples)?;
    }
    if cli.filmic {
        viewer.set_tone_mapping_filmic()?;
    }
    viewer.set_wireframe_enabled(cli.wireframe)?;
    viewer.set_bounding_boxes_enabled(cli.bounds)?;

    let model = ResourceLocation::parse(&cli.model);
    let required = viewer.begin_model_load(model.read(cache.as_ref())?)?;
    log::info!("{} requires {} external resources", cli.model, required.len());
    let resources = fetch_resources(&model.base(), &required, cache.as_ref())?;
    viewer.finish_model_load(resources)?;

    // Locations double as cache keys, so the same file given twice is
    // uploaded once.
    if let Some(hdri) = &cli.hdri {
        let bytes = ResourceLocation::parse(hdri).read(cache.as_ref())?;
        viewer.set_hdri(&bytes, Some(hdri))?;
    }
    if let Some(ibl) = &cli.ibl {
        let bytes = ResourceLocation::parse(ibl).read(cache.as_ref())?;
        viewer.set_environment_light(&bytes, Some(ibl))?;
    }
    if let Some(skybox) = &cli.skybox {
        let bytes = ResourceLocation::parse(skybox).read(cache.as_ref())?;
        viewer.set_skybox(&bytes, Some(skybox))?;
    }

    for index in 0..viewer.animation_count()? {
        log::info!("animation {index}: {:.3}s", viewer.animation_duration(index)?);
    }
    if let Some(speed) = cli.speed {
        viewer.set_animation_speed(speed)?;
    }
    if let Some(index) = cli.animation {
        viewer.play_animation(index, cli.looping)?;
    }

    if let Some((dx, dy)) = cli.orbit {
        viewer.orbit_start()?;
        viewer.orbit_delta(dx, dy)?;
        viewer.orbit_end(dx * cli.fps, dy * cli.fps)?;
    }

    let frame_nanos = (1e9 / cli.fps).round() as u64;
    let log_every = (cli.fps.round() as u32).max(1);
    let mut rendered = 0u32;
    for frame in 0..cli.frames {
        let timestamp = u64::from(frame) * frame_nanos;
        if viewer.render_frame(timestamp)? == FrameStatus::Rendered {
            rendered += 1;
        }
        if frame % log_every == 0 || frame + 1 == cli.frames {
            let pose = viewer.camera_pose()?;
            log::info!(
                "frame {frame}: eye=({:.3}, {:.3}, {:.3}) animation={:?} moving={}",
                pose.eye.x,
                pose.eye.y,
                pose.eye.z,
                viewer.animation_state()?.map(|state| (state.index, state.time)),
                viewer.wants_continuous_rendering()
            );
        }
        for event in viewer.drain_events() {
            match event {
                ViewerEvent::ModelLoaded {
                    generation,
                    animation_count,
                } => log::info!("model loaded (generation {generation}, {animation_count} animations)"),
                ViewerEvent::LoadFailed { reason } => log::warn!("load failed: {reason}"),
                ViewerEvent::Fps(fps) => log::debug!("fps {fps:.1}"),
            }
        }
    }

    log::info!(
        "rendered {rendered} frames; engine recorded {}",
        viewer.engine().frames_rendered()
    );
    if let Some(cache) = &cache {
        log::info!("download cache holds {} bytes", cache.size_bytes()?);
    }
    viewer.destroy_renderer()?;
    Ok(())
}

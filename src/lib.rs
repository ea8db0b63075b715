//! Control layer between a host application and a real-time 3D renderer.
//!
//! The crate owns the parts of a model viewer that have real state: an orbit
//! camera with constraints and inertia, a two-phase glTF load that lets the
//! host fetch external resources between parsing and committing, animation
//! playback, and the per-frame pause/render loop that ties them together.
//! Rasterisation is delegated to a [`engine::RenderEngine`] implementation.
//!
//! ```no_run
//! use modelview::assets::ResourceMap;
//! use modelview::config::ViewerConfig;
//! use modelview::engine::{HeadlessEngine, RenderTarget};
//! use modelview::viewer::Viewer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut viewer = Viewer::new(HeadlessEngine::new(), &ViewerConfig::default())?;
//! viewer.setup(RenderTarget(0), 1280, 720)?;
//! let required = viewer.begin_model_load(std::fs::read("duck.gltf")?)?;
//! let mut resources = ResourceMap::new();
//! for id in required {
//!     let bytes = std::fs::read(&id)?;
//!     resources.insert(id, bytes);
//! }
//! viewer.finish_model_load(resources)?;
//! viewer.render_frame(0)?;
//! # Ok(())
//! # }
//! ```

pub mod animation;
pub mod assets;
pub mod camera;
pub mod clock;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod overlay;
pub mod fetch;
pub mod scene;
pub mod viewer;

pub use error::ErrorKind;
pub use viewer::{FrameStatus, Viewer, ViewerError, ViewerEvent};

#![forbid(unsafe_code)]

pub mod assets;
pub mod composite;
pub mod compositor;
pub mod core;
pub mod error;
pub mod face;
pub mod guide;
pub mod layout;
pub mod overlay;
pub mod session;
pub mod settings;
pub mod text;
pub mod timestamp;

pub use assets::{AssetRegistry, AssetState, PreparedAsset, PreparedFont, PreparedImage};
pub use compositor::Compositor;
pub use crate::core::{Rgba8, Surface, center_fit};
pub use error::{BoothError, BoothResult};
pub use face::{DetectPoll, DetectedFace, FaceDetector, ModelSources, NullDetector};
pub use layout::{LayoutId, LayoutPreset, select_layout};
pub use overlay::{OverlayEngine, TickOutcome, dialogue_placement, filter_placement, filter_spec};
pub use session::{CaptureSession, SessionPhase, SessionState, TickContext, TickEvent};
pub use settings::{AnchorPosition, RenderSettings, TimestampFormat, TimestampSettings};
pub use timestamp::format_timestamp;

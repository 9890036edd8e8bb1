//! # Photobooth guide (v0.1.0)
//!
//! This module is a standalone walkthrough of the engine's architecture and
//! public API. If you are looking for copy/paste commands, start with the
//! repository `README.md`; if you are implementing new features, start here.
//!
//! ---
//!
//! ## Core concepts
//!
//! - [`LayoutPreset`](crate::LayoutPreset): the strip grid (canvas size, rows,
//!   cols, borders) selected by name via [`select_layout`](crate::select_layout)
//! - [`RenderSettings`](crate::RenderSettings): the single user-editable
//!   context object every control mutates
//! - [`Compositor`](crate::Compositor): stateless pixel-level drawing over a
//!   [`Surface`](crate::Surface) (grid, theme, grain, timestamp, center-fit)
//! - [`OverlayEngine`](crate::OverlayEngine): the cooperative live loop that
//!   maps [`DetectedFace`](crate::DetectedFace) landmarks to filter/dialogue
//!   placements on the transparent overlay surface
//! - [`CaptureSession`](crate::CaptureSession): the one-second-tick state
//!   machine that counts down, composites each cell, and exports the strip
//! - [`AssetRegistry`](crate::AssetRegistry): the only place external IO is
//!   allowed; every entry is `Loading | Ready | Failed` and draw paths treat
//!   anything but `Ready` as "skip this layer"
//!
//! ## The two loops
//!
//! There is no parallelism anywhere: the embedder interleaves two
//! deterministic tick machines on one thread.
//!
//! 1. The overlay loop: [`OverlayEngine::tick`](crate::OverlayEngine::tick)
//!    once per display refresh. A [`Generation`](crate::overlay::Generation)
//!    token makes cancellation idempotent — any settings change calls
//!    [`restart`](crate::OverlayEngine::restart) and the stale loop's next
//!    tick becomes a no-op instead of stacking a duplicate loop.
//! 2. The capture ticker: [`CaptureSession::tick`](crate::CaptureSession::tick)
//!    once per second. When the countdown reaches zero the cell composite
//!    happens synchronously inside that tick, so the settings snapshot it
//!    reads cannot change mid-frame.
//!
//! ## "No IO in the drawing code" (and why)
//!
//! Compositing is deterministic and testable because the drawing routines
//! never touch the filesystem, the clock, or a camera:
//!
//! - decoding happens through [`AssetRegistry`](crate::AssetRegistry) and
//!   [`VideoFeed`](crate::assets::media::VideoFeed) (ffmpeg subprocess,
//!   behind the `media-ffmpeg` feature)
//! - the wall clock enters as a `chrono::NaiveDateTime` argument
//! - the camera enters as an `Option<&PreparedImage>` — `None` is a normal,
//!   degraded state, not an error
//!
//! ## Failure policy
//!
//! Nothing in the pipeline is fatal. Acquisition failures (camera, face
//! model) surface a status string and disable only their own layer;
//! not-yet-loaded assets are skipped per frame and self-heal once ready;
//! unknown layout/format/position names fall back to defaults; per-cycle
//! detection errors are logged and the loop continues. The worst outcome is
//! a photo strip missing a decorative layer.

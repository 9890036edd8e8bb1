use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::NaiveDateTime;

use crate::{
    assets::{AssetRegistry, PreparedImage},
    compositor::Compositor,
    core::{Rgba8, Surface},
    error::{BoothError, BoothResult},
    layout::LayoutPreset,
    settings::RenderSettings,
};

/// Fixed output filename for the finished strip.
pub const STRIP_FILENAME: &str = "photo_strip.png";

/// Ticks the "done" status stays up before the start control returns.
pub const FINALIZE_DELAY_TICKS: u32 = 3;

/// Solid fill behind letterboxed video in each cell.
const LETTERBOX_BACKING: Rgba8 = Rgba8::opaque(18, 20, 28);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Countdown { slot: u32, seconds_left: u32 },
    Capturing { slot: u32 },
    Finalizing { delay_ticks: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub frames_captured: u32,
    pub phase: SessionPhase,
}

/// Everything one tick needs to read. Built fresh by the embedder each
/// second; `settings` is the single snapshot used for the whole
/// synchronous composite of that tick.
pub struct TickContext<'a> {
    pub compositor: &'a mut Compositor,
    pub registry: &'a mut AssetRegistry,
    pub settings: &'a RenderSettings,
    /// Live overlay layer (face filters / dialogue) to bake into
    /// captured cells.
    pub overlay: &'a Surface,
    /// Current camera frame; `None` degrades to backing-only cells.
    pub camera_frame: Option<&'a PreparedImage>,
    pub elapsed_sec: f64,
    pub now: NaiveDateTime,
}

/// What one tick did, for the embedder's status surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickEvent {
    pub status: Option<String>,
    pub captured_slot: Option<u32>,
    pub strip_complete: bool,
    /// True on the tick that restores the start control.
    pub start_available: bool,
}

/// The timed multi-shot capture state machine. Owns the output strip
/// canvas; one instance per capture run.
pub struct CaptureSession {
    layout: LayoutPreset,
    countdown_secs: u32,
    state: SessionState,
    strip: Surface,
}

impl CaptureSession {
    pub fn new(layout: LayoutPreset, countdown_secs: u32) -> BoothResult<Self> {
        layout.validate()?;
        if countdown_secs == 0 {
            return Err(BoothError::validation("countdown must be at least 1 second"));
        }
        Ok(Self {
            strip: Surface::new(layout.pixel_width, layout.pixel_height),
            layout,
            countdown_secs,
            state: SessionState {
                frames_captured: 0,
                phase: SessionPhase::Idle,
            },
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn layout(&self) -> &LayoutPreset {
        &self.layout
    }

    pub fn strip(&self) -> &Surface {
        &self.strip
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.state.phase, SessionPhase::Idle)
    }

    /// Repaint the idle canvas: background, grid strokes, theme. Used at
    /// boot, on layout/border/theme changes, and when a run starts.
    pub fn redraw_idle_canvas(
        &mut self,
        compositor: &mut Compositor,
        registry: &AssetRegistry,
        settings: &RenderSettings,
    ) -> BoothResult<()> {
        compositor.draw_background(&mut self.strip);
        compositor.draw_grid(
            &mut self.strip,
            &self.layout,
            settings.border_color,
            settings.show_grid,
        )?;
        let theme = settings.theme.as_deref().and_then(|t| registry.image(t));
        compositor.draw_theme_overlay(&mut self.strip, theme)
    }

    /// Begin a run. The trigger is unavailable while a run is active;
    /// there is deliberately no way to abort a started session.
    #[tracing::instrument(skip_all)]
    pub fn start(
        &mut self,
        compositor: &mut Compositor,
        registry: &AssetRegistry,
        settings: &RenderSettings,
    ) -> BoothResult<()> {
        if self.is_running() {
            return Err(BoothError::capture("a capture session is already running"));
        }
        settings.validate()?;
        self.redraw_idle_canvas(compositor, registry, settings)?;
        self.state = SessionState {
            frames_captured: 0,
            phase: SessionPhase::Countdown {
                slot: 0,
                seconds_left: self.countdown_secs,
            },
        };
        Ok(())
    }

    /// One second of session time. The displayed countdown is evaluated
    /// before the internal counter decrements, and the capture fires on
    /// the tick where the counter has reached 0.
    #[tracing::instrument(skip_all)]
    pub fn tick(&mut self, ctx: &mut TickContext<'_>) -> BoothResult<TickEvent> {
        let total = self.layout.frames_per_strip();

        match self.state.phase {
            SessionPhase::Idle => Ok(TickEvent::default()),

            SessionPhase::Finalizing { delay_ticks } => {
                let remaining = delay_ticks.saturating_sub(1);
                if remaining == 0 {
                    self.state.phase = SessionPhase::Idle;
                    Ok(TickEvent {
                        start_available: true,
                        ..TickEvent::default()
                    })
                } else {
                    self.state.phase = SessionPhase::Finalizing {
                        delay_ticks: remaining,
                    };
                    Ok(TickEvent::default())
                }
            }

            SessionPhase::Capturing { .. } => {
                // Captures complete synchronously inside the countdown
                // branch; this phase is never observable across ticks.
                Err(BoothError::capture("tick during synchronous capture"))
            }

            SessionPhase::Countdown { slot, seconds_left } => {
                let mut slot = slot;
                let mut seconds = seconds_left;
                let mut captured_slot = None;

                if seconds == 0 {
                    self.state.phase = SessionPhase::Capturing { slot };
                    self.capture_frame(slot, ctx)?;
                    captured_slot = Some(slot);
                    self.state.frames_captured += 1;

                    if self.state.frames_captured >= total {
                        self.state.phase = SessionPhase::Finalizing {
                            delay_ticks: FINALIZE_DELAY_TICKS,
                        };
                        return Ok(TickEvent {
                            status: Some(format!("✅ all {total} photos captured!")),
                            captured_slot,
                            strip_complete: true,
                            start_available: false,
                        });
                    }

                    slot += 1;
                    seconds = self.countdown_secs;
                }

                let status = format!("Photo {}/{} in {}s", slot + 1, total, seconds);
                self.state.phase = SessionPhase::Countdown {
                    slot,
                    seconds_left: seconds.saturating_sub(1),
                };
                Ok(TickEvent {
                    status: Some(status),
                    captured_slot,
                    strip_complete: false,
                    start_available: false,
                })
            }
        }
    }

    /// Composite one cell immediately, outside a timed run. Used for
    /// one-off preview frames; a running session rejects it.
    pub fn capture_frame_now(
        &mut self,
        slot: u32,
        ctx: &mut TickContext<'_>,
    ) -> BoothResult<()> {
        if self.is_running() {
            return Err(BoothError::capture(
                "cannot capture a preview frame while a session is running",
            ));
        }
        if slot >= self.layout.frames_per_strip() {
            return Err(BoothError::validation(format!(
                "slot {slot} out of range for layout {}",
                self.layout.id.as_str()
            )));
        }
        self.capture_frame(slot, ctx)
    }

    /// Composite one cell: mirrored center-fit video, the overlay layer
    /// aligned to the fitted rect, grain at the current opacity, the
    /// timestamp at this instant, then the full decoration redraw so
    /// seams stay consistent. Reads `ctx.settings` exactly once, with no
    /// suspension points inside the composite.
    fn capture_frame(&mut self, slot: u32, ctx: &mut TickContext<'_>) -> BoothResult<()> {
        let settings = ctx.settings;
        let cell = self.layout.cell_rect(slot);

        let fitted = ctx.compositor.draw_image_fitted(
            &mut self.strip,
            ctx.camera_frame,
            cell,
            true,
            LETTERBOX_BACKING,
        )?;

        ctx.compositor
            .draw_surface_rect(&mut self.strip, ctx.overlay, fitted, true)?;

        let grain_frame = settings
            .grain
            .as_deref()
            .and_then(|name| ctx.registry.grain_frame(name, ctx.elapsed_sec));
        ctx.compositor.draw_grain_region(
            &mut self.strip,
            grain_frame.as_ref(),
            settings.grain_opacity,
            fitted,
        )?;

        // The timestamp layer is rendered pre-mirrored and then baked
        // through the same mirror as the video, ending up readable.
        if settings.timestamp.enabled && fitted.width() >= 1.0 && fitted.height() >= 1.0 {
            let mut stamp_layer =
                Surface::new(fitted.width().ceil() as u32, fitted.height().ceil() as u32);
            let region = stamp_layer.bounds();
            ctx.compositor.draw_timestamp(
                &mut stamp_layer,
                region,
                &settings.timestamp,
                ctx.registry.font(&settings.timestamp.font),
                ctx.now,
            )?;
            ctx.compositor
                .draw_surface_rect(&mut self.strip, &stamp_layer, fitted, true)?;
        }

        ctx.compositor.draw_grid(
            &mut self.strip,
            &self.layout,
            settings.border_color,
            settings.show_grid,
        )?;
        let theme = settings.theme.as_deref().and_then(|t| ctx.registry.image(t));
        ctx.compositor.draw_theme_overlay(&mut self.strip, theme)?;

        tracing::debug!(slot, "captured frame");
        Ok(())
    }

    /// Serialize the finished strip as `photo_strip.png` under
    /// `out_dir`. Returns the written path.
    pub fn export_strip(&self, out_dir: &Path) -> BoothResult<PathBuf> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("create output dir '{}'", out_dir.display()))
            .map_err(BoothError::Other)?;
        let path = out_dir.join(STRIP_FILENAME);
        image::save_buffer_with_format(
            &path,
            &self.strip.data,
            self.strip.width,
            self.strip.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))
        .map_err(BoothError::Other)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutId, LayoutPreset};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn small_layout() -> LayoutPreset {
        LayoutPreset {
            id: LayoutId::TwoByTwo,
            pixel_width: 120,
            pixel_height: 140,
            rows: 2,
            cols: 2,
            bottom_border_px: 20,
            left_border_px: 4,
            right_border_px: 4,
            bottom_band_frac: 1.0,
        }
    }

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap()
    }

    fn camera_frame() -> PreparedImage {
        PreparedImage {
            width: 8,
            height: 6,
            rgba8_premul: Arc::new(vec![200u8; 8 * 6 * 4]),
        }
    }

    struct Rig {
        compositor: Compositor,
        registry: AssetRegistry,
        settings: RenderSettings,
        overlay: Surface,
        camera: PreparedImage,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                compositor: Compositor::new(),
                registry: AssetRegistry::new("assets"),
                settings: RenderSettings::default(),
                overlay: Surface::new(8, 6),
                camera: camera_frame(),
            }
        }

        fn tick(&mut self, session: &mut CaptureSession) -> TickEvent {
            let mut ctx = TickContext {
                compositor: &mut self.compositor,
                registry: &mut self.registry,
                settings: &self.settings,
                overlay: &self.overlay,
                camera_frame: Some(&self.camera),
                elapsed_sec: 0.0,
                now: fixed_now(),
            };
            session.tick(&mut ctx).unwrap()
        }
    }

    #[test]
    fn rejects_zero_countdown() {
        assert!(CaptureSession::new(small_layout(), 0).is_err());
    }

    #[test]
    fn start_twice_is_rejected_while_running() {
        let mut rig = Rig::new();
        let mut session = CaptureSession::new(small_layout(), 2).unwrap();
        session
            .start(&mut rig.compositor, &rig.registry, &rig.settings)
            .unwrap();
        assert!(
            session
                .start(&mut rig.compositor, &rig.registry, &rig.settings)
                .is_err()
        );
    }

    #[test]
    fn countdown_displays_before_decrement() {
        let mut rig = Rig::new();
        let mut session = CaptureSession::new(small_layout(), 3).unwrap();
        session
            .start(&mut rig.compositor, &rig.registry, &rig.settings)
            .unwrap();

        let e = rig.tick(&mut session);
        assert_eq!(e.status.as_deref(), Some("Photo 1/4 in 3s"));
        let e = rig.tick(&mut session);
        assert_eq!(e.status.as_deref(), Some("Photo 1/4 in 2s"));
        let e = rig.tick(&mut session);
        assert_eq!(e.status.as_deref(), Some("Photo 1/4 in 1s"));

        // Internal counter has reached 0: this tick captures slot 0 and
        // rearms a fresh countdown for slot 1.
        let e = rig.tick(&mut session);
        assert_eq!(e.captured_slot, Some(0));
        assert_eq!(e.status.as_deref(), Some("Photo 2/4 in 3s"));
    }

    #[test]
    fn frames_only_increase_and_finalize_once() {
        let mut rig = Rig::new();
        let mut session = CaptureSession::new(small_layout(), 1).unwrap();
        session
            .start(&mut rig.compositor, &rig.registry, &rig.settings)
            .unwrap();

        let mut captured = Vec::new();
        let mut completions = 0;
        let mut last = 0;
        for _ in 0..16 {
            let e = rig.tick(&mut session);
            if let Some(slot) = e.captured_slot {
                captured.push(slot);
            }
            if e.strip_complete {
                completions += 1;
            }
            let now = session.state().frames_captured;
            assert!(now >= last);
            last = now;
            if !session.is_running() {
                break;
            }
        }

        assert_eq!(captured, vec![0, 1, 2, 3]);
        assert_eq!(session.state().frames_captured, 4);
        assert_eq!(completions, 1);
    }

    #[test]
    fn start_control_returns_after_finalize_delay() {
        let mut rig = Rig::new();
        let mut session = CaptureSession::new(small_layout(), 1).unwrap();
        session
            .start(&mut rig.compositor, &rig.registry, &rig.settings)
            .unwrap();

        // Drive to completion.
        loop {
            let e = rig.tick(&mut session);
            if e.strip_complete {
                break;
            }
        }
        assert!(matches!(
            session.state().phase,
            SessionPhase::Finalizing { .. }
        ));

        let mut restored = 0;
        for _ in 0..FINALIZE_DELAY_TICKS {
            let e = rig.tick(&mut session);
            if e.start_available {
                restored += 1;
            }
        }
        assert_eq!(restored, 1);
        assert!(!session.is_running());
    }

    #[test]
    fn session_without_camera_still_completes() {
        let mut rig = Rig::new();
        let mut session = CaptureSession::new(small_layout(), 1).unwrap();
        session
            .start(&mut rig.compositor, &rig.registry, &rig.settings)
            .unwrap();

        for _ in 0..16 {
            let mut ctx = TickContext {
                compositor: &mut rig.compositor,
                registry: &mut rig.registry,
                settings: &rig.settings,
                overlay: &rig.overlay,
                camera_frame: None,
                elapsed_sec: 0.0,
                now: fixed_now(),
            };
            let e = session.tick(&mut ctx).unwrap();
            if e.strip_complete {
                break;
            }
        }
        assert_eq!(session.state().frames_captured, 4);
    }

    #[test]
    fn export_writes_fixed_filename() {
        let mut rig = Rig::new();
        let mut session = CaptureSession::new(small_layout(), 1).unwrap();
        session
            .redraw_idle_canvas(&mut rig.compositor, &rig.registry, &rig.settings)
            .unwrap();

        let dir = std::path::PathBuf::from("target").join("session_export_test");
        let path = session.export_strip(&dir).unwrap();
        assert!(path.ends_with(STRIP_FILENAME));
        assert!(path.exists());
    }
}

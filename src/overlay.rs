use chrono::NaiveDateTime;

use crate::{
    assets::AssetRegistry,
    compositor::Compositor,
    core::{Rect, Surface},
    error::BoothResult,
    face::{DetectPoll, DetectedFace, FaceDetector},
    settings::{AnchorPosition, RenderSettings},
};

/// Per-filter calibration constants. These are empirically tuned data
/// carried per asset, not derived geometry.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FilterSpec {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

/// Calibration table keyed by filter id. Unknown ids get a neutral
/// centered placement.
pub fn filter_spec(id: &str) -> FilterSpec {
    match id {
        "hat" => FilterSpec {
            offset_x: 0.5,
            offset_y: 1.7,
            scale: 2.4,
        },
        "beret" => FilterSpec {
            offset_x: 0.55,
            offset_y: 1.5,
            scale: 2.1,
        },
        "glasses" => FilterSpec {
            offset_x: 0.5,
            offset_y: 0.9,
            scale: 1.7,
        },
        "mustache" => FilterSpec {
            offset_x: 0.5,
            offset_y: -0.15,
            scale: 1.1,
        },
        "cat-ears" => FilterSpec {
            offset_x: 0.5,
            offset_y: 2.2,
            scale: 2.6,
        },
        "bow" => FilterSpec {
            offset_x: -0.1,
            offset_y: 2.0,
            scale: 1.2,
        },
        _ => FilterSpec {
            offset_x: 0.5,
            offset_y: 0.5,
            scale: 1.5,
        },
    }
}

/// Dialogue bubble base width as a multiple of the measured face width.
pub const DIALOGUE_BASE_WIDTH_FACTOR: f64 = 1.5;

/// Anchor offsets for the dialogue bubble, as multiples of the UNSCALED
/// base width/height applied to the nose landmark. Using unscaled dims
/// keeps the anchor stable while the user drags the scale slider.
fn dialogue_anchor_factors(position: AnchorPosition) -> (f64, f64) {
    match position {
        AnchorPosition::TopLeft => (-0.9, -1.1),
        AnchorPosition::TopRight => (0.9, -1.1),
        AnchorPosition::TopCenter => (0.0, -1.3),
        AnchorPosition::BottomLeft => (-0.9, 1.1),
        AnchorPosition::BottomRight => (0.9, 1.1),
        AnchorPosition::BottomCenter => (0.0, 1.3),
    }
}

/// Screen-space draw rect for a filter asset over `face`:
/// `w = eye_span * scale`, aspect-locked height, origin at
/// `(inner_eye_mid_x - w * offset_x, nose.y - h * offset_y)`.
pub fn filter_placement(
    face: &DetectedFace,
    spec: FilterSpec,
    natural_w: u32,
    natural_h: u32,
) -> Option<Rect> {
    if natural_w == 0 || natural_h == 0 {
        return None;
    }
    let base = face.eye_span()?;
    if base <= 0.0 {
        return None;
    }
    let w = base * spec.scale;
    let h = w / (f64::from(natural_w) / f64::from(natural_h));
    let x = face.inner_eye_mid_x()? - w * spec.offset_x;
    let y = face.nose_tip()?.y - h * spec.offset_y;
    Some(Rect::new(x, y, x + w, y + h))
}

/// Screen-space rect for the dialogue bubble: base size derived from the
/// face width and the bubble's aspect, scaled by the user factor, and
/// centered on an anchor computed from the UNSCALED base dims.
pub fn dialogue_placement(
    face: &DetectedFace,
    natural_w: u32,
    natural_h: u32,
    position: AnchorPosition,
    scale: f64,
) -> Option<Rect> {
    if natural_w == 0 || natural_h == 0 || scale <= 0.0 {
        return None;
    }
    let face_w = face.eye_span()?;
    if face_w <= 0.0 {
        return None;
    }
    let base_w = face_w * DIALOGUE_BASE_WIDTH_FACTOR;
    let base_h = base_w / (f64::from(natural_w) / f64::from(natural_h));

    let nose = face.nose_tip()?;
    let (fx, fy) = dialogue_anchor_factors(position);
    let cx = nose.x + fx * base_w;
    let cy = nose.y + fy * base_h;

    let w = base_w * scale;
    let h = base_h * scale;
    Some(Rect::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0))
}

/// Token identifying one run of the overlay loop. A stale token makes
/// `tick` a no-op, which is how setting changes cancel the old loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayPhase {
    Idle,
    Detecting,
    Rendering,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The token was stale; a newer loop owns the overlay now.
    Cancelled,
    /// No face work active: overlay cleared, grain + timestamp drawn.
    IdleRedraw,
    /// A detection is still in flight; this cycle was skipped.
    DetectionPending,
    /// Faces rendered (possibly zero) plus grain + timestamp.
    Rendered { faces: usize },
}

/// Continuous best-effort live augmentation of the transparent overlay
/// surface. The embedder drives `tick` once per display refresh and
/// calls `restart` whenever a rendering-affecting setting changes.
pub struct OverlayEngine {
    generation: u64,
    detect_in_flight: bool,
    phase: OverlayPhase,
}

impl Default for OverlayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayEngine {
    pub fn new() -> Self {
        Self {
            generation: 0,
            detect_in_flight: false,
            phase: OverlayPhase::Idle,
        }
    }

    pub fn phase(&self) -> OverlayPhase {
        self.phase
    }

    pub fn generation(&self) -> Generation {
        Generation(self.generation)
    }

    /// Cancel the running loop and hand out the token for its
    /// replacement, atomically. Every settings change funnels through
    /// here instead of cancel-then-reschedule at each call site.
    pub fn restart(&mut self) -> Generation {
        self.generation += 1;
        self.detect_in_flight = false;
        self.phase = OverlayPhase::Idle;
        Generation(self.generation)
    }

    /// One cooperative cycle of the overlay loop.
    #[tracing::instrument(skip_all)]
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        generation: Generation,
        frame: Option<&crate::assets::PreparedImage>,
        detector: &mut dyn FaceDetector,
        compositor: &mut Compositor,
        overlay: &mut Surface,
        registry: &mut AssetRegistry,
        settings: &RenderSettings,
        elapsed_sec: f64,
        now: NaiveDateTime,
    ) -> BoothResult<TickOutcome> {
        if generation != self.generation() {
            return Ok(TickOutcome::Cancelled);
        }

        let Some(frame) = frame.filter(|_| settings.face_overlays_active()) else {
            self.phase = OverlayPhase::Idle;
            self.redraw_ambient(compositor, overlay, registry, settings, elapsed_sec, now, true)?;
            return Ok(TickOutcome::IdleRedraw);
        };

        self.phase = OverlayPhase::Detecting;
        let poll = match detector.poll_detect(frame) {
            Ok(poll) => poll,
            Err(e) => {
                // Per-cycle detection errors keep the loop alive.
                tracing::warn!(error = %e, "detection cycle failed");
                self.detect_in_flight = false;
                self.phase = OverlayPhase::Idle;
                self.redraw_ambient(
                    compositor, overlay, registry, settings, elapsed_sec, now, true,
                )?;
                return Ok(TickOutcome::IdleRedraw);
            }
        };

        let faces = match poll {
            DetectPoll::Pending => {
                // At most one detection in flight: skip and reschedule.
                self.detect_in_flight = true;
                return Ok(TickOutcome::DetectionPending);
            }
            DetectPoll::Complete(faces) => {
                self.detect_in_flight = false;
                faces
            }
        };

        self.phase = OverlayPhase::Rendering;
        overlay.clear_transparent();
        let mut rendered = 0usize;
        for face in &faces {
            if !face.has_required_landmarks() {
                tracing::debug!("face missing required landmarks, skipped");
                continue;
            }
            self.draw_face_overlays(compositor, overlay, registry, settings, face)?;
            rendered += 1;
        }

        self.redraw_ambient(compositor, overlay, registry, settings, elapsed_sec, now, false)?;
        Ok(TickOutcome::Rendered { faces: rendered })
    }

    pub fn detect_in_flight(&self) -> bool {
        self.detect_in_flight
    }

    fn draw_face_overlays(
        &mut self,
        compositor: &mut Compositor,
        overlay: &mut Surface,
        registry: &AssetRegistry,
        settings: &RenderSettings,
        face: &DetectedFace,
    ) -> BoothResult<()> {
        if let Some(filter_id) = &settings.filter
            && let Some(img) = registry.image(filter_id)
            && let Some(rect) = filter_placement(face, filter_spec(filter_id), img.width, img.height)
        {
            compositor.draw_image_rect(overlay, img, rect, 1.0, false)?;
        }

        let dialogue = &settings.dialogue;
        if dialogue.enabled
            && let Some(bubble_id) = &dialogue.bubble
            && let Some(img) = registry.image(bubble_id)
            && let Some(rect) = dialogue_placement(
                face,
                img.width,
                img.height,
                dialogue.position,
                dialogue.scale,
            )
        {
            compositor.draw_image_rect(overlay, img, rect, 1.0, false)?;
            compositor.draw_wrapped_text(
                overlay,
                rect,
                &dialogue.text,
                registry.font(&dialogue.font),
                dialogue.size_px,
                dialogue.color,
            )?;
        }
        Ok(())
    }

    /// Grain + timestamp, shared by the idle branch and the tail of a
    /// face-rendering cycle.
    #[allow(clippy::too_many_arguments)]
    fn redraw_ambient(
        &mut self,
        compositor: &mut Compositor,
        overlay: &mut Surface,
        registry: &mut AssetRegistry,
        settings: &RenderSettings,
        elapsed_sec: f64,
        now: NaiveDateTime,
        clear_first: bool,
    ) -> BoothResult<()> {
        if clear_first {
            overlay.clear_transparent();
        }

        let grain_frame = settings
            .grain
            .as_deref()
            .and_then(|name| registry.grain_frame(name, elapsed_sec));
        compositor.draw_grain_overlay(overlay, grain_frame.as_ref(), settings.grain_opacity)?;

        let region = overlay.bounds();
        compositor.draw_timestamp(
            overlay,
            region,
            &settings.timestamp,
            registry.font(&settings.timestamp.font),
            now,
        )?;
        Ok(())
    }
}

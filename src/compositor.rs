use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::{
    assets::{PreparedFont, PreparedImage},
    composite,
    core::{Affine, Rect, Rgba8, Surface},
    error::{BoothError, BoothResult},
    layout::LayoutPreset,
    settings::{AnchorPosition, TimestampSettings},
    text::{TextBrushRgba8, TextLayoutEngine},
    timestamp::format_timestamp,
};

/// Width of the thin top/left/right strip edges.
pub const OUTER_EDGE_PX: f64 = 10.0;
/// Width of the internal row/column dividers. One constant feeds both
/// the idle redraw and the post-capture redraw so seams always match.
pub const INNER_DIVIDER_PX: f64 = 10.0;
/// Inset used when anchoring the timestamp inside its region.
pub const TIMESTAMP_PADDING_PX: f64 = 16.0;
/// Neutral idle-canvas background.
pub const BACKGROUND_COLOR: Rgba8 = Rgba8::opaque(0xee, 0xee, 0xee);

const SHADOW_OFFSET_PX: f64 = 2.0;
const OUTLINE_OFFSET_PX: f64 = 1.0;

/// Stateless pixel-level drawing routines over a [`Surface`].
///
/// Every routine rasterizes its layer with `vello_cpu` into a scratch
/// pixmap and composites premultiplied-over onto the target, so repeated
/// calls accumulate exactly like the original canvas did. All routines
/// degrade to skipping their layer on missing inputs.
pub struct Compositor {
    ctx: Option<vello_cpu::RenderContext>,
    text_engine: TextLayoutEngine,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            ctx: None,
            text_engine: TextLayoutEngine::new(),
        }
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> BoothResult<R>,
    ) -> BoothResult<R> {
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(self, &mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }

    /// Rasterize one layer and composite it over `surface` at `opacity`.
    fn render_layer(
        &mut self,
        surface: &mut Surface,
        opacity: f32,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> BoothResult<()>,
    ) -> BoothResult<()> {
        if surface.is_empty() || opacity <= 0.0 {
            return Ok(());
        }
        let w: u16 = surface
            .width
            .try_into()
            .map_err(|_| BoothError::validation("surface width exceeds u16"))?;
        let h: u16 = surface
            .height
            .try_into()
            .map_err(|_| BoothError::validation("surface height exceeds u16"))?;

        let mut scratch = vello_cpu::Pixmap::new(w, h);
        self.with_ctx_mut(w, h, |this, ctx| {
            ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            f(this, ctx)?;
            ctx.flush();
            ctx.render_to_pixmap(&mut scratch);
            Ok(())
        })?;

        composite::over_in_place(&mut surface.data, scratch.data_as_u8_slice(), opacity)
    }

    /// Fill the whole surface with the neutral idle background.
    pub fn draw_background(&mut self, surface: &mut Surface) {
        surface.fill(BACKGROUND_COLOR);
    }

    /// Draw the strip decoration strokes: thin top/left/right edges, the
    /// thick (possibly shortened, centered) bottom band, and the internal
    /// row/column dividers. `show_grid == false` skips all strokes.
    #[tracing::instrument(skip(self, surface, layout))]
    pub fn draw_grid(
        &mut self,
        surface: &mut Surface,
        layout: &LayoutPreset,
        border_color: Rgba8,
        show_grid: bool,
    ) -> BoothResult<()> {
        if !show_grid {
            return Ok(());
        }

        let w = f64::from(surface.width);
        let h = f64::from(surface.height);
        let bottom = f64::from(layout.bottom_border_px);
        let band_w = (w * layout.bottom_band_frac).clamp(0.0, w);
        let band_x0 = (w - band_w) / 2.0;
        let cell_w = layout.cell_width();
        let cell_h = layout.cell_height();
        let left = f64::from(layout.left_border_px);
        let cols = layout.cols;
        let rows = layout.rows;

        self.render_layer(surface, 1.0, |_, ctx| {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                border_color.r,
                border_color.g,
                border_color.b,
                border_color.a,
            ));

            // Thin outer edges.
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, OUTER_EDGE_PX));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, OUTER_EDGE_PX, h));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(w - OUTER_EDGE_PX, 0.0, w, h));

            // Thick bottom band.
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                band_x0,
                h - bottom,
                band_x0 + band_w,
                h,
            ));

            // Internal dividers, centered on cell boundaries.
            for i in 1..cols {
                let cx = left + f64::from(i) * cell_w;
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                    cx - INNER_DIVIDER_PX / 2.0,
                    0.0,
                    cx + INNER_DIVIDER_PX / 2.0,
                    h,
                ));
            }
            for i in 1..rows {
                let cy = f64::from(i) * cell_h;
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                    0.0,
                    cy - INNER_DIVIDER_PX / 2.0,
                    w,
                    cy + INNER_DIVIDER_PX / 2.0,
                ));
            }
            Ok(())
        })
    }

    /// Stretch the theme image over the whole canvas, above grid lines.
    /// Themes are full-bleed decorative frames, not per-cell stickers.
    pub fn draw_theme_overlay(
        &mut self,
        surface: &mut Surface,
        theme: Option<&PreparedImage>,
    ) -> BoothResult<()> {
        let Some(img) = theme else {
            return Ok(());
        };
        let bounds = surface.bounds();
        self.draw_image_rect(surface, img, bounds, 1.0, false)
    }

    /// Alpha-blend the current grain frame over the whole surface.
    pub fn draw_grain_overlay(
        &mut self,
        surface: &mut Surface,
        frame: Option<&PreparedImage>,
        opacity: f64,
    ) -> BoothResult<()> {
        let bounds = surface.bounds();
        self.draw_grain_region(surface, frame, opacity, bounds)
    }

    /// Alpha-blend the current grain frame into one rectangle (the
    /// capture path bakes grain per cell). `None` frames and zero
    /// opacity leave the existing pixels untouched.
    pub fn draw_grain_region(
        &mut self,
        surface: &mut Surface,
        frame: Option<&PreparedImage>,
        opacity: f64,
        region: Rect,
    ) -> BoothResult<()> {
        let Some(img) = frame else {
            return Ok(());
        };
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity <= 0.0 {
            return Ok(());
        }
        self.draw_image_rect(surface, img, region, opacity, false)
    }

    /// Stretch-draw an image into `rect` at `opacity`, optionally
    /// mirrored about the rect's vertical center line.
    pub fn draw_image_rect(
        &mut self,
        surface: &mut Surface,
        image: &PreparedImage,
        rect: Rect,
        opacity: f64,
        mirror: bool,
    ) -> BoothResult<()> {
        if image.width == 0 || image.height == 0 || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Ok(());
        }
        let paint = image_paint(image)?;
        let iw = f64::from(image.width);
        let ih = f64::from(image.height);
        let place = Affine::translate((rect.x0, rect.y0))
            * Affine::scale_non_uniform(rect.width() / iw, rect.height() / ih);
        let transform = if mirror {
            mirror_about(rect) * place
        } else {
            place
        };

        self.render_layer(surface, opacity as f32, move |_, ctx| {
            ctx.set_transform(affine_to_cpu(transform));
            ctx.set_paint(paint);
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, iw, ih));
            Ok(())
        })
    }

    /// Center-fit `image` into `cell` over a solid letterbox backing,
    /// optionally mirrored. Returns the fitted rect so later layers
    /// (overlay, grain, timestamp) can align to it.
    pub fn draw_image_fitted(
        &mut self,
        surface: &mut Surface,
        image: Option<&PreparedImage>,
        cell: Rect,
        mirror: bool,
        backing: Rgba8,
    ) -> BoothResult<Rect> {
        if cell.width() <= 0.0 || cell.height() <= 0.0 {
            return Ok(cell);
        }

        self.render_layer(surface, 1.0, |_, ctx| {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                backing.r, backing.g, backing.b, backing.a,
            ));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                cell.x0, cell.y0, cell.x1, cell.y1,
            ));
            Ok(())
        })?;

        let Some(img) = image else {
            // No camera frame: the cell stays letterbox-backing only.
            return Ok(cell);
        };
        if img.width == 0 || img.height == 0 {
            return Ok(cell);
        }

        let fitted = crate::core::center_fit(f64::from(img.width), f64::from(img.height), cell);
        self.draw_image_rect(surface, img, fitted, 1.0, mirror)?;
        Ok(fitted)
    }

    /// Draw another surface (the live overlay layer) stretched into
    /// `rect`, optionally mirrored. Used when baking the face overlay
    /// into a captured cell.
    pub fn draw_surface_rect(
        &mut self,
        surface: &mut Surface,
        src: &Surface,
        rect: Rect,
        mirror: bool,
    ) -> BoothResult<()> {
        if src.is_empty() || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Ok(());
        }
        let img = PreparedImage {
            width: src.width,
            height: src.height,
            rgba8_premul: Arc::new(src.data.clone()),
        };
        self.draw_image_rect(surface, &img, rect, 1.0, mirror)
    }

    /// Render the timestamp into `region`, anchored per settings,
    /// horizontally mirrored so it reads correctly after the mirrored
    /// capture, with a drop shadow and an outline pass for legibility.
    #[tracing::instrument(skip(self, surface, settings, font))]
    pub fn draw_timestamp(
        &mut self,
        surface: &mut Surface,
        region: Rect,
        settings: &TimestampSettings,
        font: Option<&PreparedFont>,
        when: NaiveDateTime,
    ) -> BoothResult<()> {
        if !settings.enabled {
            return Ok(());
        }
        let Some(font) = font else {
            tracing::debug!("timestamp font not ready, skipping layer");
            return Ok(());
        };

        let text = format_timestamp(when, &settings.format);
        let color = settings.color;
        let layout = self.text_engine.layout_plain(
            &text,
            &font.bytes,
            settings.size_px as f32,
            TextBrushRgba8::new(color.r, color.g, color.b, color.a),
            None,
        )?;
        let tw = f64::from(layout.width());
        let th = f64::from(layout.height());
        let (x, y) = anchor_origin(region, settings.position, TIMESTAMP_PADDING_PX, tw, th);

        let base = mirror_text_transform(x, y, tw);
        let font_data = font_data(font);
        let outline = contrasting_outline(color);

        self.render_layer(surface, 1.0, |_, ctx| {
            // Shadow, then outline ring, then the fill on top.
            draw_glyphs(
                ctx,
                &layout,
                &font_data,
                base * Affine::translate((SHADOW_OFFSET_PX, SHADOW_OFFSET_PX)),
                Rgba8 {
                    r: 0,
                    g: 0,
                    b: 0,
                    a: 160,
                },
            );
            for (dx, dy) in [
                (-OUTLINE_OFFSET_PX, 0.0),
                (OUTLINE_OFFSET_PX, 0.0),
                (0.0, -OUTLINE_OFFSET_PX),
                (0.0, OUTLINE_OFFSET_PX),
            ] {
                draw_glyphs(ctx, &layout, &font_data, base * Affine::translate((dx, dy)), outline);
            }
            draw_glyphs(ctx, &layout, &font_data, base, color);
            Ok(())
        })
    }

    /// Greedy-wrapped, mirrored dialogue text centered as a block inside
    /// the bubble rect. Wrap width is 80% of the bubble width.
    pub fn draw_wrapped_text(
        &mut self,
        surface: &mut Surface,
        bubble: Rect,
        text: &str,
        font: Option<&PreparedFont>,
        size_px: f64,
        color: Rgba8,
    ) -> BoothResult<()> {
        if text.is_empty() || bubble.width() <= 0.0 || bubble.height() <= 0.0 {
            return Ok(());
        }
        let Some(font) = font else {
            tracing::debug!("dialogue font not ready, skipping layer");
            return Ok(());
        };

        let wrap_w = bubble.width() * 0.8;
        let layout = self.text_engine.layout_plain(
            text,
            &font.bytes,
            size_px as f32,
            TextBrushRgba8::new(color.r, color.g, color.b, color.a),
            Some(wrap_w as f32),
        )?;
        let tw = f64::from(layout.width());
        let th = f64::from(layout.height());
        let x = bubble.x0 + (bubble.width() - wrap_w) / 2.0;
        let y = bubble.y0 + (bubble.height() - th) / 2.0;

        let base = mirror_text_transform(x, y, tw.max(wrap_w));
        let font_data = font_data(font);

        self.render_layer(surface, 1.0, |_, ctx| {
            draw_glyphs(ctx, &layout, &font_data, base, color);
            Ok(())
        })
    }
}

/// Anchor a `tw x th` block inside `region` with a fixed inset.
pub fn anchor_origin(
    region: Rect,
    position: AnchorPosition,
    padding: f64,
    tw: f64,
    th: f64,
) -> (f64, f64) {
    let cx = (region.x0 + region.x1) / 2.0 - tw / 2.0;
    match position {
        AnchorPosition::TopLeft => (region.x0 + padding, region.y0 + padding),
        AnchorPosition::TopRight => (region.x1 - padding - tw, region.y0 + padding),
        AnchorPosition::BottomLeft => (region.x0 + padding, region.y1 - padding - th),
        AnchorPosition::BottomRight => (region.x1 - padding - tw, region.y1 - padding - th),
        AnchorPosition::TopCenter => (cx, region.y0 + padding),
        AnchorPosition::BottomCenter => (cx, region.y1 - padding - th),
    }
}

/// Horizontal flip about the vertical center line of `rect`.
fn mirror_about(rect: Rect) -> Affine {
    Affine::translate((rect.x0 + rect.x1, 0.0)) * Affine::scale_non_uniform(-1.0, 1.0)
}

/// Place a text block at `(x, y)` flipped about its own width, so it
/// reads correctly once the whole capture is mirrored.
fn mirror_text_transform(x: f64, y: f64, tw: f64) -> Affine {
    Affine::translate((x + tw, y)) * Affine::scale_non_uniform(-1.0, 1.0)
}

fn contrasting_outline(color: Rgba8) -> Rgba8 {
    // Perceived luminance picks a dark outline for light text and vice
    // versa.
    let luma =
        0.299 * f64::from(color.r) + 0.587 * f64::from(color.g) + 0.114 * f64::from(color.b);
    if luma >= 128.0 {
        Rgba8::opaque(0, 0, 0)
    } else {
        Rgba8::opaque(255, 255, 255)
    }
}

fn font_data(font: &PreparedFont) -> vello_cpu::peniko::FontData {
    vello_cpu::peniko::FontData::new(
        vello_cpu::peniko::Blob::from(font.bytes.as_ref().clone()),
        0,
    )
}

fn draw_glyphs(
    ctx: &mut vello_cpu::RenderContext,
    layout: &parley::Layout<TextBrushRgba8>,
    font: &vello_cpu::peniko::FontData,
    transform: Affine,
    color: Rgba8,
) {
    ctx.set_transform(affine_to_cpu(transform));
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                color.r, color.g, color.b, color.a,
            ));
            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn image_paint(image: &PreparedImage) -> BoothResult<vello_cpu::Image> {
    let w: u16 = image
        .width
        .try_into()
        .map_err(|_| BoothError::validation("image width exceeds u16"))?;
    let h: u16 = image
        .height
        .try_into()
        .map_err(|_| BoothError::validation("image height exceeds u16"))?;
    let expected = (image.width as usize)
        .saturating_mul(image.height as usize)
        .saturating_mul(4);
    if image.rgba8_premul.len() != expected {
        return Err(BoothError::validation("image byte len mismatch"));
    }

    // Pixmap stores PremulRgba8; our bytes are already premultiplied.
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (image.width as usize) * (image.height as usize),
    );
    for px in image.rgba8_premul.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true);
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

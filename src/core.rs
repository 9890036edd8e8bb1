use crate::error::{BoothError, BoothResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rrggbb` or `#rrggbbaa` hex notation.
    pub fn parse_hex(s: &str) -> BoothResult<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !hex.is_ascii() {
            return Err(BoothError::validation(format!("invalid hex color '{s}'")));
        }
        let byte = |i: usize| -> BoothResult<u8> {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| BoothError::validation(format!("invalid hex color '{s}'")))
        };
        match hex.len() {
            6 => Ok(Self {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: 255,
            }),
            8 => Ok(Self {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => Err(BoothError::validation(format!(
                "hex color must be 6 or 8 digits, got '{s}'"
            ))),
        }
    }

    /// Hex parse that degrades to `fallback` instead of failing the draw.
    pub fn parse_hex_or(s: &str, fallback: Self) -> Self {
        Self::parse_hex(s).unwrap_or(fallback)
    }

    pub fn to_premul(self) -> [u8; 4] {
        let a16 = u16::from(self.a);
        let premul = |c: u8| -> u8 { (((u16::from(c) * a16) + 127) / 255) as u8 };
        [premul(self.r), premul(self.g), premul(self.b), self.a]
    }
}

/// Owned drawing surface: tightly packed, row-major, premultiplied RGBA8.
#[derive(Clone, Debug)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        Self {
            width,
            height,
            data: vec![0u8; len],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn clear_transparent(&mut self) {
        self.data.fill(0);
    }

    pub fn fill(&mut self, color: Rgba8) {
        let px = color.to_premul();
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = self.data.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

/// Aspect-preserving letterbox fit of a `src_w x src_h` source into `dst`.
///
/// The fitted rect is fully contained in `dst`, touches at least one pair of
/// opposite edges, and is centered along the slack axis. Degenerate inputs
/// return a zero rect at the destination origin.
pub fn center_fit(src_w: f64, src_h: f64, dst: Rect) -> Rect {
    let dw = dst.width();
    let dh = dst.height();
    if src_w <= 0.0 || src_h <= 0.0 || dw <= 0.0 || dh <= 0.0 {
        return Rect::new(dst.x0, dst.y0, dst.x0, dst.y0);
    }

    let scale = (dw / src_w).min(dh / src_h);
    let w = src_w * scale;
    let h = src_h * scale;
    let x = dst.x0 + (dw - w) / 2.0;
    let y = dst.y0 + (dh - h) / 2.0;
    Rect::new(x, y, x + w, y + h)
}

use crate::{
    core::Rect,
    error::{BoothError, BoothResult},
};

/// Named grid presets for the output strip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LayoutId {
    #[serde(rename = "3x2")]
    ThreeByTwo,
    #[serde(rename = "4x1")]
    FourByOne,
    #[serde(rename = "2x2")]
    TwoByTwo,
    #[serde(rename = "2x1")]
    TwoByOne,
    #[serde(rename = "1x1")]
    OneByOne,
}

impl LayoutId {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "3x2" => Some(Self::ThreeByTwo),
            "4x1" => Some(Self::FourByOne),
            "2x2" => Some(Self::TwoByTwo),
            "2x1" => Some(Self::TwoByOne),
            "1x1" => Some(Self::OneByOne),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThreeByTwo => "3x2",
            Self::FourByOne => "4x1",
            Self::TwoByTwo => "2x2",
            Self::TwoByOne => "2x1",
            Self::OneByOne => "1x1",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayoutPreset {
    pub id: LayoutId,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub rows: u32,
    pub cols: u32,
    pub bottom_border_px: u32,
    pub left_border_px: u32,
    pub right_border_px: u32,
    /// Fraction of the canvas width covered by the thick bottom band,
    /// centered. 1.0 = full width.
    pub bottom_band_frac: f64,
}

pub const DEFAULT_LAYOUT: LayoutId = LayoutId::ThreeByTwo;

pub fn preset(id: LayoutId) -> LayoutPreset {
    match id {
        LayoutId::ThreeByTwo => LayoutPreset {
            id,
            pixel_width: 1200,
            pixel_height: 1800,
            rows: 3,
            cols: 2,
            bottom_border_px: 100,
            left_border_px: 20,
            right_border_px: 20,
            bottom_band_frac: 1.0,
        },
        LayoutId::FourByOne => LayoutPreset {
            id,
            pixel_width: 600,
            pixel_height: 1800,
            rows: 4,
            cols: 1,
            bottom_border_px: 120,
            left_border_px: 20,
            right_border_px: 20,
            bottom_band_frac: 1.0,
        },
        LayoutId::TwoByTwo => LayoutPreset {
            id,
            pixel_width: 1200,
            pixel_height: 1200,
            rows: 2,
            cols: 2,
            bottom_border_px: 100,
            left_border_px: 20,
            right_border_px: 20,
            bottom_band_frac: 1.0,
        },
        LayoutId::TwoByOne => LayoutPreset {
            id,
            pixel_width: 600,
            pixel_height: 1200,
            rows: 2,
            cols: 1,
            bottom_border_px: 100,
            left_border_px: 20,
            right_border_px: 20,
            bottom_band_frac: 1.0,
        },
        LayoutId::OneByOne => LayoutPreset {
            id,
            pixel_width: 900,
            pixel_height: 1200,
            rows: 1,
            cols: 1,
            bottom_border_px: 100,
            left_border_px: 20,
            right_border_px: 20,
            bottom_band_frac: 0.85,
        },
    }
}

/// Resolve a layout by name. Unrecognized ids fall back to the default
/// preset rather than failing the caller.
pub fn select_layout(name: &str) -> LayoutPreset {
    match LayoutId::parse(name) {
        Some(id) => preset(id),
        None => {
            tracing::warn!(name, "unknown layout id, falling back to default");
            preset(DEFAULT_LAYOUT)
        }
    }
}

impl LayoutPreset {
    pub fn frames_per_strip(&self) -> u32 {
        self.rows * self.cols
    }

    pub fn cell_width(&self) -> f64 {
        f64::from(self.pixel_width - self.left_border_px - self.right_border_px)
            / f64::from(self.cols)
    }

    pub fn cell_height(&self) -> f64 {
        f64::from(self.pixel_height - self.bottom_border_px) / f64::from(self.rows)
    }

    /// Rect of cell `slot` (row-major order).
    pub fn cell_rect(&self, slot: u32) -> Rect {
        let row = slot / self.cols;
        let col = slot % self.cols;
        let w = self.cell_width();
        let h = self.cell_height();
        let x = f64::from(self.left_border_px) + f64::from(col) * w;
        let y = f64::from(row) * h;
        Rect::new(x, y, x + w, y + h)
    }

    pub fn validate(&self) -> BoothResult<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(BoothError::validation("layout must have rows>0 and cols>0"));
        }
        if self.pixel_width == 0 || self.pixel_height == 0 {
            return Err(BoothError::validation("layout canvas must be non-empty"));
        }
        if self.left_border_px + self.right_border_px >= self.pixel_width {
            return Err(BoothError::validation(
                "left+right borders exceed canvas width",
            ));
        }
        if self.bottom_border_px >= self.pixel_height {
            return Err(BoothError::validation("bottom border exceeds canvas height"));
        }
        if !(0.0..=1.0).contains(&self.bottom_band_frac) {
            return Err(BoothError::validation("bottom_band_frac must be in [0,1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [LayoutId; 5] = [
        LayoutId::ThreeByTwo,
        LayoutId::FourByOne,
        LayoutId::TwoByTwo,
        LayoutId::TwoByOne,
        LayoutId::OneByOne,
    ];

    #[test]
    fn presets_validate() {
        for id in ALL {
            preset(id).validate().unwrap();
        }
    }

    #[test]
    fn cell_geometry_tiles_the_canvas() {
        for id in ALL {
            let p = preset(id);
            let total_w = f64::from(p.cols) * p.cell_width()
                + f64::from(p.left_border_px)
                + f64::from(p.right_border_px);
            let total_h = f64::from(p.rows) * p.cell_height() + f64::from(p.bottom_border_px);
            assert!((total_w - f64::from(p.pixel_width)).abs() < 1e-6, "{id:?}");
            assert!((total_h - f64::from(p.pixel_height)).abs() < 1e-6, "{id:?}");
        }
    }

    #[test]
    fn cell_rect_row_major() {
        let p = preset(LayoutId::ThreeByTwo);
        let first = p.cell_rect(0);
        assert_eq!(first.x0, f64::from(p.left_border_px));
        assert_eq!(first.y0, 0.0);

        // Slot 2 starts row 1 in a 2-column grid.
        let third = p.cell_rect(2);
        assert_eq!(third.x0, f64::from(p.left_border_px));
        assert!((third.y0 - p.cell_height()).abs() < 1e-9);
    }

    #[test]
    fn select_layout_falls_back_to_default() {
        assert_eq!(select_layout("9x9").id, DEFAULT_LAYOUT);
        assert_eq!(select_layout("2x2").id, LayoutId::TwoByTwo);
    }

    #[test]
    fn id_round_trips_through_parse() {
        for id in ALL {
            assert_eq!(LayoutId::parse(id.as_str()), Some(id));
        }
    }
}

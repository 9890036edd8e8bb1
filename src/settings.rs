use crate::{
    core::Rgba8,
    error::{BoothError, BoothResult},
};

/// One of the six overlay anchor positions shared by timestamp and
/// dialogue placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    TopCenter,
    BottomCenter,
}

impl AnchorPosition {
    /// Unknown names fall back to `BottomRight` so a bad config value
    /// degrades instead of dropping the layer.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim() {
            "top-left" => Self::TopLeft,
            "top-right" => Self::TopRight,
            "bottom-left" => Self::BottomLeft,
            "bottom-right" => Self::BottomRight,
            "top-center" => Self::TopCenter,
            "bottom-center" => Self::BottomCenter,
            _ => Self::BottomRight,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampFormat {
    DdMmYyyy,
    MmDdYyyy,
    YyyyMmDd,
    /// Date plus time of day.
    Full,
    /// Template with `DD`, `MM`, `YYYY`, `HH`, `mm`, `ss` tokens.
    Custom(String),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimestampSettings {
    pub enabled: bool,
    pub format: TimestampFormat,
    /// Asset key of the font to render with.
    pub font: String,
    pub size_px: f64,
    pub color: Rgba8,
    pub position: AnchorPosition,
}

impl Default for TimestampSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            format: TimestampFormat::DdMmYyyy,
            font: "default".to_string(),
            size_px: 28.0,
            color: Rgba8::opaque(255, 255, 255),
            position: AnchorPosition::BottomRight,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DialogueSettings {
    pub enabled: bool,
    /// Asset key of the bubble image.
    pub bubble: Option<String>,
    pub text: String,
    pub font: String,
    pub size_px: f64,
    pub color: Rgba8,
    pub position: AnchorPosition,
    /// User-controlled multiplier on top of the face-derived base size.
    pub scale: f64,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bubble: None,
            text: String::new(),
            font: "default".to_string(),
            size_px: 24.0,
            color: Rgba8::opaque(20, 20, 20),
            position: AnchorPosition::TopRight,
            scale: 1.0,
        }
    }
}

/// The single long-lived, user-editable rendering context. Controls
/// mutate this struct and re-apply it to the live pipeline in one step
/// (see `OverlayEngine::restart`).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderSettings {
    pub border_color: Rgba8,
    pub theme: Option<String>,
    pub filter: Option<String>,
    pub grain: Option<String>,
    pub grain_opacity: f64,
    pub show_grid: bool,
    pub timestamp: TimestampSettings,
    pub dialogue: DialogueSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            // The original booth's default frame color.
            border_color: Rgba8 {
                r: 0xf7,
                g: 0xf2,
                b: 0xf2,
                a: 0xff,
            },
            theme: None,
            filter: None,
            grain: None,
            grain_opacity: 0.15,
            show_grid: true,
            timestamp: TimestampSettings::default(),
            dialogue: DialogueSettings::default(),
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> BoothResult<()> {
        if !(0.0..=1.0).contains(&self.grain_opacity) {
            return Err(BoothError::validation("grain_opacity must be in [0,1]"));
        }
        if self.timestamp.size_px <= 0.0 || !self.timestamp.size_px.is_finite() {
            return Err(BoothError::validation(
                "timestamp size_px must be finite and > 0",
            ));
        }
        if self.dialogue.size_px <= 0.0 || !self.dialogue.size_px.is_finite() {
            return Err(BoothError::validation(
                "dialogue size_px must be finite and > 0",
            ));
        }
        if self.dialogue.scale <= 0.0 || !self.dialogue.scale.is_finite() {
            return Err(BoothError::validation(
                "dialogue scale must be finite and > 0",
            ));
        }
        Ok(())
    }

    /// True when the overlay loop has face-driven work to do.
    pub fn face_overlays_active(&self) -> bool {
        self.filter.is_some() || (self.dialogue.enabled && self.dialogue.bubble.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        RenderSettings::default().validate().unwrap();
    }

    #[test]
    fn opacity_out_of_range_is_rejected() {
        let mut s = RenderSettings::default();
        s.grain_opacity = 1.5;
        assert!(s.validate().is_err());
    }

    #[test]
    fn json_roundtrip() {
        let mut s = RenderSettings::default();
        s.theme = Some("prom-night".to_string());
        s.timestamp.enabled = true;
        s.timestamp.format = TimestampFormat::Custom("DD-MM-YYYY".to_string());
        let text = serde_json::to_string_pretty(&s).unwrap();
        let de: RenderSettings = serde_json::from_str(&text).unwrap();
        assert_eq!(de, s);
    }

    #[test]
    fn anchor_parse_falls_back() {
        assert_eq!(
            AnchorPosition::parse_or_default("top-center"),
            AnchorPosition::TopCenter
        );
        assert_eq!(
            AnchorPosition::parse_or_default("middle-ish"),
            AnchorPosition::BottomRight
        );
    }

    #[test]
    fn face_overlays_need_filter_or_dialogue() {
        let mut s = RenderSettings::default();
        assert!(!s.face_overlays_active());
        s.filter = Some("hat".to_string());
        assert!(s.face_overlays_active());

        s.filter = None;
        s.dialogue.enabled = true;
        assert!(!s.face_overlays_active()); // no bubble selected yet
        s.dialogue.bubble = Some("round".to_string());
        assert!(s.face_overlays_active());
    }
}

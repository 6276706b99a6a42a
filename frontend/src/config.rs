use crate::error::ConfigError;
use palette::Srgba;
use palette::rgb::Rgb;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_MAX_ZOOM_RATIO: f64 = 64.0;
pub const DEFAULT_MIN_SCROLLBAR_WIDTH: f64 = 17.0;
pub const DEFAULT_RULER_NUMBER_SPACING: f64 = 100.0;
pub const DEFAULT_RULER_TICKS_PER_NUMBER: u32 = 5;
pub const DEFAULT_RENDER_OVERLAP_PX: f64 = 2.0;

pub const DEFAULT_ROW_HEIGHT: f64 = 20.0;
pub const DEFAULT_CHARACTER_WIDTH: f64 = 7.69;
pub const DEFAULT_LABEL_MIN_CHARACTERS: f64 = 12.0;
pub const DEFAULT_LABEL_REPEAT_PADDING: f64 = 20.0;
pub const DEFAULT_BUBBLE_WIDTH: f64 = 3.0;

/// Viewer configuration, loaded from TOML. Every field falls back to its
/// default so partial files are accepted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ViewerConfig {
    pub viewport: ViewportSection,
    pub render: RenderSection,
    pub theme: ThemeSection,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewportSection {
    /// Upper zoom bound in pixels per time unit.
    pub max_zoom_ratio: f64,
    pub min_scrollbar_width: f64,
    /// Target pixel distance between labelled ruler numbers.
    pub ruler_number_spacing: f64,
    pub ruler_ticks_per_number: u32,
    /// Overdraw on each side of the visible window, in pixels.
    pub render_overlap_px: f64,
}

impl Default for ViewportSection {
    fn default() -> Self {
        Self {
            max_zoom_ratio: DEFAULT_MAX_ZOOM_RATIO,
            min_scrollbar_width: DEFAULT_MIN_SCROLLBAR_WIDTH,
            ruler_number_spacing: DEFAULT_RULER_NUMBER_SPACING,
            ruler_ticks_per_number: DEFAULT_RULER_TICKS_PER_NUMBER,
            render_overlap_px: DEFAULT_RENDER_OVERLAP_PX,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderSection {
    pub row_height: f64,
    /// Width of one monospace label character in pixels.
    pub character_width: f64,
    /// Bus segments narrower than this many characters get no label.
    pub label_min_characters: f64,
    pub label_repeat_padding: f64,
    pub bubble_width: f64,
    pub line_width: f64,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            row_height: DEFAULT_ROW_HEIGHT,
            character_width: DEFAULT_CHARACTER_WIDTH,
            label_min_characters: DEFAULT_LABEL_MIN_CHARACTERS,
            label_repeat_padding: DEFAULT_LABEL_REPEAT_PADDING,
            bubble_width: DEFAULT_BUBBLE_WIDTH,
            line_width: 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThemeSection {
    pub line: String,
    pub bus_fill: String,
    pub unknown: String,
    pub high_impedance: String,
    pub no_draw: String,
    pub text: String,
}

impl Default for ThemeSection {
    fn default() -> Self {
        Self {
            line: "#36c8a0".to_string(),
            bus_fill: "#2c3a96".to_string(),
            unknown: "#dc2626".to_string(),
            high_impedance: "#eab308".to_string(),
            no_draw: "#e27728".to_string(),
            text: "#fdfdfd".to_string(),
        }
    }
}

/// Resolved theme colors handed to the renderers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThemeColors {
    pub line: Srgba<u8>,
    pub bus_fill: Srgba<u8>,
    pub unknown: Srgba<u8>,
    pub high_impedance: Srgba<u8>,
    pub no_draw: Srgba<u8>,
    pub text: Srgba<u8>,
}

impl Default for ThemeColors {
    fn default() -> Self {
        ThemeSection::default()
            .resolve()
            .unwrap_or_else(|_| Self::fallback())
    }
}

impl ThemeColors {
    fn fallback() -> Self {
        let white = Srgba::new(255, 255, 255, 255);
        Self {
            line: white,
            bus_fill: white,
            unknown: white,
            high_impedance: white,
            no_draw: white,
            text: white,
        }
    }
}

impl ThemeSection {
    pub fn resolve(&self) -> Result<ThemeColors, ConfigError> {
        Ok(ThemeColors {
            line: parse_color("line", &self.line)?,
            bus_fill: parse_color("bus_fill", &self.bus_fill)?,
            unknown: parse_color("unknown", &self.unknown)?,
            high_impedance: parse_color("high_impedance", &self.high_impedance)?,
            no_draw: parse_color("no_draw", &self.no_draw)?,
            text: parse_color("text", &self.text)?,
        })
    }
}

fn parse_color(field: &'static str, value: &str) -> Result<Srgba<u8>, ConfigError> {
    let rgb: Rgb<palette::encoding::Srgb, u8> =
        Rgb::from_str(value).map_err(|_| ConfigError::InvalidColor {
            field,
            value: value.to_string(),
        })?;
    Ok(Srgba::new(rgb.red, rgb.green, rgb.blue, 255))
}

impl ViewerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        log::info!("Loaded viewer config from {}", path.display());
        Ok(config)
    }

    pub fn theme_colors(&self) -> Result<ThemeColors, ConfigError> {
        self.theme.resolve()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("viewport.max_zoom_ratio", self.viewport.max_zoom_ratio),
            ("viewport.ruler_number_spacing", self.viewport.ruler_number_spacing),
            ("render.row_height", self.render.row_height),
            ("render.character_width", self.render.character_width),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("expected a positive number, got {}", value),
                });
            }
        }
        if self.viewport.ruler_ticks_per_number == 0 {
            return Err(ConfigError::InvalidValue {
                field: "viewport.ruler_ticks_per_number",
                reason: "must be at least 1".to_string(),
            });
        }
        self.theme.resolve().map(|_| ())
    }
}

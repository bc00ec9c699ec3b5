use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// 8-bit RGBA colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    pub const BLACK: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            6 => Some(Color {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
                a: 255,
            }),
            8 => Some(Color {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
                a: channel(6)?,
            }),
            _ => None,
        }
    }

    /// Same color with an opacity in [0, 1]
    pub fn with_opacity(self, opacity: f32) -> Self {
        Color {
            a: (opacity.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }

    /// CSS `rgb()` value, or `rgba()` when translucent
    pub fn to_css_string(&self) -> String {
        if self.a == 255 {
            format!("rgb({}, {}, {})", self.r, self.g, self.b)
        } else {
            format!(
                "rgba({}, {}, {}, {:.2})",
                self.r,
                self.g,
                self.b,
                self.a as f32 / 255.0
            )
        }
    }
}

/// Outline paint. `dash_array` becomes `stroke-dasharray`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
    pub dash_array: Option<Vec<f64>>,
}

impl Stroke {
    pub fn solid(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            dash_array: None,
        }
    }

    pub fn dashed(color: Color, width: f64, dash_array: Vec<f64>) -> Self {
        Self {
            color,
            width,
            dash_array: Some(dash_array),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

/// Everything the wheel is drawn with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Shape {
    Rect {
        origin: Point,
        width: f64,
        height: f64,
        fill: Color,
    },
    Circle {
        center: Point,
        radius: f64,
        fill: Option<Color>,
        stroke: Option<Stroke>,
    },
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    Text {
        position: Point,
        content: String,
        size: f64,
        color: Color,
        anchor: TextAnchor,
        bold: bool,
    },
    /// Planet marker: a disc with the glyph on top and a hover tooltip
    PlanetGlyph {
        center: Point,
        planet_id: String,
        glyph: String,
        radius: f64,
        fill: Color,
        stroke: Stroke,
        glyph_color: Color,
        glyph_size: f64,
        tooltip: String,
        retrograde: bool,
    },
}

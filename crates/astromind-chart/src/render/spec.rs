use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::render::primitives::{Color, Shape};

/// Drawing layers, back to front
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Background,
    Rings,
    HouseCusps,
    Angles,
    Zodiac,
    Planets,
}

impl LayerKind {
    pub const ALL: [LayerKind; 6] = [
        LayerKind::Background,
        LayerKind::Rings,
        LayerKind::HouseCusps,
        LayerKind::Angles,
        LayerKind::Zodiac,
        LayerKind::Planets,
    ];

    pub fn class_name(&self) -> &'static str {
        match self {
            LayerKind::Background => "background",
            LayerKind::Rings => "rings",
            LayerKind::HouseCusps => "house-cusps",
            LayerKind::Angles => "angles",
            LayerKind::Zodiac => "zodiac",
            LayerKind::Planets => "planets",
        }
    }
}

/// One drawing layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub kind: LayerKind,
    pub shapes: Vec<Shape>,
}

/// Backend-neutral natal wheel: canvas, centre and painted layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub width: f64,
    pub height: f64,
    pub center: Point,
    pub background_color: Color,
    /// Layers in paint order; later layers occlude earlier ones
    pub layers: Vec<Layer>,
}

impl ChartSpec {
    /// Create a new chart spec with every layer present and empty
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            center: Point {
                x: width / 2.0,
                y: height / 2.0,
            },
            background_color: Color::BLACK,
            layers: LayerKind::ALL
                .iter()
                .map(|kind| Layer {
                    kind: *kind,
                    shapes: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn layer(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kind == kind)
    }

    pub fn push(&mut self, kind: LayerKind, shape: Shape) {
        match self.layers.iter_mut().find(|l| l.kind == kind) {
            Some(layer) => layer.shapes.push(shape),
            None => {
                self.layers.push(Layer {
                    kind,
                    shapes: vec![shape],
                });
                self.layers.sort_by_key(|l| l.kind);
            }
        }
    }

    /// All shapes in paint order
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.layers.iter().flat_map(|l| l.shapes.iter())
    }
}

/// Result of rendering: a chart, or the "no data" placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChartScene {
    Chart(ChartSpec),
    Placeholder {
        width: f64,
        height: f64,
        message: String,
        color: Color,
    },
}

impl ChartScene {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, ChartScene::Placeholder { .. })
    }

    pub fn spec(&self) -> Option<&ChartSpec> {
        match self {
            ChartScene::Chart(spec) => Some(spec),
            ChartScene::Placeholder { .. } => None,
        }
    }
}

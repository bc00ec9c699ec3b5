pub mod generator;
pub mod primitives;
pub mod spec;
pub mod style;
pub mod svg;

pub use generator::ChartRenderer;
pub use primitives::{Color, Shape, Stroke, TextAnchor};
pub use spec::{ChartScene, ChartSpec, Layer, LayerKind};
pub use style::ChartStyle;

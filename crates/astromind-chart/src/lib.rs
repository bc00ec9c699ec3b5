//! Chart data model, house resolution, radial chart rendering and chart
//! summaries for AstroMind reports.

pub mod error;
pub mod geometry;
pub mod houses;
pub mod locale;
pub mod model;
pub mod render;
pub mod summary;

pub use error::ChartError;
pub use geometry::{normalize_degrees, polar_to_cartesian, Point};
pub use houses::resolve_house;
pub use locale::Locale;
pub use model::{Aspect, ChartAngles, ChartResult, MonthlyResult, PlanetPosition};
pub use render::{ChartRenderer, ChartScene, ChartSpec};
pub use summary::{ChartSummary, SummaryFormatter};

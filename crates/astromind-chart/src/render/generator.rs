use crate::geometry::{normalize_degrees, polar_to_cartesian, Point};
use crate::houses::house_cusps;
use crate::locale::{planet_glyph, Locale, ZODIAC_SIGNS};
use crate::model::{ChartResult, PlanetPosition};
use crate::render::primitives::{Shape, Stroke, TextAnchor};
use crate::render::spec::{ChartScene, ChartSpec, LayerKind};
use crate::render::style::ChartStyle;

/// Radial chart renderer - converts a chart result into a ChartScene
pub struct ChartRenderer {
    style: ChartStyle,
    locale: Locale,
}

impl ChartRenderer {
    /// Create a new renderer with the default style
    pub fn new(locale: Locale) -> Self {
        Self {
            style: ChartStyle::default(),
            locale,
        }
    }

    pub fn with_style(style: ChartStyle, locale: Locale) -> Self {
        Self { style, locale }
    }

    pub fn style(&self) -> &ChartStyle {
        &self.style
    }

    /// Render a chart. Missing planets or houses yield the placeholder.
    pub fn render(&self, chart: &ChartResult) -> ChartScene {
        if chart.planets.is_none() || chart.houses.is_none() {
            log::debug!("chart without planets or houses, rendering placeholder");
            return ChartScene::Placeholder {
                width: self.style.size,
                height: self.style.size,
                message: self.locale.labels().no_data.to_string(),
                color: self.style.placeholder_color,
            };
        }

        let mut spec = ChartSpec::new(self.style.size, self.style.size);
        spec.background_color = self.style.background_color;
        let center = spec.center;

        spec.push(
            LayerKind::Background,
            Shape::Rect {
                origin: Point { x: 0.0, y: 0.0 },
                width: self.style.size,
                height: self.style.size,
                fill: self.style.background_color,
            },
        );
        for shape in self.ring_shapes(center) {
            spec.push(LayerKind::Rings, shape);
        }
        for shape in self.house_shapes(chart, center) {
            spec.push(LayerKind::HouseCusps, shape);
        }
        for shape in self.angle_shapes(chart, center) {
            spec.push(LayerKind::Angles, shape);
        }
        for shape in self.zodiac_shapes(center) {
            spec.push(LayerKind::Zodiac, shape);
        }
        for shape in self.planet_shapes(chart, center) {
            spec.push(LayerKind::Planets, shape);
        }

        ChartScene::Chart(spec)
    }

    /// Fixed guide rings: zodiac boundary, house boundary, centre marker
    fn ring_shapes(&self, center: Point) -> Vec<Shape> {
        let s = &self.style;
        vec![
            Shape::Circle {
                center,
                radius: s.outer_radius,
                fill: None,
                stroke: Some(Stroke::solid(s.ring_color, s.outer_ring_width)),
            },
            Shape::Circle {
                center,
                radius: s.inner_radius,
                fill: None,
                stroke: Some(Stroke::solid(
                    s.ring_color.with_opacity(s.inner_ring_opacity),
                    s.inner_ring_width,
                )),
            },
            Shape::Circle {
                center,
                radius: s.center_radius,
                fill: Some(s.center_color),
                stroke: None,
            },
        ]
    }

    fn house_shapes(&self, chart: &ChartResult, center: Point) -> Vec<Shape> {
        let s = &self.style;
        let Some(houses) = &chart.houses else {
            return Vec::new();
        };

        house_cusps(houses)
            .into_iter()
            .map(|(_, cusp)| Shape::Line {
                from: center,
                to: polar_to_cartesian(center.x, center.y, s.outer_radius, cusp),
                stroke: Stroke::solid(s.cusp_color.with_opacity(s.cusp_opacity), s.cusp_width),
            })
            .collect()
    }

    fn angle_shapes(&self, chart: &ChartResult, center: Point) -> Vec<Shape> {
        let s = &self.style;
        let mut shapes = Vec::new();

        let angles = [
            (chart.ascendant(), "ASC", s.ascendant_color),
            (chart.midheaven(), "MC", s.midheaven_color),
        ];
        for (lon, label, color) in angles {
            let Some(lon) = lon else {
                continue;
            };
            let lon = normalize_degrees(lon);
            shapes.push(Shape::Line {
                from: center,
                to: polar_to_cartesian(center.x, center.y, s.outer_radius, lon),
                stroke: Stroke::dashed(color, s.angle_width, s.angle_dash.clone()),
            });
            shapes.push(Shape::Text {
                position: polar_to_cartesian(center.x, center.y, s.angle_label_radius(), lon),
                content: label.to_string(),
                size: s.angle_label_size,
                color,
                anchor: TextAnchor::Middle,
                bold: true,
            });
        }

        shapes
    }

    /// Static decoration: one glyph per sign, at the sign's starting degree
    fn zodiac_shapes(&self, center: Point) -> Vec<Shape> {
        let s = &self.style;
        ZODIAC_SIGNS
            .iter()
            .enumerate()
            .map(|(i, (_, glyph))| Shape::Text {
                position: polar_to_cartesian(
                    center.x,
                    center.y,
                    s.zodiac_radius(),
                    i as f64 * 30.0,
                ),
                content: glyph.to_string(),
                size: s.sign_glyph_size,
                color: s.sign_color,
                anchor: TextAnchor::Middle,
                bold: true,
            })
            .collect()
    }

    fn planet_shapes(&self, chart: &ChartResult, center: Point) -> Vec<Shape> {
        let s = &self.style;
        chart
            .planets_in_order()
            .into_iter()
            .filter_map(|(id, planet)| {
                let lon = normalize_degrees(planet.longitude?);
                Some(Shape::PlanetGlyph {
                    center: polar_to_cartesian(center.x, center.y, s.planet_radius(), lon),
                    planet_id: id.to_string(),
                    glyph: planet_glyph(id).to_string(),
                    radius: s.planet_marker_radius,
                    fill: s.planet_fill,
                    stroke: Stroke::solid(s.planet_stroke, s.planet_stroke_width),
                    glyph_color: s.planet_glyph_color,
                    glyph_size: s.planet_glyph_size,
                    tooltip: self.tooltip(id, planet, lon),
                    retrograde: planet.is_retrograde(),
                })
            })
            .collect()
    }

    /// "Name: 123.45° (speed: +1.02°/day)"
    pub fn tooltip(&self, id: &str, planet: &PlanetPosition, lon: f64) -> String {
        let labels = self.locale.labels();
        let speed = match planet.speed {
            Some(speed) => format!("{:+.2}°/{}", speed, labels.per_day_word),
            None => labels.unavailable.to_string(),
        };
        format!(
            "{}: {:.2}° ({}: {})",
            self.locale.planet_name(id),
            lon,
            labels.speed_word,
            speed
        )
    }
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(Locale::default())
    }
}

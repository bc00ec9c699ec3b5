//! SVG serializer for chart scenes.
//!
//! Every layer becomes a `<g>` element with a class named after the layer,
//! so paint order in the document matches the layer order of the `ChartSpec`.

use ::svg::node::element::{Circle, Group, Line, Rectangle, Text, Title};
use ::svg::Document;

use crate::render::primitives::{Color, Shape, Stroke, TextAnchor};
use crate::render::spec::{ChartScene, ChartSpec};

const FONT_FAMILY: &str = "sans-serif";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Round to two decimals; negative zero becomes zero.
fn num(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn paint(color: &Color) -> String {
    color.to_css_string()
}

fn dash_pattern(dash: &[f64]) -> String {
    dash.iter()
        .map(|d| num(*d).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Planet ids come from the backend; only keep characters safe in an attribute.
fn attr_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .collect()
}

fn anchor_attr(anchor: TextAnchor) -> &'static str {
    match anchor {
        TextAnchor::Start => "start",
        TextAnchor::Middle => "middle",
        TextAnchor::End => "end",
    }
}

fn stroked_circle(circle: Circle, stroke: &Stroke) -> Circle {
    let circle = circle
        .set("stroke", paint(&stroke.color))
        .set("stroke-width", num(stroke.width));
    match &stroke.dash_array {
        Some(dash) => circle.set("stroke-dasharray", dash_pattern(dash)),
        None => circle,
    }
}

fn stroked_line(line: Line, stroke: &Stroke) -> Line {
    let line = line
        .set("stroke", paint(&stroke.color))
        .set("stroke-width", num(stroke.width));
    match &stroke.dash_array {
        Some(dash) => line.set("stroke-dasharray", dash_pattern(dash)),
        None => line,
    }
}

fn add_shape(group: Group, shape: &Shape) -> Group {
    match shape {
        Shape::Rect {
            origin,
            width,
            height,
            fill,
        } => group.add(
            Rectangle::new()
                .set("x", num(origin.x))
                .set("y", num(origin.y))
                .set("width", num(*width))
                .set("height", num(*height))
                .set("fill", paint(fill)),
        ),
        Shape::Circle {
            center,
            radius,
            fill,
            stroke,
        } => {
            let circle = Circle::new()
                .set("cx", num(center.x))
                .set("cy", num(center.y))
                .set("r", num(*radius))
                .set("fill", fill.map(|c| paint(&c)).unwrap_or_else(|| "none".to_string()));
            match stroke {
                Some(stroke) => group.add(stroked_circle(circle, stroke)),
                None => group.add(circle),
            }
        }
        Shape::Line { from, to, stroke } => group.add(stroked_line(
            Line::new()
                .set("x1", num(from.x))
                .set("y1", num(from.y))
                .set("x2", num(to.x))
                .set("y2", num(to.y)),
            stroke,
        )),
        Shape::Text {
            position,
            content,
            size,
            color,
            anchor,
            bold,
        } => group.add(
            Text::new(content.as_str())
                .set("x", num(position.x))
                .set("y", num(position.y))
                .set("font-family", FONT_FAMILY)
                .set("font-size", num(*size))
                .set("font-weight", if *bold { "bold" } else { "normal" })
                .set("fill", paint(color))
                .set("text-anchor", anchor_attr(*anchor))
                .set("dominant-baseline", "middle"),
        ),
        Shape::PlanetGlyph {
            center,
            planet_id,
            glyph,
            radius,
            fill,
            stroke,
            glyph_color,
            glyph_size,
            tooltip,
            retrograde,
        } => {
            let class = if *retrograde {
                "planet retrograde"
            } else {
                "planet"
            };
            let marker = Circle::new()
                .set("cx", num(center.x))
                .set("cy", num(center.y))
                .set("r", num(*radius))
                .set("fill", paint(fill));
            let symbol = Text::new(glyph.as_str())
                .set("x", num(center.x))
                .set("y", num(center.y))
                .set("font-family", FONT_FAMILY)
                .set("font-size", num(*glyph_size))
                .set("fill", paint(glyph_color))
                .set("text-anchor", "middle")
                .set("dominant-baseline", "middle");
            group.add(
                Group::new()
                    .set("class", class)
                    .set("data-planet", attr_token(planet_id))
                    .add(Title::new(tooltip.as_str()))
                    .add(stroked_circle(marker, stroke))
                    .add(symbol),
            )
        }
    }
}

fn document(width: f64, height: f64) -> Document {
    Document::new()
        .set("xmlns", "http://www.w3.org/2000/svg")
        .set("width", num(width))
        .set("height", num(height))
        .set("viewBox", format!("0 0 {} {}", num(width), num(height)))
}

fn finish(document: Document) -> String {
    format!("{}\n{}\n", XML_DECLARATION, document)
}

impl ChartSpec {
    /// Serialize the chart into a standalone SVG document.
    pub fn to_svg(&self) -> String {
        let mut doc = document(self.width, self.height);
        for layer in &self.layers {
            let group = layer
                .shapes
                .iter()
                .fold(Group::new().set("class", layer.kind.class_name()), add_shape);
            doc = doc.add(group);
        }
        finish(doc)
    }
}

impl ChartScene {
    /// SVG for either state; the placeholder is a single centred message.
    pub fn to_svg(&self) -> String {
        match self {
            ChartScene::Chart(spec) => spec.to_svg(),
            ChartScene::Placeholder {
                width,
                height,
                message,
                color,
            } => {
                let text = Text::new(message.as_str())
                    .set("class", "placeholder")
                    .set("x", num(width / 2.0))
                    .set("y", num(height / 2.0))
                    .set("font-family", FONT_FAMILY)
                    .set("font-size", 16)
                    .set("fill", paint(color))
                    .set("text-anchor", "middle")
                    .set("dominant-baseline", "middle");
                finish(document(*width, *height).add(text))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::render::spec::LayerKind;

    #[test]
    fn test_num() {
        assert_eq!(num(840.0).to_string(), "840");
        assert_eq!(num(293.456).to_string(), "293.46");
        assert_eq!(num(-0.001).to_string(), "0");
    }

    #[test]
    fn test_attr_token_drops_markup() {
        assert_eq!(attr_token("Sun"), "Sun");
        assert_eq!(attr_token("a\"><x"), "ax");
    }

    #[test]
    fn test_layers_are_emitted_in_order() {
        let mut spec = ChartSpec::new(100.0, 100.0);
        spec.push(
            LayerKind::Planets,
            Shape::Circle {
                center: Point { x: 1.0, y: 2.0 },
                radius: 3.0,
                fill: None,
                stroke: None,
            },
        );
        let svg = spec.to_svg();
        assert!(svg.starts_with(XML_DECLARATION));
        let rings = svg.find(r#"class="rings""#).unwrap();
        let planets = svg.find(r#"class="planets""#).unwrap();
        assert!(rings < planets);
        assert!(svg.contains(r#"viewBox="0 0 100 100""#));
        for attr in [r#"cx="1""#, r#"cy="2""#, r#"r="3""#, r#"fill="none""#] {
            assert!(svg.contains(attr), "missing {}", attr);
        }
        assert!(!svg.contains("stroke="));
    }

    #[test]
    fn test_dashed_stroke() {
        let stroke = Stroke::dashed(Color::WHITE, 3.0, vec![7.0, 7.0]);
        let line = stroked_line(Line::new(), &stroke).to_string();
        assert!(line.contains(r#"stroke="rgb(255, 255, 255)""#));
        assert!(line.contains(r#"stroke-width="3""#));
        assert!(line.contains(r#"stroke-dasharray="7,7""#));
    }

    #[test]
    fn test_placeholder_svg() {
        let scene = ChartScene::Placeholder {
            width: 840.0,
            height: 840.0,
            message: "No data".to_string(),
            color: Color::WHITE,
        };
        let svg = scene.to_svg();
        assert!(svg.contains(r#"class="placeholder""#));
        assert!(svg.contains("No data"));
        assert!(!svg.contains("<circle"));
    }
}

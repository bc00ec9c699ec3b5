//! Grouped textual chart summary: positions, houses, aspects.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::geometry::normalize_degrees;
use crate::houses::{house_cusps, resolve_house_from_cusps};
use crate::locale::Locale;
use crate::model::{Aspect, ChartResult};

/// Identifier used for the Ascendant row of the positions section
pub const ASCENDANT_ID: &str = "Ascendant";

/// One row of the positions section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionLine {
    pub planet_id: String,
    pub planet_name: String,
    /// Pre-formatted position with sign names localized
    pub position: String,
}

/// Planets occupying one house, as display names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseGroup {
    pub house: u8,
    pub planets: Vec<String>,
}

impl HouseGroup {
    pub fn is_empty(&self) -> bool {
        self.planets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectLine {
    pub planet1: String,
    pub planet2: String,
    pub aspect: String,
    /// Rounded to two decimals
    pub orb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSummary {
    pub positions: Vec<PositionLine>,
    pub houses: Vec<HouseGroup>,
    /// `None` when no aspects were supplied or the list was empty
    pub aspects: Option<Vec<AspectLine>>,
}

impl ChartSummary {
    pub fn house(&self, house: u8) -> Option<&HouseGroup> {
        self.houses.iter().find(|g| g.house == house)
    }

    /// Plain-text rendering of the three numbered sections.
    pub fn to_text(&self, locale: &Locale) -> String {
        let labels = locale.labels();
        let mut out = String::new();

        let _ = writeln!(out, "{}", labels.summary_title);
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", labels.positions_heading);
        for line in &self.positions {
            let _ = writeln!(out, "{}: {}", line.planet_name, line.position);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{}", labels.houses_heading);
        for group in &self.houses {
            let planets = if group.is_empty() {
                labels.empty_house.to_string()
            } else {
                group.planets.join(", ")
            };
            let _ = writeln!(out, "{}: {}", locale.house_label(group.house), planets);
        }

        if let Some(aspects) = &self.aspects {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", labels.aspects_heading);
            for line in aspects {
                let _ = write!(out, "{} – {} {}", line.planet1, line.planet2, line.aspect);
                if let Some(orb) = line.orb {
                    let _ = write!(out, " ({}: {:.2}°)", labels.orb_word, orb);
                }
                let _ = writeln!(out);
            }
        }

        out
    }
}

/// Format a raw angle as degrees and minutes, e.g. `75°30'`.
pub fn format_angle(angle: f64) -> String {
    let angle = normalize_degrees(angle);
    let degrees = angle.floor();
    let minutes = ((angle - degrees) * 60.0).floor() as u32;
    format!("{}°{:02}'", degrees as u32, minutes)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Builds [`ChartSummary`] values in one locale.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryFormatter {
    locale: Locale,
}

impl SummaryFormatter {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Summarize a chart. Returns `None` when planets or houses are absent.
    pub fn summarize(&self, chart: &ChartResult, aspects: Option<&[Aspect]>) -> Option<ChartSummary> {
        if chart.planets.is_none() || chart.houses.is_none() {
            return None;
        }

        Some(ChartSummary {
            positions: self.positions(chart),
            houses: self.houses(chart),
            aspects: aspects
                .filter(|list| !list.is_empty())
                .map(|list| list.iter().map(|a| self.aspect_line(a)).collect()),
        })
    }

    fn positions(&self, chart: &ChartResult) -> Vec<PositionLine> {
        let mut lines: Vec<PositionLine> = chart
            .planets_in_order()
            .into_iter()
            .filter(|(_, planet)| planet.longitude.is_some())
            .filter_map(|(id, planet)| {
                let formatted = planet.formatted_pos.as_deref()?;
                Some(PositionLine {
                    planet_id: id.to_string(),
                    planet_name: self.locale.planet_name(id).into_owned(),
                    position: self.locale.translate_signs(formatted),
                })
            })
            .collect();

        if let Some(asc) = chart.ascendant() {
            let formatted = chart
                .angles
                .as_ref()
                .and_then(|a| a.ascendant_formatted.clone())
                .unwrap_or_else(|| format_angle(asc));
            lines.push(PositionLine {
                planet_id: ASCENDANT_ID.to_string(),
                planet_name: self.locale.labels().ascendant.to_string(),
                position: self.locale.translate_signs(&formatted),
            });
        }

        lines
    }

    fn houses(&self, chart: &ChartResult) -> Vec<HouseGroup> {
        let cusps = chart.houses.as_ref().map(house_cusps).unwrap_or_default();
        let mut groups: Vec<HouseGroup> = (1..=12u8)
            .map(|house| HouseGroup {
                house,
                planets: Vec::new(),
            })
            .collect();

        for (id, planet) in chart.planets_in_order() {
            let Some(lon) = planet.longitude else {
                continue;
            };
            let house = match planet.house {
                Some(h @ 1..=12) => h,
                _ => resolve_house_from_cusps(lon, &cusps),
            };
            groups[(house - 1) as usize]
                .planets
                .push(self.locale.planet_name(id).into_owned());
        }

        // Houses 1 and 10 carry the Ascendant and Midheaven, so they stay
        // listed even when empty.
        groups.retain(|g| !g.is_empty() || g.house == 1 || g.house == 10);
        groups
    }

    fn aspect_line(&self, aspect: &Aspect) -> AspectLine {
        AspectLine {
            planet1: self.locale.planet_name(&aspect.planet1).into_owned(),
            planet2: self.locale.planet_name(&aspect.planet2).into_owned(),
            aspect: self.locale.aspect_name(&aspect.aspect).into_owned(),
            orb: aspect.orb.map(round2),
        }
    }
}

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ChartError;

/// Canonical planet order used whenever planets are listed.
pub const PLANET_ORDER: &[&str] = &[
    "Sun", "Moon", "Mercury", "Venus", "Mars", "Jupiter", "Saturn", "Uranus", "Neptune", "Pluto",
    "Node", "Chiron",
];

/// Planetary position data as delivered by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanetPosition {
    /// Longitude in degrees (0-360); `None` means the body is not drawn
    #[serde(default, deserialize_with = "lenient_degrees")]
    pub longitude: Option<f64>,
    /// Speed in longitude (degrees per day)
    #[serde(default, deserialize_with = "lenient_degrees")]
    pub speed: Option<f64>,
    /// House number (1-12) if the backend already assigned one
    #[serde(default, deserialize_with = "lenient_house")]
    pub house: Option<u8>,
    /// Pre-formatted position such as "23°02' Aries"
    #[serde(default)]
    pub formatted_pos: Option<String>,
}

impl PlanetPosition {
    pub fn at(longitude: f64) -> Self {
        Self {
            longitude: Some(longitude),
            ..Self::default()
        }
    }

    /// Retrograde only when the speed is known and negative.
    pub fn is_retrograde(&self) -> bool {
        self.speed.map(|s| s < 0.0).unwrap_or(false)
    }
}

/// Chart angles. Extra keys sent by the backend are preserved untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartAngles {
    #[serde(rename = "Ascendant", default, deserialize_with = "lenient_degrees")]
    pub ascendant: Option<f64>,
    #[serde(rename = "MC", default, deserialize_with = "lenient_degrees")]
    pub mc: Option<f64>,
    #[serde(rename = "Ascendant_formatted", default, skip_serializing_if = "Option::is_none")]
    pub ascendant_formatted: Option<String>,
    #[serde(rename = "MC_formatted", default, skip_serializing_if = "Option::is_none")]
    pub mc_formatted: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Snapshot of a computed chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartResult {
    #[serde(default, deserialize_with = "lenient_planets")]
    pub planets: Option<BTreeMap<String, PlanetPosition>>,
    /// House label ("House1".."House12") -> cusp longitude
    #[serde(default, deserialize_with = "lenient_cusps")]
    pub houses: Option<BTreeMap<String, Option<f64>>>,
    #[serde(default, deserialize_with = "lenient_angles")]
    pub angles: Option<ChartAngles>,
}

// Malformed values degrade to "absent" instead of rejecting the chart.

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn lenient_degrees<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = number(&value);
    if parsed.is_none() && !value.is_null() {
        log::warn!("ignoring non-numeric degree value {}", value);
    }
    Ok(parsed)
}

fn lenient_house<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let house = number(&value)
        .filter(|h| h.fract() == 0.0 && (1.0..=12.0).contains(h))
        .map(|h| h as u8);
    if house.is_none() && !value.is_null() {
        log::warn!("ignoring invalid house {}, it will be resolved from cusps", value);
    }
    Ok(house)
}

fn lenient_cusps<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, Option<f64>>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => Some(
            map.into_iter()
                .map(|(label, cusp)| {
                    let parsed = number(&cusp);
                    if parsed.is_none() && !cusp.is_null() {
                        log::warn!("skipping malformed cusp {}: {}", label, cusp);
                    }
                    (label, parsed)
                })
                .collect(),
        ),
        Value::Null => None,
        other => {
            log::warn!("houses is not an object: {}", other);
            None
        }
    })
}

fn lenient_planets<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, PlanetPosition>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => Some(
            map.into_iter()
                .filter_map(|(id, raw)| match PlanetPosition::deserialize(raw) {
                    Ok(planet) => Some((id, planet)),
                    Err(e) => {
                        log::warn!("skipping malformed planet {}: {}", id, e);
                        None
                    }
                })
                .collect(),
        ),
        Value::Null => None,
        other => {
            log::warn!("planets is not an object: {}", other);
            None
        }
    })
}

fn lenient_angles<'de, D>(deserializer: D) -> Result<Option<ChartAngles>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        raw => match ChartAngles::deserialize(raw) {
            Ok(angles) => Some(angles),
            Err(e) => {
                log::warn!("ignoring malformed angles: {}", e);
                None
            }
        },
    })
}

impl ChartResult {
    pub fn from_json(json: &str) -> Result<Self, ChartError> {
        serde_json::from_str(json).map_err(|e| ChartError::InvalidJson(e.to_string()))
    }

    /// Planets in canonical order, unknown identifiers afterwards in key order.
    pub fn planets_in_order(&self) -> Vec<(&str, &PlanetPosition)> {
        let Some(planets) = &self.planets else {
            return Vec::new();
        };

        let mut ordered: Vec<(&str, &PlanetPosition)> = PLANET_ORDER
            .iter()
            .filter_map(|id| planets.get_key_value(*id))
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        ordered.extend(
            planets
                .iter()
                .filter(|(k, _)| !PLANET_ORDER.contains(&k.as_str()))
                .map(|(k, v)| (k.as_str(), v)),
        );
        ordered
    }

    pub fn ascendant(&self) -> Option<f64> {
        self.angles.as_ref().and_then(|a| a.ascendant)
    }

    pub fn midheaven(&self) -> Option<f64> {
        self.angles.as_ref().and_then(|a| a.mc)
    }
}

/// Aspect between two planets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aspect {
    pub planet1: String,
    pub planet2: String,
    /// "conjunction", "sextile", "square", "trine" or "opposition"
    pub aspect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orb: Option<f64>,
}

/// One completed period of a multi-month forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyResult {
    pub month: String,
    pub text: String,
}

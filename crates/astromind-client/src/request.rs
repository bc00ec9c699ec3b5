//! Birth-data form state and its validation into an interpret request.

use astromind_chart::Locale;
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Report flavour requested from the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[default]
    General,
    Health,
    Career,
    Money,
    Love,
    Karmic,
}

impl ReportType {
    pub const ALL: [ReportType; 6] = [
        ReportType::General,
        ReportType::Health,
        ReportType::Career,
        ReportType::Money,
        ReportType::Love,
        ReportType::Karmic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::General => "general",
            ReportType::Health => "health",
            ReportType::Career => "career",
            ReportType::Money => "money",
            ReportType::Love => "love",
            ReportType::Karmic => "karmic",
        }
    }

    /// Display label, also used as the report type on exported documents.
    pub fn label(&self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::Bg, ReportType::General) => "Общ Анализ",
            (Locale::Bg, ReportType::Health) => "ЗДРАВЕ",
            (Locale::Bg, ReportType::Career) => "Кариера",
            (Locale::Bg, ReportType::Money) => "Пари и Успех",
            (Locale::Bg, ReportType::Love) => "Любов",
            (Locale::Bg, ReportType::Karmic) => "КАРМА И РОД",
            (Locale::En, ReportType::General) => "General Analysis",
            (Locale::En, ReportType::Health) => "HEALTH",
            (Locale::En, ReportType::Career) => "Career",
            (Locale::En, ReportType::Money) => "Money and Success",
            (Locale::En, ReportType::Love) => "Love",
            (Locale::En, ReportType::Karmic) => "KARMA AND LINEAGE",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown report type: {}", s))
    }
}

/// Input validation failures, caught before any network call
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Моля попълнете всички задължителни полета")]
    MissingRequired,
    #[error("Географската ширина трябва да е между -90 и 90")]
    LatitudeOutOfRange,
    #[error("Географската дължина трябва да е между -180 и 180")]
    LongitudeOutOfRange,
}

impl ValidationError {
    pub fn message(&self, locale: Locale) -> String {
        match locale {
            Locale::Bg => self.to_string(),
            Locale::En => match self {
                ValidationError::MissingRequired => "Please fill in all required fields",
                ValidationError::LatitudeOutOfRange => "Latitude must be between -90 and 90",
                ValidationError::LongitudeOutOfRange => "Longitude must be between -180 and 180",
            }
            .to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitData {
    #[serde(default)]
    pub target_date: String,
    #[serde(default)]
    pub target_time: String,
}

/// Partner fields exactly as typed; coordinates stay text until validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartnerData {
    #[serde(default)]
    pub partner_name: String,
    #[serde(default)]
    pub partner_date: String,
    #[serde(default)]
    pub partner_time: String,
    #[serde(default)]
    pub partner_lat: String,
    #[serde(default)]
    pub partner_lon: String,
}

impl PartnerData {
    fn is_complete(&self) -> bool {
        [
            &self.partner_date,
            &self.partner_time,
            &self.partner_lat,
            &self.partner_lon,
        ]
        .iter()
        .all(|v| !v.trim().is_empty())
    }
}

/// Raw form state for one report submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BirthForm {
    pub name: String,
    pub date: String,
    pub time: String,
    pub lat: String,
    pub lon: String,
    pub question: String,
    pub report_type: ReportType,
    pub enable_transit: bool,
    pub transit: TransitData,
    /// Multi-month forecast over `transit.target_date..end_date`
    pub is_dynamic: bool,
    pub end_date: String,
    pub enable_partner: bool,
    pub partner: PartnerData,
}

/// Body of `POST /interpret` and `POST /interpret-stream`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub date: String,
    pub time: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    pub report_type: ReportType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dynamic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_lon: Option<f64>,
}

impl InterpretRequest {
    /// Minimal request for a chart without options.
    pub fn new(date: &str, time: &str, lat: f64, lon: f64) -> Self {
        Self {
            name: None,
            date: date.to_string(),
            time: time.to_string(),
            lat,
            lon,
            question: None,
            report_type: ReportType::default(),
            is_dynamic: None,
            target_date: None,
            target_time: None,
            end_date: None,
            partner_name: None,
            partner_date: None,
            partner_time: None,
            partner_lat: None,
            partner_lon: None,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_coordinate(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl BirthForm {
    /// Validate against the current local time.
    pub fn validate(&self) -> Result<InterpretRequest, ValidationError> {
        self.validate_at(chrono::Local::now().naive_local())
    }

    /// Validate the form. `now` fills in transit defaults.
    pub fn validate_at(&self, now: NaiveDateTime) -> Result<InterpretRequest, ValidationError> {
        if [&self.date, &self.time, &self.lat, &self.lon]
            .iter()
            .any(|v| v.trim().is_empty())
        {
            return Err(ValidationError::MissingRequired);
        }

        let lat = parse_coordinate(&self.lat)
            .filter(|v| (-90.0..=90.0).contains(v))
            .ok_or(ValidationError::LatitudeOutOfRange)?;
        let lon = parse_coordinate(&self.lon)
            .filter(|v| (-180.0..=180.0).contains(v))
            .ok_or(ValidationError::LongitudeOutOfRange)?;

        let mut request = InterpretRequest::new(self.date.trim(), self.time.trim(), lat, lon);
        request.name = non_empty(&self.name);
        request.question = non_empty(&self.question);
        request.report_type = self.report_type;

        if self.is_dynamic {
            request.is_dynamic = Some(true);
            request.target_date = Some(
                non_empty(&self.transit.target_date)
                    .unwrap_or_else(|| format!("{}-01-01", now.year())),
            );
            request.end_date = non_empty(&self.end_date);
        } else if self.enable_transit {
            request.target_date = Some(
                non_empty(&self.transit.target_date)
                    .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
            );
            request.target_time = Some(
                non_empty(&self.transit.target_time)
                    .unwrap_or_else(|| now.format("%H:%M").to_string()),
            );
        }

        // Partner data is only sent when complete and numeric
        if self.enable_partner && self.partner.is_complete() {
            let partner_lat = parse_coordinate(&self.partner.partner_lat);
            let partner_lon = parse_coordinate(&self.partner.partner_lon);
            if let (Some(p_lat), Some(p_lon)) = (partner_lat, partner_lon) {
                request.partner_name = non_empty(&self.partner.partner_name);
                request.partner_date = Some(self.partner.partner_date.trim().to_string());
                request.partner_time = Some(self.partner.partner_time.trim().to_string());
                request.partner_lat = Some(p_lat);
                request.partner_lon = Some(p_lon);
            } else {
                log::debug!("partner coordinates are not numeric, partner data skipped");
            }
        }

        Ok(request)
    }
}

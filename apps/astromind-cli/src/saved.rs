//! Interpretation results kept on disk between `interpret` and `export`.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use astromind_chart::MonthlyResult;
use astromind_client::{ForecastAccumulator, InterpretResponse};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedReport {
    #[serde(flatten)]
    pub response: InterpretResponse,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monthly_results: Vec<MonthlyResult>,
}

impl SavedReport {
    pub fn from_response(response: InterpretResponse) -> Self {
        Self {
            response,
            monthly_results: Vec::new(),
        }
    }

    pub fn from_forecast(forecast: &ForecastAccumulator) -> Self {
        let interpretation = Some(forecast.render_interpretation()).filter(|t| !t.is_empty());
        Self {
            response: InterpretResponse {
                natal_chart: forecast.natal_chart.clone(),
                natal_aspects: forecast.natal_aspects.clone(),
                partner_chart: forecast.partner_chart.clone(),
                partner_natal_aspects: forecast.partner_natal_aspects.clone(),
                transit_chart: forecast.transit_chart.clone(),
                interpretation,
            },
            monthly_results: forecast.months().to_vec(),
        }
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid response JSON in {}", path.display()))
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Could not write {}", path.display()))
    }
}

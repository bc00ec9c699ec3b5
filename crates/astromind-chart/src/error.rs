use thiserror::Error;

/// Errors that can occur when reading chart data
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}

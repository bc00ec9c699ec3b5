use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `[api] base_url`
pub const API_URL_ENV: &str = "ASTROMIND_API_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    pub base_url: String,
    pub interpret_timeout: Duration,
    pub session_timeout: Duration,
    pub document_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    /// Directory holding the session and profile files
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    /// Locale tag such as "bg" or "en"
    pub locale: String,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AstromindSettings {
    pub api: ApiSettings,
    pub storage: StorageSettings,
    pub report: ReportSettings,
}

impl Default for AstromindSettings {
    fn default() -> Self {
        // An empty document yields every default
        RootConfigToml::default().into_settings()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiToml {
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_interpret_timeout")]
    interpret_timeout_secs: u64,
    #[serde(default = "default_session_timeout")]
    session_timeout_secs: u64,
    #[serde(default = "default_document_timeout")]
    document_timeout_secs: u64,
}

impl Default for ApiToml {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            interpret_timeout_secs: default_interpret_timeout(),
            session_timeout_secs: default_session_timeout(),
            document_timeout_secs: default_document_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StorageToml {
    #[serde(default)]
    data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReportToml {
    #[serde(default = "default_locale")]
    locale: String,
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
}

impl Default for ReportToml {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RootConfigToml {
    #[serde(default)]
    api: ApiToml,
    #[serde(default)]
    storage: StorageToml,
    #[serde(default)]
    report: ReportToml,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_interpret_timeout() -> u64 {
    90
}

fn default_session_timeout() -> u64 {
    15
}

fn default_document_timeout() -> u64 {
    120
}

fn default_locale() -> String {
    "bg".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("astromind"))
        .unwrap_or_else(|| PathBuf::from(".astromind"))
}

impl RootConfigToml {
    fn into_settings(self) -> AstromindSettings {
        AstromindSettings {
            api: ApiSettings {
                base_url: self.api.base_url.trim_end_matches('/').to_string(),
                interpret_timeout: Duration::from_secs(self.api.interpret_timeout_secs),
                session_timeout: Duration::from_secs(self.api.session_timeout_secs),
                document_timeout: Duration::from_secs(self.api.document_timeout_secs),
            },
            storage: StorageSettings {
                data_dir: self.storage.data_dir.unwrap_or_else(default_data_dir),
            },
            report: ReportSettings {
                locale: self.report.locale,
                output_dir: self.report.output_dir,
            },
        }
    }
}

/// Try the common relative paths for `configs/astromind.toml`.
///
/// Returns `Ok(None)` when no candidate exists.
pub fn read_config_text() -> anyhow::Result<Option<(PathBuf, String)>> {
    let paths = ["configs/astromind.toml", "../../configs/astromind.toml"];
    for p in &paths {
        if let Ok(c) = fs::read_to_string(p) {
            return Ok(Some((PathBuf::from(p), c)));
        }
    }
    log::debug!("no astromind.toml found in {:?}, using defaults", paths);
    Ok(None)
}

/// Parse settings from TOML text. Missing sections and keys use defaults.
pub fn parse_settings(text: &str) -> anyhow::Result<AstromindSettings> {
    let root: RootConfigToml = toml::from_str(text)
        .map_err(|e| anyhow::anyhow!("Failed to parse astromind.toml: {e}"))?;
    if root.api.base_url.trim().is_empty() {
        anyhow::bail!("api.base_url must not be empty");
    }
    let timeouts = [
        ("interpret_timeout_secs", root.api.interpret_timeout_secs),
        ("session_timeout_secs", root.api.session_timeout_secs),
        ("document_timeout_secs", root.api.document_timeout_secs),
    ];
    for (key, secs) in timeouts {
        if secs == 0 {
            anyhow::bail!("api.{key} must be at least 1");
        }
    }
    Ok(root.into_settings())
}

impl AstromindSettings {
    /// Apply an `ASTROMIND_API_URL` value, ignoring blank values.
    pub fn with_api_url_override(mut self, value: Option<String>) -> Self {
        if let Some(url) = value.filter(|v| !v.trim().is_empty()) {
            log::info!("Using API URL from {}: {}", API_URL_ENV, url);
            self.api.base_url = url.trim().trim_end_matches('/').to_string();
        }
        self
    }
}

/// Load settings from an explicit file, or from the default locations.
///
/// An explicit path that cannot be read is an error; a missing default file
/// is not. The `ASTROMIND_API_URL` environment variable is applied last.
pub fn load_settings(explicit: Option<&Path>) -> anyhow::Result<AstromindSettings> {
    let settings = match explicit {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| {
                anyhow::anyhow!("Could not read config {}: {e}", path.display())
            })?;
            parse_settings(&text)?
        }
        None => match read_config_text()? {
            Some((path, text)) => {
                log::debug!("loading settings from {}", path.display());
                parse_settings(&text)?
            }
            None => AstromindSettings::default(),
        },
    };
    Ok(settings.with_api_url_override(std::env::var(API_URL_ENV).ok()))
}

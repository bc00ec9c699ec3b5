//! Report export: the backend renders the document, this side saves it.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use astromind_chart::{Aspect, ChartResult, Locale, MonthlyResult};

use crate::api::{ApiError, ReportBackend};
use crate::session::{SessionService, ENTRY_ROUTE};

pub const DEFAULT_FILE_NAME: &str = "Astrology_Report.pdf";
const DOCUMENT_EXTENSION: &str = ".docx";

/// Cover data printed on the report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportMetadata {
    pub user_name: String,
    pub birth_date: String,
    pub birth_time: String,
    pub birth_city: String,
    pub report_type: String,
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub metadata: ReportMetadata,
    pub chart: ChartResult,
    pub aspects: Option<Vec<Aspect>>,
    pub monthly_results: Vec<MonthlyResult>,
    pub static_interpretation: Option<String>,
    pub file_name: String,
}

impl ReportRequest {
    pub fn new(metadata: ReportMetadata, chart: ChartResult) -> Self {
        Self {
            metadata,
            chart,
            aspects: None,
            monthly_results: Vec::new(),
            static_interpretation: None,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    pub fn with_aspects(mut self, aspects: Vec<Aspect>) -> Self {
        self.aspects = Some(aspects);
        self
    }

    pub fn with_monthly_results(mut self, months: Vec<MonthlyResult>) -> Self {
        self.monthly_results = months;
        self
    }

    pub fn with_static_interpretation(mut self, text: impl Into<String>) -> Self {
        self.static_interpretation = Some(text.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }
}

/// Body of `POST /generate-docx`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentPayload {
    pub user_name: String,
    pub birth_date: String,
    pub birth_time: String,
    pub birth_city: String,
    pub report_type: String,
    pub natal_chart: ChartResult,
    pub natal_aspects: Vec<Aspect>,
    pub monthly_results: Vec<MonthlyResult>,
}

impl DocumentPayload {
    pub fn build(request: &ReportRequest, locale: Locale) -> Self {
        let labels = locale.labels();
        let meta = &request.metadata;

        let user_name = match meta.user_name.trim() {
            "" => labels.unknown_user.to_string(),
            name => name.to_string(),
        };
        let report_type = match meta.report_type.trim() {
            "" => labels.default_report_type.to_string(),
            kind => kind.to_string(),
        };

        let monthly_results = if !request.monthly_results.is_empty() {
            request.monthly_results.clone()
        } else {
            match request.static_interpretation.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => vec![MonthlyResult {
                    month: labels.static_month.to_string(),
                    text: text.to_string(),
                }],
                _ => Vec::new(),
            }
        };

        Self {
            user_name,
            birth_date: meta.birth_date.clone(),
            birth_time: meta.birth_time.clone(),
            birth_city: meta.birth_city.clone(),
            report_type,
            natal_chart: request.chart.clone(),
            natal_aspects: request.aspects.clone().unwrap_or_default(),
            monthly_results,
        }
    }
}

/// Name the saved document gets. A `.pdf` suggestion becomes `.docx`; any
/// directory part is dropped.
pub fn derive_file_name(suggested: &str) -> String {
    let base = Path::new(suggested.trim())
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let base = if base.is_empty() { DEFAULT_FILE_NAME } else { base };

    let lower = base.to_lowercase();
    if lower.ends_with(DOCUMENT_EXTENSION) {
        base.to_string()
    } else if lower.ends_with(".pdf") {
        format!("{}{}", &base[..base.len() - ".pdf".len()], DOCUMENT_EXTENSION)
    } else {
        format!("{}{}", base, DOCUMENT_EXTENSION)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Saved(PathBuf),
    /// Another export is in flight; nothing was sent
    Busy,
    /// The backend rejected the token; the session has been cleared
    SessionExpired { redirect: &'static str },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("document generation failed: {0}")]
    Backend(#[from] ApiError),
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub fn user_message(&self, locale: Locale) -> String {
        let detail = match self {
            ExportError::Backend(e) => e.user_message(locale),
            ExportError::Write { source, .. } => source.to_string(),
        };
        match locale {
            Locale::Bg => format!("Грешка при генериране на DOCX: {}", detail),
            Locale::En => format!("Error generating DOCX: {}", detail),
        }
    }
}

/// Clears the busy flag however the export ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ReportExporter {
    backend: Arc<dyn ReportBackend>,
    session: SessionService,
    output_dir: PathBuf,
    locale: Locale,
    generating: AtomicBool,
}

impl ReportExporter {
    pub fn new(
        backend: Arc<dyn ReportBackend>,
        session: SessionService,
        output_dir: impl Into<PathBuf>,
        locale: Locale,
    ) -> Self {
        Self {
            backend,
            session,
            output_dir: output_dir.into(),
            locale,
            generating: AtomicBool::new(false),
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn export(&self, request: &ReportRequest) -> Result<ExportOutcome, ExportError> {
        if self
            .generating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("export already in progress");
            return Ok(ExportOutcome::Busy);
        }
        let _busy = BusyGuard(&self.generating);

        let payload = DocumentPayload::build(request, self.locale);
        let token = self.session.token();

        let bytes = match self.backend.generate_docx(&payload, token.as_deref()).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_unauthorized() => {
                log::warn!("document request rejected: {}", e);
                self.session.clear_session();
                return Ok(ExportOutcome::SessionExpired {
                    redirect: ENTRY_ROUTE,
                });
            }
            Err(e) => {
                log::error!("document generation failed: {}", e);
                return Err(e.into());
            }
        };

        let path = self.output_dir.join(derive_file_name(&request.file_name));
        let write = |source| ExportError::Write {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.output_dir).map_err(write)?;
        fs::write(&path, &bytes).map_err(write)?;
        log::info!("saved report {} ({} bytes)", path.display(), bytes.len());
        Ok(ExportOutcome::Saved(path))
    }
}

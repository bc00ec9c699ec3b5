//! Backend-facing half of AstroMind: requests, streaming forecasts, session,
//! saved profiles and report export.

pub mod api;
pub mod export;
pub mod profiles;
pub mod request;
pub mod session;
pub mod stream;

pub use api::{
    ApiError, AuthResponse, Credentials, EventStream, HttpBackend, InterpretResponse, Registration,
    ReportBackend, User,
};
pub use export::{
    derive_file_name, DocumentPayload, ExportError, ExportOutcome, ReportExporter, ReportMetadata,
    ReportRequest,
};
pub use profiles::{ProfileDebouncer, ProfileError, ProfileSnapshot, ProfileStore};
pub use request::{
    BirthForm, InterpretRequest, PartnerData, ReportType, TransitData, ValidationError,
};
pub use session::{
    FileSessionStore, MemorySessionStore, Session, SessionError, SessionGuard, SessionService,
    SessionStatus, SessionStore, ENTRY_ROUTE,
};
pub use stream::{
    decode_sse, render_months, run_forecast, ForecastAccumulator, ForecastState, SseDecoder,
    StreamEvent,
};

mod profile_watch;
mod saved;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use astromind_chart::{Aspect, ChartRenderer, ChartResult, Locale, SummaryFormatter};
use astromind_client::{
    run_forecast, BirthForm, Credentials, ExportOutcome, FileSessionStore, ForecastState,
    HttpBackend, ProfileDebouncer, ProfileSnapshot, ProfileStore, Registration, ReportBackend, ReportExporter,
    ReportMetadata, ReportRequest, ReportType, SessionGuard, SessionService, SessionStatus,
};
use astromind_config::AstromindSettings;

use saved::SavedReport;

#[derive(Parser, Debug)]
#[command(author, version, about = "AstroMind natal chart and report tool")]
struct Cli {
    /// Explicit astromind.toml (otherwise configs/astromind.toml is searched).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output language: bg or en. Overrides [report] locale.
    #[arg(long, global = true)]
    locale: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a chart JSON file to SVG.
    Render {
        chart: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the textual chart summary.
    Summary {
        chart: PathBuf,
        #[arg(long)]
        aspects: Option<PathBuf>,
    },
    /// Request an interpretation from the backend.
    Interpret(InterpretArgs),
    /// Generate a DOCX report from a saved interpretation.
    Export(ExportArgs),
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        full_name: String,
    },
    /// Check the stored session against the backend.
    Whoami,
    /// Read names from stdin, one per change, and show the saved profile
    /// once typing pauses.
    Profile,
    Logout,
}

#[derive(clap::Args, Debug)]
struct InterpretArgs {
    /// Profile name. Missing fields are filled from its saved snapshot.
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    time: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    question: Option<String>,
    #[arg(long, default_value = "general")]
    report_type: ReportType,
    /// Transit target date (YYYY-MM-DD); also the forecast start with --stream.
    #[arg(long)]
    target_date: Option<String>,
    #[arg(long)]
    target_time: Option<String>,
    /// Stream a month-by-month forecast.
    #[arg(long)]
    stream: bool,
    #[arg(long, requires = "stream")]
    end_date: Option<String>,
    /// Write the response (charts, text, months) as JSON for `export`.
    #[arg(short, long)]
    save: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ExportArgs {
    /// JSON written by `interpret --save`.
    response: PathBuf,
    #[arg(long, default_value = "")]
    name: String,
    #[arg(long, default_value = "")]
    date: String,
    #[arg(long, default_value = "")]
    time: String,
    #[arg(long, default_value = "")]
    city: String,
    #[arg(long)]
    report_type: Option<ReportType>,
    #[arg(long, default_value = astromind_client::export::DEFAULT_FILE_NAME)]
    file_name: String,
    /// Overrides [report] output_dir.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let settings = astromind_config::load_settings(cli.config.as_deref())?;
    let locale = cli
        .locale
        .as_deref()
        .or(Some(settings.report.locale.as_str()))
        .and_then(Locale::from_tag)
        .unwrap_or_default();
    log::debug!("backend {} locale {:?}", settings.api.base_url, locale);

    match cli.command {
        Command::Render { chart, output } => render(&chart, output.as_deref(), locale),
        Command::Summary { chart, aspects } => summary(&chart, aspects.as_deref(), locale),
        Command::Interpret(args) => interpret(&settings, args, locale).await,
        Command::Export(args) => export(&settings, args, locale).await,
        Command::Login { email, password } => {
            let backend = HttpBackend::new(&settings.api)?;
            let user = session(&settings)
                .login(&backend, &Credentials { email, password })
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message(locale)))?;
            println!("{}", display_user(&user));
            Ok(())
        }
        Command::Register {
            email,
            password,
            full_name,
        } => {
            let backend = HttpBackend::new(&settings.api)?;
            backend
                .register(&Registration {
                    email: email.clone(),
                    password,
                    full_name,
                })
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message(locale)))?;
            println!("registered {}", email);
            Ok(())
        }
        Command::Whoami => {
            let backend = HttpBackend::new(&settings.api)?;
            match guarded(session(&settings).verify(&backend)).await? {
                SessionStatus::Active(user) => println!("{}", display_user(&user)),
                SessionStatus::Offline(user) => {
                    println!("{} (offline)", display_user(&user))
                }
                SessionStatus::Expired { .. } => anyhow::bail!("not logged in"),
            }
            Ok(())
        }
        Command::Profile => {
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            let store = Arc::new(ProfileStore::in_dir(&settings.storage.data_dir));
            profile_watch::watch_profiles(input, store, Arc::new(ProfileDebouncer::default()))
                .await?;
            Ok(())
        }
        Command::Logout => {
            session(&settings).clear_session();
            Ok(())
        }
    }
}

fn session(settings: &AstromindSettings) -> SessionService {
    SessionService::new(Arc::new(FileSessionStore::in_dir(&settings.storage.data_dir)))
}

fn display_user(user: &astromind_client::User) -> String {
    match (&user.full_name, &user.email) {
        (Some(name), Some(email)) => format!("{} <{}>", name, email),
        (None, Some(email)) => email.clone(),
        (Some(name), None) => name.clone(),
        (None, None) => "?".to_string(),
    }
}

fn read_chart(path: &Path) -> anyhow::Result<ChartResult> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read chart {}", path.display()))?;
    Ok(ChartResult::from_json(&text)?)
}

fn render(chart: &Path, output: Option<&Path>, locale: Locale) -> anyhow::Result<()> {
    let chart = read_chart(chart)?;
    let svg = ChartRenderer::new(locale).render(&chart).to_svg();
    match output {
        Some(path) => {
            std::fs::write(path, svg).with_context(|| format!("Could not write {}", path.display()))?;
            log::info!("wrote {}", path.display());
        }
        None => println!("{}", svg),
    }
    Ok(())
}

fn summary(chart: &Path, aspects: Option<&Path>, locale: Locale) -> anyhow::Result<()> {
    let chart = read_chart(chart)?;
    let aspects: Option<Vec<Aspect>> = match aspects {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read aspects {}", path.display()))?;
            Some(serde_json::from_str(&text).context("Aspects must be a JSON array")?)
        }
        None => None,
    };

    match SummaryFormatter::new(locale).summarize(&chart, aspects.as_deref()) {
        Some(summary) => print!("{}", summary.to_text(&locale)),
        None => println!("{}", locale.labels().no_data),
    }
    Ok(())
}

fn build_form(args: &InterpretArgs, profiles: &ProfileStore) -> BirthForm {
    let mut form = BirthForm {
        name: args.name.clone().unwrap_or_default(),
        report_type: args.report_type,
        ..BirthForm::default()
    };

    if let Some(name) = &args.name {
        match profiles.load(name) {
            Ok(Some(snapshot)) => {
                log::info!("filling form from profile {}", name);
                snapshot.apply_to(&mut form);
            }
            Ok(None) => {}
            Err(e) => log::error!("could not load profile {}: {}", name, e),
        }
    }

    let overrides = [
        (&args.date, &mut form.date),
        (&args.time, &mut form.time),
        (&args.lat, &mut form.lat),
        (&args.lon, &mut form.lon),
        (&args.question, &mut form.question),
        (&args.target_date, &mut form.transit.target_date),
        (&args.target_time, &mut form.transit.target_time),
    ];
    for (value, field) in overrides {
        if let Some(value) = value {
            *field = value.clone();
        }
    }
    if args.target_date.is_some() || args.target_time.is_some() {
        form.enable_transit = true;
    }
    if args.stream {
        form.is_dynamic = true;
        form.end_date = args.end_date.clone().unwrap_or_default();
    }
    form
}

async fn interpret(
    settings: &AstromindSettings,
    args: InterpretArgs,
    locale: Locale,
) -> anyhow::Result<()> {
    let profiles = ProfileStore::in_dir(&settings.storage.data_dir);
    let form = build_form(&args, &profiles);
    let request = form
        .validate()
        .map_err(|e| anyhow::anyhow!(e.message(locale)))?;
    let backend = HttpBackend::new(&settings.api)?;

    let (saved, outcome) = if args.stream {
        let mut last_progress = String::new();
        let forecast = guarded(run_forecast(&backend, &request, |f| {
            if let Some(progress) = f.progress() {
                if progress != last_progress {
                    eprintln!("{}", progress);
                    last_progress = progress.to_string();
                }
            }
        }))
        .await?
        .map_err(|e| anyhow::anyhow!(e.user_message(locale)))?;

        println!("{}", forecast.render_interpretation());
        (SavedReport::from_forecast(&forecast), forecast.state().clone())
    } else {
        let response = guarded(backend.interpret(&request))
            .await?
            .map_err(|e| anyhow::anyhow!(e.user_message(locale)))?;
        if let Some(text) = &response.interpretation {
            println!("{}", text);
        }
        (SavedReport::from_response(response), ForecastState::Complete)
    };

    remember_profile(&profiles, &args, &form, &outcome);

    if let Some(path) = &args.save {
        saved.write(path)?;
        log::info!("saved response to {}", path.display());
    }
    if let ForecastState::Failed(message) = outcome {
        anyhow::bail!(message);
    }
    Ok(())
}

/// Store the submitted form under its profile name. Only a completed run
/// counts as a successful submission.
fn remember_profile(
    profiles: &ProfileStore,
    args: &InterpretArgs,
    form: &BirthForm,
    outcome: &ForecastState,
) -> bool {
    let Some(name) = &args.name else {
        return false;
    };
    if *outcome != ForecastState::Complete {
        log::info!("run did not complete, profile {} left unchanged", name);
        return false;
    }
    let city = args.city.as_deref().unwrap_or_default();
    match profiles.save(name, &ProfileSnapshot::from_form(form, city, "")) {
        Ok(()) => true,
        Err(e) => {
            log::error!("could not save profile {}: {}", name, e);
            false
        }
    }
}

/// Await a backend call whose output is dropped if Ctrl-C arrives first.
/// The call itself is not aborted.
async fn guarded<F: std::future::Future>(fut: F) -> anyhow::Result<F::Output> {
    let guard = SessionGuard::new();
    let view = guard.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, waiting for the pending request to settle");
            view.teardown();
        }
    });
    let output = guard.run(fut).await;
    watcher.abort();
    output.context("interrupted")
}

async fn export(settings: &AstromindSettings, args: ExportArgs, locale: Locale) -> anyhow::Result<()> {
    let saved = SavedReport::read(&args.response)?;
    let chart = saved
        .response
        .natal_chart
        .clone()
        .context("Saved response has no natal chart")?;

    let report_type = args
        .report_type
        .map(|kind| kind.label(locale).to_string())
        .unwrap_or_default();
    let metadata = ReportMetadata {
        user_name: args.name,
        birth_date: args.date,
        birth_time: args.time,
        birth_city: args.city,
        report_type,
    };

    let mut request = ReportRequest::new(metadata, chart)
        .with_monthly_results(saved.monthly_results.clone())
        .with_file_name(args.file_name);
    if let Some(aspects) = saved.response.natal_aspects.clone() {
        request = request.with_aspects(aspects);
    }
    if let Some(text) = saved.response.interpretation.clone() {
        request = request.with_static_interpretation(text);
    }

    let backend: Arc<dyn ReportBackend> = Arc::new(HttpBackend::new(&settings.api)?);
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| settings.report.output_dir.clone());
    let exporter = ReportExporter::new(backend, session(settings), output_dir, locale);

    match exporter.export(&request).await {
        Ok(ExportOutcome::Saved(path)) => println!("{}", path.display()),
        Ok(ExportOutcome::Busy) => anyhow::bail!("an export is already running"),
        Ok(ExportOutcome::SessionExpired { redirect }) => {
            anyhow::bail!("session expired, log in again (redirect to {})", redirect)
        }
        Err(e) => anyhow::bail!(e.user_message(locale)),
    }
    Ok(())
}

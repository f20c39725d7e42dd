use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lecture_relay::api::{ApiClient, ApiConfig, CookieSession, SiteSession};
use lecture_relay::application::{
    AudioUploadExecutor, BackgroundContext, ControlSurface, DownloadCoordinator, PageContext,
    ProgressFeed, ProgressRelay, ProgressTracker, CLEAR_DELAY,
};
use lecture_relay::backend::{BackendClient, HealthStatus};
use lecture_relay::config::{Settings, SettingsStore};
use lecture_relay::domain::{Credential, UploadProgress};
use lecture_relay::utils::inspect_page;

#[derive(Parser)]
#[command(name = "lecture-relay", version, about = "Send Panopto lectures to Study Buddy")]
struct Cli {
    /// Settings file (TOML with `backendUrl` and `apiKey`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    backend_url: Option<String>,

    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send the lecture on a viewer page to a course
    Send {
        #[arg(long)]
        page_url: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        session_token: Option<String>,
        /// Cookie header of the signed-in Panopto session
        #[arg(long)]
        cookie: Option<String>,
    },
    /// List courses available on the backend
    Courses {
        #[arg(long)]
        session_token: Option<String>,
    },
    /// Check that the configured backend is reachable
    Check,
    /// Show the video id detected on a page
    Inspect {
        #[arg(long)]
        page_url: String,
    },
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lecture_relay=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<SettingsStore> {
    let store = match &cli.config {
        Some(path) => SettingsStore::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => SettingsStore::default(),
    };

    store.save(Settings {
        backend_url: cli.backend_url.clone(),
        api_key: cli.api_key.clone(),
    });
    Ok(store)
}

fn print_progress(progress: &UploadProgress) {
    let method = progress
        .method
        .map(|m| format!(" ({})", m.label()))
        .unwrap_or_default();
    let percent = if progress.is_indeterminate() {
        "  …".to_string()
    } else {
        format!("{:>3}%", progress.percent)
    };
    println!(
        "[{:<11}] {} {}{}",
        format!("{:?}", progress.phase).to_lowercase(),
        percent,
        progress.message,
        method
    );
}

async fn send(
    store: SettingsStore,
    page_url: &str,
    course: &str,
    session_token: Option<String>,
    cookie: Option<String>,
) -> Result<()> {
    let page = inspect_page(page_url)?;
    info!("Video ID: {}", page.video.id);

    let relay = ProgressRelay::default();
    let session: Arc<dyn SiteSession> = Arc::new(CookieSession::new(cookie));
    let backend = BackendClient::default();

    let background = BackgroundContext::new(
        AudioUploadExecutor::new(session.clone(), backend.clone(), relay.clone()),
        relay.clone(),
    )
    .spawn();
    let coordinator = DownloadCoordinator::new(
        ApiClient::new(ApiConfig::default(), session),
        backend,
        background,
        relay.clone(),
    );
    let surface = ControlSurface::new(
        PageContext::new(coordinator, page.url, store).spawn(),
        relay.clone(),
    );

    let mut feed = ProgressFeed::new(&relay, ProgressTracker::default());
    let printer = tokio::spawn(async move {
        loop {
            let expiry = feed.expires_in();
            let cleared = async move {
                match expiry {
                    Some(remaining) => tokio::time::sleep(remaining).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                update = feed.next() => {
                    if update.is_none() {
                        break;
                    }
                    if let Some(progress) = feed.current() {
                        print_progress(progress);
                    }
                }
                _ = cleared => {
                    if feed.current().is_none() {
                        break;
                    }
                }
            }
        }
    });

    let result = surface.send(course, session_token).await;
    // The printer stops once the terminal record has been cleared.
    if tokio::time::timeout(CLEAR_DELAY + Duration::from_secs(1), printer)
        .await
        .is_err()
    {
        warn!("progress display did not settle");
    }

    println!("{}", result.status_line());
    if !result.success {
        bail!("download failed");
    }
    Ok(())
}

async fn courses(store: SettingsStore, session_token: Option<String>) -> Result<()> {
    let settings = store.get();
    let credential = Credential::new(session_token, settings.api_key().map(str::to_string));

    let courses = BackendClient::default()
        .list_courses(&settings.resolved_backend_url(), &credential)
        .await?;

    if courses.is_empty() {
        println!("No courses found. Add your first course in Study Buddy.");
    }
    for course in courses {
        println!("{}\t{}", course.id, course.label);
    }
    Ok(())
}

async fn check(store: SettingsStore) -> Result<()> {
    let settings = store.get();
    let backend_url = settings.resolved_backend_url();

    let status = BackendClient::default()
        .check_health(&backend_url, settings.api_key())
        .await;
    println!("{}: {}", backend_url, status.message());

    match status {
        HealthStatus::Reachable => Ok(()),
        HealthStatus::ErrorStatus(code) => bail!("health check returned HTTP {}", code),
        HealthStatus::Unreachable(reason) => bail!("health check failed: {}", reason),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let store = load_settings(&cli)?;

    match cli.command {
        Command::Send {
            page_url,
            course,
            session_token,
            cookie,
        } => send(store, &page_url, &course, session_token, cookie).await,
        Command::Courses { session_token } => courses(store, session_token).await,
        Command::Check => check(store).await,
        Command::Inspect { page_url } => {
            let page = inspect_page(&page_url)?;
            println!("Video ID: {}", page.video.id);
            Ok(())
        }
    }
}

//! dispatch-tui - terminal dispatch board for field-service jobs
//!
//! Shows who is working when (day timeline), which days each technician has
//! work, where the jobs are (map) and what still needs scheduling (queue).

use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use dispatch_tui::api::{ApiClient, ApiCommand, ApiMessage};
use dispatch_tui::app::{App, AppSettings};
use dispatch_tui::config::{DispatchConfig, GeocoderConfig, GeocoderProvider, LoggingConfig};
use dispatch_tui::geocode::{geocode_addresses, CachingGeocoder, Geocoder, GoogleGeocoder, NominatimGeocoder};
use dispatch_tui::ui;

/// Frame budget for input polling and redraw
const FRAME_DURATION: Duration = Duration::from_millis(50);

/// How often to re-check the backend connection
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "dispatch-tui", version, about)]
struct Args {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Supabase project URL (overrides config and SUPABASE_URL)
    #[arg(long)]
    url: Option<String>,

    /// Geocoder: nominatim, google or none
    #[arg(long)]
    geocoder: Option<GeocoderProvider>,

    /// Log level or filter directive (RUST_LOG still wins)
    #[arg(long)]
    log_level: Option<String>,
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().ok();
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = load_config(&args)?;

    let _log_guard = init_logging(&config.logging)?;
    tracing::info!(
        backend = config.backend.url.as_deref().unwrap_or_default(),
        geocoder = %config.geocoder.provider,
        "Starting dispatch-tui"
    );

    run_tui(config).await
}

/// File, then environment, then flags
fn load_config(args: &Args) -> Result<DispatchConfig> {
    let mut config = DispatchConfig::load_or_default(args.config.as_deref())?;
    config.apply_env()?;

    if let Some(url) = &args.url {
        config.backend.url = Some(url.clone());
    }
    if let Some(provider) = args.geocoder {
        config.geocoder.provider = provider;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

/// The terminal belongs to the UI, so tracing goes to a daily file
fn init_logging(logging: &LoggingConfig) -> Result<WorkerGuard> {
    let dir = logging.log_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(&dir, "dispatch-tui.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level)),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

fn build_geocoder(config: &GeocoderConfig) -> Result<Option<Arc<dyn Geocoder>>> {
    let geocoder: Arc<dyn Geocoder> = match config.provider {
        GeocoderProvider::None => return Ok(None),
        GeocoderProvider::Nominatim => Arc::new(CachingGeocoder::new(NominatimGeocoder::new(
            config.endpoint(),
            &config.user_agent,
        )?)),
        GeocoderProvider::Google => {
            let key = config.api_key.as_deref().unwrap_or_default();
            Arc::new(CachingGeocoder::new(GoogleGeocoder::new(config.endpoint(), key)?))
        }
    };
    Ok(Some(geocoder))
}

/// Run the TUI application
async fn run_tui(config: DispatchConfig) -> Result<()> {
    let base_url = config
        .backend
        .url
        .as_deref()
        .context("Backend URL is not set")?;
    let api_client = ApiClient::new(
        base_url,
        config.backend.anon_key.as_deref(),
        Duration::from_secs(config.backend.timeout_secs),
    )?;
    let geocoder = build_geocoder(&config.geocoder)?;

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    // Create communication channels
    let (api_tx, mut api_rx) = mpsc::channel::<ApiMessage>(32);
    let (cmd_tx, cmd_rx) = mpsc::channel::<ApiCommand>(32);

    let api_task = tokio::spawn(run_api_worker(api_client, geocoder, api_tx, cmd_rx));

    let today = chrono::Local::now().date_naive();
    let mut app = App::new(AppSettings::from(&config), today);
    for cmd in app.startup_commands() {
        cmd_tx.send(cmd).await.ok();
    }

    let result = run_event_loop(&mut terminal, &mut app, &mut api_rx, &cmd_tx).await;

    // Cleanup
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    api_task.abort();
    tracing::info!("Shut down");

    result
}

/// Run the API worker task.
///
/// Every request runs in its own task so a slow or unreachable backend never
/// holds up a newer one; the app drops whatever arrives out of date.
async fn run_api_worker(
    client: ApiClient,
    geocoder: Option<Arc<dyn Geocoder>>,
    tx: mpsc::Sender<ApiMessage>,
    mut rx: mpsc::Receiver<ApiCommand>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            ApiCommand::FetchJobs { seq, range } => {
                let client = client.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let msg = match client.fetch_jobs(range).await {
                        Ok(jobs) => ApiMessage::JobsLoaded { seq, range, jobs },
                        Err(e) => {
                            tracing::warn!(seq, error = %format!("{:#}", e), "Job fetch failed");
                            ApiMessage::JobsFailed {
                                seq,
                                error: format!("{:#}", e),
                            }
                        }
                    };
                    tx.send(msg).await.ok();
                });
            }
            ApiCommand::FetchTechnicians => {
                let client = client.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let msg = match client.fetch_technicians().await {
                        Ok(technicians) => ApiMessage::TechniciansLoaded(technicians),
                        Err(e) => ApiMessage::Error(format!("Loading technicians failed: {:#}", e)),
                    };
                    tx.send(msg).await.ok();
                });
            }
            ApiCommand::Geocode { seq, addresses } => {
                let tx = tx.clone();
                match geocoder.clone() {
                    Some(geocoder) => {
                        tokio::spawn(async move {
                            let coordinates = geocode_addresses(&addresses, geocoder.as_ref()).await;
                            tracing::debug!(
                                seq,
                                requested = addresses.len(),
                                resolved = coordinates.len(),
                                provider = geocoder.name(),
                                "Geocoding finished"
                            );
                            tx.send(ApiMessage::Geocoded { seq, coordinates }).await.ok();
                        });
                    }
                    None => {
                        tx.send(ApiMessage::Geocoded {
                            seq,
                            coordinates: Default::default(),
                        })
                        .await
                        .ok();
                    }
                }
            }
            ApiCommand::CheckConnection => {
                let client = client.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let connected = client.health_check().await.unwrap_or(false);
                    tx.send(ApiMessage::ConnectionStatus(connected)).await.ok();
                });
            }
            ApiCommand::Shutdown => break,
        }
    }
}

/// Run the main event loop
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    api_rx: &mut mpsc::Receiver<ApiMessage>,
    cmd_tx: &mpsc::Sender<ApiCommand>,
) -> Result<()> {
    let mut last_health_check = std::time::Instant::now();

    loop {
        app.tick();

        terminal.draw(|frame| ui::render(frame, app))?;

        // Drain API messages (non-blocking)
        while let Ok(msg) = api_rx.try_recv() {
            if let Some(cmd) = app.handle_api_message(msg) {
                cmd_tx.send(cmd).await.ok();
            }
        }

        if last_health_check.elapsed() >= HEALTH_CHECK_INTERVAL {
            last_health_check = std::time::Instant::now();
            cmd_tx.send(ApiCommand::CheckConnection).await.ok();
        }

        if event::poll(FRAME_DURATION)? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events (not release)
                if key.kind == KeyEventKind::Press {
                    if let Some(cmd) = app.handle_key(key) {
                        cmd_tx.send(cmd).await.ok();
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

//! Outreach CLI entry point.
//!
//! Provides `send`, `save`, `preview`, and `limits` subcommands over a JSON
//! contact file.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use outreach::bridge::http::{HttpBridge, CONNECT_TIMEOUT, REQUEST_TIMEOUT};
use outreach::bridge::simulator::Simulator;
use outreach::config::{self, Config};
use outreach::contacts::{parse_contacts, Contact};
use outreach::engine::limiter::ConfigStore;
use outreach::engine::{Engine, Handoff};
use outreach::logging::{FanoutSink, LogSink, TracingSink};
use outreach::personalize;

/// Queue contacts and hand them to an automation bridge.
#[derive(Parser)]
#[command(name = "outreach", version, about)]
struct Cli {
    /// Config file (defaults to `~/.outreach/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Send a personalized message to every contact.
    Send {
        /// JSON file with the contact list.
        #[arg(long)]
        contacts: PathBuf,
        /// Message template with `{name}` / `{number}` placeholders.
        #[arg(long)]
        template: String,
        /// Override the daily cap for this run. Non-positive values are ignored.
        #[arg(long, allow_negative_numbers = true)]
        max_per_day: Option<i64>,
        /// Override the session window (hours) for this run. Non-positive values are ignored.
        #[arg(long, allow_negative_numbers = true)]
        window_hours: Option<f64>,
    },
    /// Hand the contact list to the bridge for saving.
    Save {
        /// JSON file with the contact list.
        #[arg(long)]
        contacts: PathBuf,
    },
    /// Print the personalized message for every contact without sending.
    Preview {
        /// JSON file with the contact list.
        #[arg(long)]
        contacts: PathBuf,
        /// Message template with `{name}` / `{number}` placeholders.
        #[arg(long)]
        template: String,
    },
    /// Print the effective limits as JSON.
    Limits,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Sends can run for hours; keep a JSON log file for them.
    let _logging_guard = match &cli.command {
        Command::Send { .. } => {
            let logs_dir = config::config_dir()?.join("logs");
            Some(outreach::logging::init_production(&logs_dir)?)
        }
        _ => {
            outreach::logging::init_cli();
            None
        }
    };

    let config = match &cli.config {
        Some(path) => config::load_or_default(path)?,
        None => config::load_default_config()?,
    };

    match cli.command {
        Command::Send {
            contacts,
            template,
            max_per_day,
            window_hours,
        } => handle_send(&config, &contacts, &template, max_per_day, window_hours).await,
        Command::Save { contacts } => handle_save(&config, &contacts).await,
        Command::Preview { contacts, template } => handle_preview(&contacts, &template),
        Command::Limits => handle_limits(&config),
    }
}

/// Read and parse a contact file.
fn read_contacts(path: &Path) -> anyhow::Result<Vec<Contact>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read contacts at {}", path.display()))?;
    parse_contacts(&raw).with_context(|| format!("failed to parse contacts at {}", path.display()))
}

/// Prints engine log lines to stdout.
struct StdoutSink;

impl LogSink for StdoutSink {
    fn log(&self, message: &str) {
        println!("{message}");
    }
}

/// Build the engine. The returned bridge shares its in-flight requests with
/// the one inside the engine so the caller can flush them before exiting.
fn build_engine(
    config: &Config,
    simulator: Option<Arc<Simulator>>,
) -> anyhow::Result<(Engine, Option<HttpBridge>)> {
    let sink: Arc<dyn LogSink> = Arc::new(
        FanoutSink::new()
            .with(Arc::new(StdoutSink))
            .with(Arc::new(TracingSink)),
    );
    let mut builder = Engine::builder()
        .config(Arc::new(ConfigStore::from_limits(&config.limits)))
        .sink(sink);

    let http = match config.bridge.url.as_deref() {
        Some(url) => {
            let bridge = HttpBridge::new(url).context("bridge url in config is not usable")?;
            info!(%url, "using HTTP automation bridge");
            builder = builder.bridge(Arc::new(bridge.clone()));
            Some(bridge)
        }
        None => {
            info!("no automation bridge configured");
            None
        }
    };
    if let Some(simulator) = simulator {
        builder = builder.fallback(simulator);
    }
    Ok((builder.build(), http))
}

/// Wait for the HTTP hand-off to settle so the runtime outlives it.
async fn flush_bridge(http: Option<&HttpBridge>) {
    let Some(http) = http else {
        return;
    };
    let report = http
        .flush(REQUEST_TIMEOUT.saturating_add(CONNECT_TIMEOUT))
        .await;
    if report.failed > 0 {
        warn!(
            accepted = report.accepted,
            failed = report.failed,
            "bridge did not accept every batch"
        );
    } else {
        info!(accepted = report.accepted, "bridge accepted batch");
    }
}

/// Start a send session and wait for the simulator (if it took over).
async fn handle_send(
    config: &Config,
    contacts_path: &Path,
    template: &str,
    max_per_day: Option<i64>,
    window_hours: Option<f64>,
) -> anyhow::Result<()> {
    let contacts = read_contacts(contacts_path)?;
    let simulator = Arc::new(Simulator::new(
        config.pacing.clone(),
        Arc::new(StdoutSink),
    ));
    let (mut engine, http) = build_engine(config, Some(Arc::clone(&simulator)))?;
    engine.set_max_messages_per_day(max_per_day);
    engine.set_max_window_hours(window_hours);

    let report = engine
        .start_send(&contacts, template)
        .context("send session did not start")?;
    info!(session_id = %report.session_id, contacts = report.contacts, "send started");

    match report.handoff {
        Handoff::Simulated => {
            let Some(mut task) = simulator.take_handle() else {
                return Ok(());
            };
            tokio::select! {
                joined = &mut task => {
                    let summary = joined.context("simulation task failed")?;
                    info!(dispatched = summary.dispatched, "simulation finished");
                }
                _ = tokio::signal::ctrl_c() => {
                    engine.stop();
                    let summary = task.await.context("simulation task failed")?;
                    info!(dispatched = summary.dispatched, "simulation interrupted");
                }
            }
        }
        Handoff::Bridge => flush_bridge(http.as_ref()).await,
        Handoff::Unavailable { notice } | Handoff::Failed { error: notice } => {
            warn!(%notice, "send not handed off");
        }
    }
    println!("{}", serde_json::to_string_pretty(&engine.status())?);
    Ok(())
}

/// Start a save session.
async fn handle_save(config: &Config, contacts_path: &Path) -> anyhow::Result<()> {
    let contacts = read_contacts(contacts_path)?;
    let (mut engine, http) = build_engine(config, None)?;
    let report = engine
        .start_save(&contacts)
        .context("save session did not start")?;
    if report.handoff == Handoff::Bridge {
        flush_bridge(http.as_ref()).await;
    }
    println!("{}", serde_json::to_string_pretty(&engine.status())?);
    Ok(())
}

/// Render the template for every contact.
fn handle_preview(contacts_path: &Path, template: &str) -> anyhow::Result<()> {
    let contacts = read_contacts(contacts_path)?;
    for contact in &contacts {
        println!(
            "{}: {}",
            contact.name,
            personalize::render(template, Some(contact))
        );
    }
    Ok(())
}

/// Print the effective limits.
fn handle_limits(config: &Config) -> anyhow::Result<()> {
    let store = ConfigStore::from_limits(&config.limits);
    let limits = serde_json::json!({
        "max_messages_per_day": store.max_messages_per_day(),
        "max_window_ms": store.max_window_ms(),
        "bridge_url": config.bridge.url,
    });
    println!("{}", serde_json::to_string_pretty(&limits)?);
    Ok(())
}

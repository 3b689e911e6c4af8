use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mark_watch::config::{Config, ConfigOverrides};
use mark_watch::controller::{CycleReport, UpdateController};
use mark_watch::error::StoreError;
use mark_watch::notify::Notifier;
use mark_watch::output::json::render_json;
use mark_watch::output::table::{render_outcomes_table, render_snapshot_table};
use mark_watch::provider::http::PageSource;
use mark_watch::provider::PortalProvider;
use mark_watch::schedule::{describe, run_in_window, run_watch_loop};
use mark_watch::snapshot::{JsonFileStore, StateStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "mark-watch",
    about = "Notifies you when new marks are published on the grade portal"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(flatten)]
    overrides: OverrideArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone, Default)]
struct OverrideArgs {
    #[arg(long = "portal-url", env = "PORTAL_URL")]
    portal_url: Option<String>,
    #[arg(long = "account-id", env = "PORTAL_ID")]
    account_id: Option<String>,
    #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long, env = "SEMESTER")]
    semester: Option<String>,
    #[arg(long = "state-path", env = "MARKS_STATE_PATH")]
    state_path: Option<String>,
    #[arg(long = "signal-api-server", env = "SIGNAL_API_SERVER")]
    signal_api_server: Option<String>,
    #[arg(long = "phone-number", env = "PHONE_NUMBER")]
    phone_number: Option<String>,
    #[arg(long = "email-from", env = "EMAIL_FROM")]
    email_from: Option<String>,
    #[arg(long = "email-password", env = "EMAIL_PASSWORD", hide_env_values = true)]
    email_password: Option<String>,
    /// Comma separated list of email recipients.
    #[arg(long, env = "EMAILS")]
    recipients: Option<String>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(value: OverrideArgs) -> Self {
        Self {
            portal_url: value.portal_url,
            account_id: value.account_id,
            password: value.password,
            semester: value.semester,
            state_path: value.state_path,
            signal_api_server: value.signal_api_server,
            phone_number: value.phone_number,
            email_from: value.email_from,
            email_password: value.email_password,
            recipients: value.recipients,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a single cycle, meant to be invoked by cron.
    Run {
        /// Ignore the operating window.
        #[arg(long)]
        force: bool,
    },
    /// Keep running cycles on a fixed interval until interrupted.
    Watch {
        #[arg(long)]
        interval_secs: Option<u64>,
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Print the stored snapshot.
    State,
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    tokio::select! {
        result = dispatch(cli) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, exiting");
            std::process::exit(0);
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(cli.overrides.clone().into());

    match &cli.command {
        Commands::Config { init, show } => {
            handle_config_command(*init, *show, &config, &config_path)
        }
        Commands::State => print_state(&config, cli.output),
        Commands::Run { force } => {
            let window = config.operating_window()?;
            let mut controller = build_controller(&config)?;
            let report = run_in_window(&mut controller, &window, *force)
                .await
                .context("update cycle failed")?;
            if let Some(report) = report {
                print_report(&report, cli.output)?;
            }
            Ok(())
        }
        Commands::Watch {
            interval_secs,
            iterations,
        } => {
            let window = config.operating_window()?;
            let mut controller = build_controller(&config)?;
            let interval = Duration::from_secs(interval_secs.unwrap_or(config.schedule.interval_secs));
            info!("watching every {}s", interval.as_secs());
            run_watch_loop(&mut controller, &window, interval, *iterations).await;
            Ok(())
        }
    }
}

fn build_controller(config: &Config) -> Result<UpdateController> {
    let credentials = config.portal_credentials()?;
    let provider = PortalProvider::new(
        PageSource::parse(config.portal.url.trim()),
        credentials,
        config.page_template(),
        config.fetch_timeout(),
    )?;
    let notifier = Notifier::from_config(&config.resolve_notifier()?)
        .context("failed setting up notification channels")?;
    let store = JsonFileStore::open(config.resolved_state_path());
    Ok(UpdateController::new(
        Box::new(provider),
        Box::new(store),
        notifier,
        config.cycle_options(),
    ))
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &PathBuf) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(&config.redacted())?);
    }
    Ok(())
}

fn print_state(config: &Config, format: OutputFormat) -> Result<()> {
    let store = JsonFileStore::open(config.resolved_state_path());
    let snapshot = match store.load() {
        Ok(snapshot) => snapshot,
        Err(StoreError::NotInitialized) => {
            warn!("no stored marks at {}", store.path().display());
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    match format {
        OutputFormat::Table => println!("{}", render_snapshot_table(&snapshot)),
        OutputFormat::Json => println!("{}", render_json(&snapshot)?),
    }
    Ok(())
}

fn print_report(report: &CycleReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            info!("{}", describe(report));
            if let CycleReport::Updated { outcomes, .. } = report {
                println!("{}", render_outcomes_table(outcomes));
            }
        }
        OutputFormat::Json => println!("{}", render_json(report)?),
    }
    Ok(())
}

//! parcel-notify: Main Binary
//!
//! Usage:
//!   parcel-notify                  - Run the daily job once
//!   parcel-notify --config <path>  - Run with a TOML config file
//!   parcel-notify --help           - Show help

use parcel_notify::JobError;
use pn_core::Config;
use pn_graph::FileTokenStore;
use pn_whatsapp::WhatsAppClient;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Run the job, optionally with an explicit config file
    Run { config_path: Option<PathBuf> },
    /// Show help
    Help,
    /// Show version
    Version,
    /// Unusable arguments
    Invalid(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let config_path = match parse_args(std::env::args().skip(1)) {
        RunMode::Help => {
            print_help();
            return ExitCode::SUCCESS;
        }
        RunMode::Version => {
            println!("parcel-notify {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        RunMode::Invalid(message) => {
            eprintln!("parcel-notify: {}", message);
            eprintln!("Try 'parcel-notify --help' for more information.");
            return ExitCode::from(64);
        }
        RunMode::Run { config_path } => config_path,
    };

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(70);
    }

    // Load .env file
    dotenvy::dotenv().ok();

    match run_job(config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();
    Ok(())
}

async fn run_job(config_path: Option<PathBuf>) -> Result<(), JobError> {
    let config = match config_path {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::load()?,
    };

    tracing::info!("Starting parcel-notify...");
    tracing::info!("Mailbox: {}", config.graph.user_email);
    if config.whatsapp.test_mode {
        tracing::info!("Test mode: notifications go to the administrator");
    }

    let store = FileTokenStore::new(&config.graph.token_file);
    let notifier = WhatsAppClient::new(&config.whatsapp)?;
    let today = config.job.today();

    parcel_notify::run(&config, store, &notifier, today).await?;
    Ok(())
}

/// Parse command line arguments
fn parse_args<I>(args: I) -> RunMode
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut config_path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            "--config" | "-f" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => return RunMode::Invalid(format!("{} requires a path", arg)),
            },
            other => return RunMode::Invalid(format!("unknown argument '{}'", other)),
        }
    }

    RunMode::Run { config_path }
}

/// Print help message
fn print_help() {
    println!("parcel-notify - daily parcel delivery reminders over WhatsApp");
    println!();
    println!("Usage:");
    println!("  parcel-notify                  Run the job once");
    println!("  parcel-notify --config <path>  Read settings from a TOML file");
    println!("  parcel-notify --help           Show this help message");
    println!("  parcel-notify --version        Show version");
    println!();
    println!("Without --config, ./parcel-notify.toml is used when present.");
    println!("Environment variables (also read from .env) override file values.");
    println!();
    println!("Environment Variables:");
    println!("  TENANT_ID               Azure AD tenant id (required)");
    println!("  CLIENT_ID               App registration client id (required)");
    println!("  CLIENT_SECRET           App registration secret (required)");
    println!("  USER_EMAIL              Mailbox receiving the daily report (required)");
    println!("  WHATSAPP_TOKEN          WhatsApp Cloud API token (required)");
    println!("  PHONE_NUMBER_ID         Sender phone number id (required)");
    println!("  ADMIN_PHONE             Administrator number for the run report (required)");
    println!("  TIMEZONE                IANA time zone, e.g. Asia/Singapore (required)");
    println!("  TESTMODE                Send every notification to ADMIN_PHONE (default: off)");
    println!("  FOLDER_PATH             Mail folder path (default: Automation/Uparcel Notifications)");
    println!("  SEARCH_SUBJECT_KEYWORD  Subject keyword (default: Uparcel Integration Daily Job CSV)");
    println!("  TEST_SUBJECT            Subject matched on any day (default: TEST UPARCEL CSV)");
    println!("  DOWNLOAD_DIR            Where the CSV is saved (default: ./attachments)");
    println!("  TOKEN_FILE              Cached Graph token (default: graph_token.json)");
    println!("  NOTIFICATION_TEMPLATE   Reminder template (default: uparcel_delivery_reminder)");
    println!("  REPORT_TEMPLATE         Report template (default: messages_report)");
    println!("  REPORT_TITLE            Report title (default: Uparcel Reminder)");
    println!("  TEMPLATE_LANGUAGE       Template language code (default: en)");
    println!("  GRAPH_BASE_URL          Graph endpoint (default: https://graph.microsoft.com/v1.0)");
    println!("  LOGIN_BASE_URL          Identity endpoint (default: https://login.microsoftonline.com)");
    println!("  WHATSAPP_BASE_URL       WhatsApp endpoint (default: https://graph.facebook.com/v19.0)");
    println!("  RUST_LOG                Log filter (default: info)");
}

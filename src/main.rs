//! Binary entrypoint for the battlebot CLI.
//!
//! Commands:
//! - `start` - run the bot, reading gateway events as JSON lines on stdin and
//!   writing platform actions as JSON lines on stdout
//! - `init` - create a starter `config.toml`
//! - `status` - print configuration summary and counters
//!
//! See the library crate docs for module-level details: `battlebot::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::sync::Arc;

use battlebot::bot::BotServer;
use battlebot::config::{Config, TOKEN_ENV};
use battlebot::platform::console::{pump_events, ConsolePlatform};

#[derive(Parser)]
#[command(name = "battlebot")]
#[command(about = "Turn-based thread battles for chat platforms")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot on stdin/stdout
    Start,
    /// Write a default configuration file
    Init,
    /// Show configuration summary and counters
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting battlebot v{}", env!("CARGO_PKG_VERSION"));
            if config.bot.token.is_none() {
                warn!(
                    "No gateway token configured (set bot.token or {}); expecting a bridge on stdin/stdout",
                    TOKEN_ENV
                );
            }

            let platform = Arc::new(ConsolePlatform::spawn(tokio::io::stdout()));
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let reader_platform = platform.clone();
            tokio::spawn(async move {
                let stdin = tokio::io::BufReader::new(tokio::io::stdin());
                if let Err(e) = pump_events(stdin, reader_platform, tx).await {
                    warn!("event reader stopped: {}", e);
                }
            });

            let server = BotServer::new(config, platform);
            server.run(rx).await?;
        }
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Initializing new battlebot configuration");
            if tokio::fs::metadata(&cli.config).await.is_ok() {
                warn!("{} already exists; leaving it untouched", cli.config);
                return Ok(());
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            let platform = Arc::new(ConsolePlatform::spawn(tokio::io::sink()));
            BotServer::new(config, platform).show_status();
        }
    }

    Ok(())
}

/// Logs go to stderr (stdout carries the event protocol) and, when
/// configured, to an append-only log file.
fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    builder.target(env_logger::Target::Stderr);
    let base_level = match (verbosity, config) {
        (0, Some(cfg)) => cfg.logging.level_filter(),
        (0, None) => log::LevelFilter::Info,
        (1, _) => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = log_file {
        let file = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Echo to the console only when a human is watching stderr.
        let is_tty = atty::is(atty::Stream::Stderr);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}: {}", ts, record.level(), record.target(), record.args());
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.target(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}

//! mailspool - flush and manage the outgoing mail spool.

mod app;
mod commands;
mod output;
mod transport;

use anyhow::Context;
use app::App;
use clap::{Parser, Subcommand};
use spool_config_and_utils::{init_logging, Config, Paths};
use std::path::PathBuf;
use tracing::debug;

/// mailspool - Deliver queued mail in bounded batches.
#[derive(Parser)]
#[command(name = "mailspool")]
#[command(about = "Spool outgoing mail and flush it through the configured transport")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Runtime directory holding config, spool and logs (default ~/.mailspool)
    #[arg(long, env = "MAILSPOOL_BASE_DIR", global = true)]
    base_dir: Option<PathBuf>,

    /// Config file to use instead of <base-dir>/config.json
    #[arg(short, long, env = "MAILSPOOL_CONFIG", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send emails from the spool
    Send {
        /// Maximum number of messages to send (0 = unlimited)
        #[arg(long, default_value = "0")]
        message_limit: u64,
        /// Maximum seconds to spend sending (0 = unlimited)
        #[arg(long, default_value = "0")]
        time_limit: u64,
        /// Seconds after which an in-flight message is considered stuck
        #[arg(long)]
        recover_timeout: Option<u64>,
    },

    /// Queue a raw message read from FILE or stdin
    Queue {
        /// Envelope sender
        #[arg(long)]
        from: String,
        /// Envelope recipient (repeatable)
        #[arg(long, required = true)]
        to: Vec<String>,
        /// Subject recorded in the spool
        #[arg(short, long)]
        subject: Option<String>,
        /// Message file; stdin when omitted or "-"
        file: Option<PathBuf>,
    },

    /// Show spool counts
    Status {
        /// Also list failed messages
        #[arg(long)]
        failed: bool,
    },

    /// Remove dead and retained sent messages
    Purge {
        /// Only failed messages that will not be retried
        #[arg(long)]
        failed: bool,
        /// Only retained sent messages
        #[arg(long)]
        sent: bool,
        /// Only messages enqueued more than SECS ago
        #[arg(long, value_name = "SECS")]
        older_than: Option<u64>,
    },
}

fn load_app(cli: &Cli) -> anyhow::Result<App> {
    let paths = match &cli.base_dir {
        Some(dir) => Paths::with_base_dir(dir.clone()),
        None => Paths::new()?,
    };
    let config = Config::load_with_override(&paths, cli.config.as_deref())
        .context("failed to load configuration")?;
    Ok(App::new(config, paths))
}

async fn run(cli: Cli, app: App) -> anyhow::Result<()> {
    let format = &cli.format;
    match cli.command {
        Commands::Send {
            message_limit,
            time_limit,
            recover_timeout,
        } => {
            let args = commands::SendArgs {
                message_limit,
                time_limit_secs: time_limit,
                recover_timeout_secs: recover_timeout,
            };
            commands::send(&app, args, format).await
        }
        Commands::Queue {
            from,
            to,
            subject,
            file,
        } => commands::queue(&app, from, to, subject, file.as_deref(), format).await,
        Commands::Status { failed } => commands::status(&app, failed, format).await,
        Commands::Purge {
            failed,
            sent,
            older_than,
        } => commands::purge(&app, failed, sent, older_than, format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let app = match load_app(&cli) {
        Ok(app) => app,
        Err(e) => {
            output::print_error(&format!("{:#}", e), &cli.format);
            std::process::exit(1);
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| app.config.log_level.clone());
    init_logging(&level, Some(app.paths.log_file()));
    debug!(base_dir = %app.paths.base_dir().display(), "Starting mailspool");

    let format = cli.format;
    if let Err(e) = run(cli, app).await {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_send_flags() {
        let cli = Cli::try_parse_from([
            "mailspool",
            "send",
            "--message-limit",
            "3",
            "--time-limit",
            "60",
            "--recover-timeout",
            "120",
        ])
        .unwrap();
        match cli.command {
            Commands::Send {
                message_limit,
                time_limit,
                recover_timeout,
            } => {
                assert_eq!(message_limit, 3);
                assert_eq!(time_limit, 60);
                assert_eq!(recover_timeout, Some(120));
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn send_defaults_are_unlimited() {
        let cli = Cli::try_parse_from(["mailspool", "send"]).unwrap();
        match cli.command {
            Commands::Send {
                message_limit,
                time_limit,
                recover_timeout,
            } => {
                assert_eq!(message_limit, 0);
                assert_eq!(time_limit, 0);
                assert_eq!(recover_timeout, None);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn queue_requires_recipient() {
        assert!(Cli::try_parse_from(["mailspool", "queue", "--from", "a@example.com"]).is_err());
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mailspool",
            "status",
            "--format",
            "json",
            "--base-dir",
            "/tmp/spool",
        ])
        .unwrap();
        assert_eq!(cli.format, output::OutputFormat::Json);
        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/spool")));
    }

    #[test]
    fn missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "mailspool",
            "--base-dir",
            dir.path().to_str().unwrap(),
            "--config",
            dir.path().join("nope.json").to_str().unwrap(),
            "status",
        ])
        .unwrap();
        assert!(load_app(&cli).is_err());
    }
}

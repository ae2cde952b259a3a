//! itemcmp CLI: HTTP server and one-off comparisons over an item catalog.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// itemcmp: deterministic field-by-field comparison of catalog items
#[derive(Parser, Debug)]
#[command(name = "itemcmp", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Configuration file path (defaults to ./itemcmp.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Compare items from the catalog and print the response envelope
    Compare {
        /// Item ids to compare
        #[arg(required = true)]
        ids: Vec<String>,
        /// Restrict the comparison to a field (repeatable)
        #[arg(short, long = "field")]
        fields: Vec<String>,
        /// Catalog file (overrides catalog.data_file)
        #[arg(long)]
        data_file: Option<PathBuf>,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,
    /// Catalog file (overrides catalog.data_file)
    #[arg(long)]
    data_file: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Write a default itemcmp.toml in the current directory
    Init,
    /// Show the resolved configuration
    Show,
}

/// Install the stderr and JSON file layers. The returned guard flushes the
/// file writer on drop and must live until exit.
fn init_tracing(verbose: u8, quiet: bool) -> WorkerGuard {
    let filter = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr; RUST_LOG wins when set
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "itemcmp", "itemcmp")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "itemcmp.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.quiet);

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Serve(ServeArgs::default()));
    commands::handle_command(command, cli.config.as_deref()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compare_with_fields() {
        let cli = Cli::parse_from([
            "itemcmp", "-v", "compare", "a", "b", "--field", "price", "-f", "rating",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Some(Commands::Compare { ids, fields, .. }) => {
                assert_eq!(ids, vec!["a", "b"]);
                assert_eq!(fields, vec!["price", "rating"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["itemcmp", "serve", "--port", "9090", "-c", "custom.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Some(Commands::Serve(args)) => {
                assert_eq!(args.port, Some(9090));
                assert!(args.host.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::parse_from(["itemcmp", "-q"]);
        assert!(cli.quiet);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_compare_requires_ids() {
        assert!(Cli::try_parse_from(["itemcmp", "compare"]).is_err());
    }
}

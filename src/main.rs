use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use podcrawler::config::Config;
use podcrawler::discovery::{DiscoveryPipeline, DEFAULT_MAX_RESULTS};
use podcrawler::mcp::ToolServer;
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

/// Get the config directory path (~/.config/podcrawler/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("podcrawler"))
}

#[derive(Parser, Debug)]
#[command(
    name = "podcrawler",
    version,
    about = "Discover podcasts on a topic by crawling podcast directories"
)]
struct Args {
    /// Config file (default: ~/.config/podcrawler/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search directories for a topic and print the report
    Discover {
        topic: String,

        /// Stop after this many relevant episodes (also caps feeds attempted)
        #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
        max_results: usize,

        /// Directory base URL to search instead of the configured ones (repeatable)
        #[arg(long = "directory", value_name = "URL")]
        directories: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve the discover_podcasts tool over stdio (JSON-RPC)
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the report or the JSON-RPC stream; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from '{}'", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), ?config, "Loaded config");

    let pipeline = DiscoveryPipeline::new(&config).context("Failed to build HTTP client")?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        }
    });

    match args.command {
        Command::Discover {
            topic,
            max_results,
            directories,
            json,
        } => {
            let directories = (!directories.is_empty()).then_some(directories.as_slice());
            let report = pipeline
                .discover(&topic, max_results, directories, &shutdown)
                .await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialize report")?
                );
            } else {
                println!("{report}");
            }
        }
        Command::Serve => {
            tracing::info!("Serving discover_podcasts on stdio");
            let server = ToolServer::new(pipeline, shutdown);
            server
                .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await
                .context("Tool server I/O failed")?;
        }
    }

    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Map feature information CLI tool
#[derive(Parser)]
#[command(name = "mapinfo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing <tenant>/mapinfoConfig.json
    #[arg(
        short,
        long,
        env = "MAPINFO_CONFIG_PATH",
        default_value = "config",
        global = true
    )]
    config_dir: PathBuf,

    /// Timeout in seconds for each connection attempt and query
    #[arg(long, env = "MAPINFO_QUERY_TIMEOUT_SECS", global = true)]
    query_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up feature information at a position
    Query {
        /// Map position as x,y
        #[arg(long, allow_hyphen_values = true)]
        pos: String,

        /// CRS of the position, e.g. EPSG:3857
        #[arg(long)]
        crs: String,

        /// Tenant whose configuration is used
        #[arg(short, long, default_value = "default")]
        tenant: String,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Validate a tenant configuration and print its SQL
    Check {
        /// Tenant whose configuration is checked
        #[arg(short, long, default_value = "default")]
        tenant: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            pos,
            crs,
            tenant,
            json,
        } => {
            commands::query::run(
                cli.config_dir,
                cli.query_timeout,
                &tenant,
                &pos,
                &crs,
                json,
            )
            .await
        }
        Commands::Check { tenant } => commands::check::run(cli.config_dir, &tenant).await,
    }
}

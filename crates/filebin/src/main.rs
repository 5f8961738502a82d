//! filebin - store and serve blobs over HTTP
//!
//! Subcommands:
//! - `filebin serve` - Run the server
//! - `filebin config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use binconf::FilebinConfig;
use clap::{Args, Parser, Subcommand};
use filebin::{serve, telemetry};

#[derive(Parser)]
#[command(name = "filebin")]
#[command(about = "Store and serve blobs over HTTP")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the blob server
    Serve(ServeArgs),

    /// Print the effective configuration as TOML
    Config {
        /// Config file to use instead of ./filebin.toml
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Address to listen on (e.g., "127.0.0.1:8000")
    #[arg(long)]
    addr: Option<String>,

    /// Root directory for stored and staged blobs
    #[arg(long)]
    datadir: Option<PathBuf>,

    /// Maximum upload size in bytes
    #[arg(long)]
    sizelimit: Option<u64>,

    /// Maximum number of concurrent uploads
    #[arg(long)]
    max_uploads: Option<usize>,

    /// Per read/write timeout for uploads, in seconds
    #[arg(long)]
    io_timeout: Option<u64>,

    /// URL prefix for blob routes
    #[arg(long)]
    mount: Option<String>,

    /// Config file to use instead of ./filebin.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// OTLP gRPC endpoint for OpenTelemetry (e.g., "localhost:4317")
    #[arg(long)]
    otlp_endpoint: Option<String>,
}

impl ServeArgs {
    /// Flags win over every other config source.
    fn apply(self, config: &mut FilebinConfig) {
        if let Some(addr) = self.addr {
            config.bind.addr = addr;
        }
        if let Some(datadir) = self.datadir {
            config.paths.data_dir = datadir;
        }
        if let Some(limit) = self.sizelimit {
            config.limits.size_limit = limit;
        }
        if let Some(max) = self.max_uploads {
            config.limits.max_uploads = max;
        }
        if let Some(secs) = self.io_timeout {
            config.limits.io_timeout_secs = secs;
        }
        if let Some(mount) = self.mount {
            config.bind.mount = mount;
        }
        if let Some(endpoint) = self.otlp_endpoint {
            config.telemetry.otlp_endpoint = Some(endpoint);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let mut config = FilebinConfig::load_from(args.config.as_deref())
                .context("Failed to load configuration")?;
            args.apply(&mut config);

            telemetry::init(
                &config.telemetry.log_level,
                config.telemetry.otlp_endpoint.as_deref(),
            )?;

            serve::run(serve::ServeConfig::from_config(&config)).await?;
        }
        Commands::Config { config } => {
            let (config, sources) = FilebinConfig::load_with_sources_from(config.as_deref())
                .context("Failed to load configuration")?;

            for file in &sources.files {
                println!("# loaded: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env: {}", var);
            }
            print!("{}", config.to_toml());
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tidal_playlist as lib;
use lib::api::tidal::TidalClient;
use lib::api::tidal_auth::AuthManager;
use lib::builder::PlaylistBuilder;
use lib::config::Config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "tidal-playlist", version)]
struct Cli {
    /// Path to config YAML
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with TIDAL and store the token
    Auth {
        /// Use the client-credentials flow instead of the browser login
        #[arg(long)]
        client_credentials: bool,
    },
    /// Create or update the playlist
    Create {
        /// Playlist name
        name: Option<String>,

        /// Playlist name (same as the positional argument)
        #[arg(short = 'n', long = "name", value_name = "NAME")]
        name_flag: Option<String>,

        /// Number of tracks, overrides the configured count
        #[arg(short, long)]
        count: Option<usize>,

        /// Show what would be created without touching TIDAL
        #[arg(long)]
        dry_run: bool,
    },
    /// Print version information
    Version,
}

fn init_logging(verbose: bool, log_dir: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let _ = LogTracer::init();

    // Honor RUST_LOG if set.
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log dir {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "tidal-playlist.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(non_blocking)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set global tracing subscriber")?;
    Ok(guard)
}

async fn run_auth(cfg: &Config, client_credentials: bool) -> Result<()> {
    cfg.validate_credentials().context("invalid config")?;
    let auth = AuthManager::new(&cfg.tidal.client_id, &cfg.tidal.client_secret)?;

    let token = if client_credentials {
        println!("Authenticating with client credentials...");
        auth.login_with_client_credentials().await
    } else {
        auth.login().await
    }
    .context("authentication failed")?;

    println!("\n✓ Authentication successful!");
    println!("Token saved to {}", auth.token_path().display());
    println!("Token expires at: {}", token.expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

async fn run_create(
    mut cfg: Config,
    name: Option<String>,
    name_flag: Option<String>,
    count: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    cfg.override_count(count);
    cfg.validate().context("invalid config")?;

    let playlist_name = cfg.playlist_name(name, name_flag);

    let auth = Arc::new(AuthManager::new(&cfg.tidal.client_id, &cfg.tidal.client_secret)?);
    auth.get_valid_token().await.context("authentication failed")?;

    let client = TidalClient::new(auth, cfg.tidal.country_code.clone())?;
    let mut builder = PlaylistBuilder::new(Arc::new(client), cfg.filters.clone(), cfg.playlist.count);
    let report = builder.build_playlist(&playlist_name, dry_run).await?;

    if let Some(playlist) = &report.playlist {
        tracing::info!(
            "playlist {} ({}) written with {} tracks",
            playlist.title,
            playlist.id,
            report.tracks.len()
        );
    }
    Ok(())
}

/// Load the config and install logging. The guard must outlive the command.
fn setup(config: Option<&Path>, verbose: bool) -> Result<(Config, Option<WorkerGuard>)> {
    let cfg = Config::load(config)?;
    let guard = init_logging(verbose, cfg.log_dir.as_ref())?;
    Ok((cfg, guard))
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            println!("tidal-playlist v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Auth { client_credentials } => {
            let (cfg, _guard) = setup(cli.config.as_deref(), cli.verbose)?;
            run_auth(&cfg, client_credentials).await
        }
        Commands::Create {
            name,
            name_flag,
            count,
            dry_run,
        } => {
            let (cfg, _guard) = setup(cli.config.as_deref(), cli.verbose)?;
            run_create(cfg, name, name_flag, count, dry_run).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

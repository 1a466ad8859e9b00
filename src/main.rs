//! CLI entry point for the departure board.
//!
//! Provides subcommands for serving the departures API, printing the current
//! departures once, and searching the stop directory.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use departure_board::{
    config::{FeedConfig, ReferenceConfig, ServerConfig, StopConfig},
    feed::{FeedSource, FileFeed},
    output::{write_json, write_table},
    reference::{ReferenceData, UNKNOWN},
    server::{AppState, create_router},
    service::{CACHE_TTL, DepartureService},
    stops::WatchedStops,
};
use std::ffi::OsStr;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "departure_board")]
#[command(about = "Upcoming departures for a transit stop from GTFS Realtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the departures API and static assets
    Serve {
        #[command(flatten)]
        feed: FeedConfig,
        #[command(flatten)]
        stops: StopConfig,
        #[command(flatten)]
        reference: ReferenceConfig,
        #[command(flatten)]
        server: ServerConfig,
    },
    /// Fetch the feed once and print departures for the configured stop
    Departures {
        /// Local .pb file or URL to read instead of the configured feed
        #[arg(long, value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,

        #[command(flatten)]
        feed: FeedConfig,
        #[command(flatten)]
        stops: StopConfig,
        #[command(flatten)]
        reference: ReferenceConfig,
    },
    /// List stops whose name contains QUERY
    Stops {
        #[arg(value_name = "QUERY")]
        query: String,

        #[command(flatten)]
        reference: ReferenceConfig,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/departure_board.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("departure_board.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            feed,
            stops,
            reference,
            server,
        } => serve(feed, stops, reference, server).await?,
        Commands::Departures {
            source,
            json,
            feed,
            stops,
            reference,
        } => {
            let reference = load_reference(&reference)?;
            let watched = Arc::new(WatchedStops::resolve(&stops.selector(), &reference.stops));
            let source: Arc<dyn FeedSource> = match source {
                Some(url) if url.starts_with("http") => feed.source_for(&url)?,
                Some(path) => Arc::new(FileFeed::new(path)),
                None => feed.source()?,
            };

            let service = DepartureService::new(reference, watched, source, CACHE_TTL);
            let board = service.departures().await?;

            let stdout = std::io::stdout().lock();
            if json {
                write_json(stdout, &board)?;
            } else {
                write_table(stdout, &board)?;
            }
        }
        Commands::Stops { query, reference } => {
            let reference = load_reference(&reference)?;
            let matches = reference.stops.search(&query);
            if matches.is_empty() {
                bail!("no stops found for \"{query}\"");
            }
            for (stop_id, stop) in matches {
                println!(
                    "{stop_id}\t{}\t{}",
                    stop.name.as_deref().unwrap_or(""),
                    stop.platform.as_deref().unwrap_or(UNKNOWN)
                );
            }
        }
    }

    Ok(())
}

fn load_reference(config: &ReferenceConfig) -> Result<Arc<ReferenceData>> {
    let data = ReferenceData::load(&config.gtfs_dir).with_context(|| {
        format!(
            "failed to load reference data from {}",
            config.gtfs_dir.display()
        )
    })?;
    Ok(Arc::new(data))
}

/// Loads reference data, resolves the watched stops and serves HTTP until
/// the process is stopped.
#[tracing::instrument(skip_all, fields(port = server.port))]
async fn serve(
    feed: FeedConfig,
    stops: StopConfig,
    reference: ReferenceConfig,
    server: ServerConfig,
) -> Result<()> {
    let reference = load_reference(&reference)?;
    let watched = Arc::new(WatchedStops::resolve(&stops.selector(), &reference.stops));

    if !feed.auth().requires_auth() {
        warn!("API_KEY not set, feed requests are sent without a credential");
    }

    let service = DepartureService::new(reference, watched, feed.source()?, server.cache_ttl());
    let app = create_router(AppState::new(service), &server.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        %addr,
        static_dir = %server.static_dir.display(),
        cache_ttl_secs = server.cache_ttl_secs,
        "Server running"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

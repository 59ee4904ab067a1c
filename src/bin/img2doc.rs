//! HTTP server binary for img2doc.
//!
//! Maps CLI flags and environment to a `ServerConfig`, creates the data
//! directories and serves the router until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use img2doc::{build_router, AppState, ServerConfig, DEFAULT_PORT};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENDPOINTS:
  GET  /            greeting
  POST /pdf         multipart field "images" (1..n files) → URL of a PDF, one page per image
  GET  /pdf/{id}    download the PDF
  POST /zip         multipart field "images" (1..n files) → URL of a ZIP of the originals
  GET  /zip/{id}    download the ZIP

EXAMPLES:
  # Serve on the default port (5000), data under the working directory
  img2doc

  # Keep uploads and artifacts under /var/lib/img2doc
  img2doc --data-dir /var/lib/img2doc --port 8080

  # Convert two images
  curl -F images=@scan1.jpg -F images=@scan2.png http://localhost:5000/pdf

ENVIRONMENT VARIABLES:
  PORT                     Listening port (also read from .env)
  HOST                     Bind address
  IMG2DOC_DATA_DIR         Root for the files/, pdf/ and zip/ directories
  IMG2DOC_BODY_LIMIT       Maximum request body in bytes
  IMG2DOC_NO_TRUST_PROXY   Ignore X-Forwarded-Proto / X-Forwarded-Host
  RUST_LOG                 Log filter, overrides --verbose / --quiet
"#;

/// Convert uploaded images into a PDF or a ZIP archive over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "img2doc",
    version,
    about = "Convert uploaded images into a PDF or a ZIP archive over HTTP",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Listening port.
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Bind address.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Root for the files/, pdf/ and zip/ directories. Default: working directory.
    #[arg(long, env = "IMG2DOC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Reject request bodies larger than this many bytes. Default: unlimited.
    #[arg(long, env = "IMG2DOC_BODY_LIMIT")]
    body_limit: Option<usize>,

    /// Build response URLs from the connection instead of X-Forwarded-* headers.
    #[arg(long, env = "IMG2DOC_NO_TRUST_PROXY")]
    no_trust_proxy: bool,

    /// Debug-level logging.
    #[arg(short, long, env = "IMG2DOC_VERBOSE")]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, env = "IMG2DOC_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = ServerConfig::builder()
        .host(cli.host)
        .port(cli.port)
        .trust_proxy(!cli.no_trust_proxy)
        .body_limit(cli.body_limit);
    if let Some(ref root) = cli.data_dir {
        builder = builder.data_dir(root);
    }
    let config = builder.build().context("Invalid configuration")?;
    tracing::debug!("{:?}", config);

    // ── Directories + router ─────────────────────────────────────────────
    let state = AppState::from_config(&config).context("Failed to create data directories")?;
    let app = build_router(state, &config);

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = config.bind_address();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server is listening on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}

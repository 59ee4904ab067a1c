//! Server configuration.
//!
//! All process-wide settings live in [`ServerConfig`], built via
//! [`ServerConfigBuilder`]. The three data directories are plain paths here;
//! [`ServerConfig::ensure_directories`] creates them once at start-up and the
//! components receive their directory at construction time rather than
//! reaching for ambient global state.

use crate::error::ConverterError;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default listening port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 5000;

/// Directory names used relative to the data root.
pub const UPLOADS_DIR_NAME: &str = "files";
pub const PDF_DIR_NAME: &str = "pdf";
pub const ZIP_DIR_NAME: &str = "zip";

/// Configuration for the conversion server.
///
/// # Example
/// ```rust
/// use img2doc::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .data_dir("/var/lib/img2doc")
///     .build()
///     .unwrap();
/// assert!(config.pdf_dir.ends_with("pdf"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind. Default: `0.0.0.0`.
    pub host: IpAddr,

    /// Listening port. Default: 5000.
    pub port: u16,

    /// Staging directory for uploaded originals. Default: `files`.
    pub uploads_dir: PathBuf,

    /// Output directory for generated PDFs. Default: `pdf`.
    pub pdf_dir: PathBuf,

    /// Output directory for generated ZIP archives. Default: `zip`.
    pub zip_dir: PathBuf,

    /// Build response URLs from `X-Forwarded-Proto` / `X-Forwarded-Host`.
    /// Default: true.
    ///
    /// The service is normally deployed behind a reverse proxy that
    /// terminates TLS; without this the returned links would say `http`.
    pub trust_proxy: bool,

    /// Maximum request body size in bytes. Default: None (unlimited).
    pub body_limit: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            uploads_dir: PathBuf::from(UPLOADS_DIR_NAME),
            pdf_dir: PathBuf::from(PDF_DIR_NAME),
            zip_dir: PathBuf::from(ZIP_DIR_NAME),
            trust_proxy: true,
            body_limit: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind_address())
            .field("uploads_dir", &self.uploads_dir)
            .field("pdf_dir", &self.pdf_dir)
            .field("zip_dir", &self.zip_dir)
            .field("trust_proxy", &self.trust_proxy)
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Create the uploads, PDF and ZIP directories if they are missing.
    ///
    /// Idempotent. Call once during process initialisation.
    pub fn ensure_directories(&self) -> Result<(), ConverterError> {
        for dir in [&self.uploads_dir, &self.pdf_dir, &self.zip_dir] {
            std::fs::create_dir_all(dir).map_err(|e| ConverterError::WriteFailed {
                path: dir.clone(),
                source: e,
            })?;
            debug!("Directory ready: {}", dir.display());
        }
        Ok(())
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Place all three directories under `root` (`root/files`, `root/pdf`,
    /// `root/zip`).
    pub fn data_dir(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.config.uploads_dir = root.join(UPLOADS_DIR_NAME);
        self.config.pdf_dir = root.join(PDF_DIR_NAME);
        self.config.zip_dir = root.join(ZIP_DIR_NAME);
        self
    }

    pub fn uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.uploads_dir = dir.into();
        self
    }

    pub fn pdf_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdf_dir = dir.into();
        self
    }

    pub fn zip_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.zip_dir = dir.into();
        self
    }

    pub fn trust_proxy(mut self, v: bool) -> Self {
        self.config.trust_proxy = v;
        self
    }

    pub fn body_limit(mut self, bytes: Option<usize>) -> Self {
        self.config.body_limit = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, ConverterError> {
        let c = &self.config;
        let dirs = [&c.uploads_dir, &c.pdf_dir, &c.zip_dir];
        if dirs.iter().any(|d| d.as_os_str().is_empty()) {
            return Err(ConverterError::InvalidConfig(
                "data directories must not be empty paths".into(),
            ));
        }
        if c.uploads_dir == c.pdf_dir || c.uploads_dir == c.zip_dir || c.pdf_dir == c.zip_dir {
            return Err(ConverterError::InvalidConfig(
                "uploads, pdf and zip directories must be distinct".into(),
            ));
        }
        if c.body_limit == Some(0) {
            return Err(ConverterError::InvalidConfig(
                "body limit must be at least 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

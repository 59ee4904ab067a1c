//! # img2doc
//!
//! A small HTTP service that turns uploaded images into a single PDF (one
//! page per image) or bundles arbitrary uploads into a ZIP archive, and
//! hands back a short URL from which the result can be downloaded.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /pdf | /zip  (multipart, field "images")
//!  │
//!  ├─ 1. Sanitize  original name → {millis}-{kebab-name}{ext}
//!  ├─ 2. Stage     stream each part into files/
//!  ├─ 3. Mint      8-char [0-9a-z] identifier
//!  ├─ 4. Assemble  lopdf page per image | deflated zip entry per file
//!  │               (spawn_blocking, temp file + rename)
//!  └─ 5. Respond   {scheme}://{host}/{pdf|zip}/{id}
//!
//! GET /pdf/{id} | /zip/{id}  → streamed attachment, or 404
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use img2doc::{build_router, AppState, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().port(5000).build()?;
//!     let state = AppState::from_config(&config)?;
//!     let app = build_router(state, &config);
//!
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2doc` binary (clap + anyhow + dotenv + tracing-subscriber) |
//!
//! Disable `cli` to embed the router in another axum application:
//! ```toml
//! img2doc = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServerConfig, ServerConfigBuilder, DEFAULT_PORT};
pub use convert::{convert_to_pdf, convert_to_zip};
pub use error::ConverterError;
pub use pipeline::sanitize::sanitize;
pub use pipeline::stage::{StagedFile, UploadStager};
pub use server::{base_url, build_router, AppState};
pub use store::{Artifact, ArtifactId, ArtifactStore, Namespace};

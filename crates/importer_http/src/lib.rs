//! # Importer HTTP
//!
//! `importer_http` implements [`importer_core::Registry`] against a registry speaking the [OCI
//! Distribution API](https://github.com/opencontainers/distribution-spec) over plain HTTP.
//!
//! ```no_run
//! use importer_core::Importer;
//! use importer_http::HttpRegistryConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = HttpRegistryConfig::new("http://localhost:5000").new_client()?;
//! let report = Importer::new(registry)
//!     .import(&std::path::PathBuf::from("export.tar"))
//!     .await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```
mod client;
pub use client::HttpRegistry;

mod config;
pub use config::HttpRegistryConfig;

pub mod errors;
pub use errors::{Error, Result};

mod location;

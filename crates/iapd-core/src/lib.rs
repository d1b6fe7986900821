//! IAPD Core - Foundation crate for the IAPD crawler.
//!
//! This crate provides the shared domain types, error handling and configuration
//! management that the session and scanner crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Search queries, result records and filing bundles
//!
//! # Example
//!
//! ```rust
//! use iapd_core::{AppConfig, SearchQuery, SearchScope};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//!
//! let scope: SearchScope = "firm".parse()?;
//! let query = SearchQuery::new("Vanguard", scope).with_zip_code("19355");
//! assert_eq!(query.zip_radius_miles(), "5");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, DownloadConfig, RetryConfig, SessionConfig};
pub use error::{ConfigError, ConfigResult, IapdError, Result};
pub use types::{
    Crd, FilingBundle, IndividualReport, ProfileTarget, RegistrationType, SearchQuery,
    SearchResultEntry, SearchScope,
};

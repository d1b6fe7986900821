//! IAPD Scanner - Search crawler and filing resolver for adviserinfo.sec.gov.
//!
//! This crate replays the registry's ASP.NET postback search form across
//! paginated results, parses result cards into typed records, and resolves
//! the disclosure documents linked from firm and individual profiles.
//!
//! # Features
//!
//! - Lazy, pull-based pagination over one polite session
//! - Result card parsing with an optional on-site filter
//! - ADV Part 1 and Part 2 brochure resolution, including the brochure listing hop
//! - Downloads named by URL hash, with a command fallback on 502 responses
//! - Retry with backoff for rate-limited and unavailable responses
//!
//! # Example
//!
//! ```rust,ignore
//! use iapd_core::{AppConfig, ProfileTarget, SearchQuery, SearchScope};
//! use iapd_scanner::{IapdClient, ResultFilter};
//! use futures::StreamExt;
//!
//! let config = AppConfig::load_with_env()?;
//! let mut client = IapdClient::from_config(&config)?;
//!
//! let pages: Vec<_> = client
//!     .search(SearchQuery::new("Vanguard", SearchScope::Firm), ResultFilter::All)
//!     .into_stream()
//!     .collect()
//!     .await;
//!
//! let target = ProfileTarget::from_parts(Some("105958"), None)?;
//! let filings = client.get_firm_filings(&target, true, None).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod client;
#[allow(missing_docs)]
pub mod download;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod filter;
#[allow(missing_docs)]
pub mod parser;
#[allow(missing_docs)]
pub mod postback;
#[allow(missing_docs)]
pub mod resolver;
#[allow(missing_docs)]
pub mod url_builder;

// Re-export commonly used types
pub use client::IapdClient;
pub use download::{local_file_name, CommandFallback, Downloader, FallbackFetcher};
pub use error::{Result, ScanError};
pub use filter::ResultFilter;
pub use parser::ResultParser;
pub use postback::{DriverState, FormState, PageTokens, PostbackDriver, SearchPages};
pub use resolver::{FilingResolver, FirmFilingLinks};
pub use url_builder::{build_profile_url, BASE_URL};

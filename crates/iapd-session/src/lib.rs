//! Polite HTTP session for the IAPD crawler.
//!
//! Provides the transport seam used by every network call, a rate-limited
//! client that spaces requests by a randomized delay, and the retry policy
//! applied to transient HTTP failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use iapd_core::AppConfig;
//! use iapd_session::{RateLimitedClient, ReqwestTransport};
//! use std::sync::Arc;
//!
//! let config = AppConfig::load_with_env()?;
//! let transport = ReqwestTransport::new(&config.session)?;
//! let client = RateLimitedClient::new(Arc::new(transport), &config.session);
//!
//! let page = client.get("https://adviserinfo.sec.gov/IAPD/default.aspx").await?;
//! println!("{}", page.text());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod retry;
pub mod session;
pub mod transport;

pub use error::{Result, SessionError};
pub use retry::{Backoff, RetryPolicy, Retryable};
pub use session::RateLimitedClient;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

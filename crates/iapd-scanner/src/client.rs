//! Public entry point tying the search driver, resolver and downloader to one
//! rate-limited session.

use crate::download::{CommandFallback, Downloader, FallbackFetcher};
use crate::error::Result;
use crate::filter::ResultFilter;
use crate::postback::{PostbackDriver, SearchPages};
use crate::resolver::FilingResolver;
use iapd_core::{
    AppConfig, FilingBundle, IapdError, IndividualReport, ProfileTarget, SearchQuery,
};
use iapd_session::{HttpTransport, RateLimitedClient, ReqwestTransport, RetryPolicy};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Crawler for adviserinfo.sec.gov.
///
/// All requests go through one rate-limited session, one at a time.
///
/// # Example
///
/// ```rust,ignore
/// use iapd_core::{AppConfig, SearchQuery, SearchScope};
/// use iapd_scanner::{IapdClient, ResultFilter};
///
/// let config = AppConfig::load_with_env()?;
/// let mut client = IapdClient::from_config(&config)?;
///
/// let mut pages = client.search(
///     SearchQuery::new("Vanguard", SearchScope::Firm),
///     ResultFilter::CanonicalHostOnly,
/// );
/// while let Some(page) = pages.next_page().await {
///     for entry in page {
///         println!("{} {:?}", entry.name, entry.crd);
///     }
/// }
/// ```
pub struct IapdClient {
    driver: PostbackDriver,
    resolver: FilingResolver,
    downloader: Downloader,
    retry: RetryPolicy,
    default_output_dir: Option<PathBuf>,
}

impl IapdClient {
    /// Build a client over a real HTTP transport.
    ///
    /// The configuration is validated first; unusable delays or retry
    /// settings are rejected as [`crate::ScanError::InvalidArgument`].
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate().map_err(IapdError::from)?;
        let transport = ReqwestTransport::new(&config.session)?;
        Ok(Self::with_transport(
            config,
            Arc::new(transport),
            Arc::new(CommandFallback::from_config(&config.download)),
        ))
    }

    /// Build a client over an explicit transport and 502 fallback.
    pub fn with_transport(
        config: &AppConfig,
        transport: Arc<dyn HttpTransport>,
        fallback: Arc<dyn FallbackFetcher>,
    ) -> Self {
        let session = Arc::new(RateLimitedClient::new(transport, &config.session));
        Self {
            driver: PostbackDriver::new(session.clone()),
            resolver: FilingResolver::new(session.clone()),
            downloader: Downloader::new(session, fallback),
            retry: RetryPolicy::from_config(&config.retry),
            default_output_dir: config.download.output_dir.clone(),
        }
    }

    /// Lazily page through the results of a query.
    pub fn search(&mut self, query: SearchQuery, filter: ResultFilter) -> SearchPages<'_> {
        tracing::info!(term = query.term(), scope = %query.scope(), "Starting search");
        SearchPages::new(&mut self.driver, &self.retry, query, filter)
    }

    /// Resolve, and optionally download, a firm's ADV Part 1 and brochure.
    ///
    /// Returns `None` when the lookup failed; the failure has been logged.
    pub async fn get_firm_filings(
        &self,
        target: &ProfileTarget,
        download: bool,
        output_dir: Option<&Path>,
    ) -> Option<FilingBundle> {
        self.retry
            .run(None, || async move {
                self.firm_filings(target, download, output_dir).await.map(Some)
            })
            .await
    }

    /// Resolve, and optionally download, an individual's detailed report.
    ///
    /// Returns `None` when the lookup failed; the failure has been logged.
    pub async fn get_individual_report(
        &self,
        target: &ProfileTarget,
        download: bool,
        output_dir: Option<&Path>,
    ) -> Option<IndividualReport> {
        self.retry
            .run(None, || async move {
                self.individual_report(target, download, output_dir)
                    .await
                    .map(Some)
            })
            .await
    }

    async fn firm_filings(
        &self,
        target: &ProfileTarget,
        download: bool,
        output_dir: Option<&Path>,
    ) -> Result<FilingBundle> {
        let links = self.resolver.resolve_firm_filings(target).await?;
        let mut bundle = FilingBundle {
            adv_form_url: links.adv_form_url,
            brochure_url: links.brochure_url,
            ..FilingBundle::default()
        };

        if download {
            let dir = self.output_dir(output_dir);
            if let Some(url) = &bundle.adv_form_url {
                bundle.adv_form_local_path = Some(self.downloader.download(url, dir).await?);
            }
            if let Some(url) = &bundle.brochure_url {
                bundle.brochure_local_path = Some(self.downloader.download(url, dir).await?);
            }
        }
        Ok(bundle)
    }

    async fn individual_report(
        &self,
        target: &ProfileTarget,
        download: bool,
        output_dir: Option<&Path>,
    ) -> Result<IndividualReport> {
        let report_url = self.resolver.resolve_individual_report(target).await?;
        let local_path = match (&report_url, download) {
            (Some(url), true) => Some(self.downloader.download(url, self.output_dir(output_dir)).await?),
            _ => None,
        };
        Ok(IndividualReport {
            report_url,
            local_path,
        })
    }

    fn output_dir<'a>(&'a self, requested: Option<&'a Path>) -> Option<&'a Path> {
        requested.or(self.default_output_dir.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iapd_core::Crd;
    use iapd_session::mock::ScriptedTransport;

    fn quiet_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.session.min_delay_secs = 0.0;
        config.session.max_delay_secs = 0.0;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_firm_filings_retried_after_unavailable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_status(503)
            .push_page(include_str!("../tests/fixtures/firm_profile_direct.html"));
        let client = IapdClient::with_transport(
            &quiet_config(),
            transport.clone(),
            Arc::new(CommandFallback::new(Vec::new())),
        );

        let target = ProfileTarget::Crd(Crd::new("142586").unwrap());
        let bundle = client.get_firm_filings(&target, false, None).await.unwrap();

        assert!(bundle.adv_form_url.is_some());
        assert!(bundle.brochure_url.is_some());
        assert_eq!(bundle.adv_form_local_path, None);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_download_is_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        let profile = include_str!("../tests/fixtures/firm_profile_direct.html");
        transport
            .push_page(profile)
            .push_status(429)
            .push_page(profile)
            .push_page(b"%PDF-adv".to_vec())
            .push_page(b"%PDF-brochure".to_vec());
        let client = IapdClient::with_transport(
            &quiet_config(),
            transport.clone(),
            Arc::new(CommandFallback::new(Vec::new())),
        );
        let dir = tempfile::TempDir::new().unwrap();

        let target = ProfileTarget::Crd(Crd::new("142586").unwrap());
        let bundle = client
            .get_firm_filings(&target, true, Some(dir.path()))
            .await
            .expect("retried after 429");

        assert!(bundle.adv_form_url.is_some());
        assert!(bundle.brochure_url.is_some());
        let adv = bundle.adv_form_local_path.unwrap();
        assert_eq!(std::fs::read(adv).unwrap(), b"%PDF-adv");
        assert_eq!(transport.requests().len(), 5);
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn test_from_config_rejects_invalid_settings() {
        let mut config = AppConfig::default();
        config.session.min_delay_secs = f64::INFINITY;

        let err = IapdClient::from_config(&config).err().expect("invalid config");
        assert!(matches!(err, crate::ScanError::InvalidArgument(ref msg) if msg.contains("min_delay_secs")));

        assert!(IapdClient::from_config(&AppConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_not_found_profile_is_none() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(404);
        let client = IapdClient::with_transport(
            &quiet_config(),
            transport.clone(),
            Arc::new(CommandFallback::new(Vec::new())),
        );

        let target = ProfileTarget::Crd(Crd::new("1").unwrap());
        assert_eq!(client.get_individual_report(&target, true, None).await, None);
        assert_eq!(transport.requests().len(), 1);
    }
}

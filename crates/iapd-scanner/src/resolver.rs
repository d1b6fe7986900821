use crate::error::Result;
use crate::url_builder::{absolutize, build_profile_url, BROCHURE_LISTING_PREFIX};
use iapd_core::{ProfileTarget, SearchScope};
use iapd_session::RateLimitedClient;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;

fn anchor_selector(id: &str) -> Selector {
    Selector::parse(&format!(r#"a[id="{id}"]"#)).expect("anchor id selector is valid")
}

static ADV_FORM_LINK: Lazy<Selector> = Lazy::new(|| anchor_selector("ctl00_cphMain_landing_pdfLink"));

static BROCHURE_LINK: Lazy<Selector> =
    Lazy::new(|| anchor_selector("ctl00_cphMain_landing_p2BrochureLink"));

static FIRST_LISTED_BROCHURE: Lazy<Selector> =
    Lazy::new(|| anchor_selector("ctl00_cphMain_part2_dgBrchr_ctrl0_hlBrochureName"));

static DETAILED_REPORT_LINK: Lazy<Selector> =
    Lazy::new(|| anchor_selector("ctl00_cphMain_btnGetReport"));

/// Document links found on a firm profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmFilingLinks {
    pub adv_form_url: Option<String>,
    pub brochure_url: Option<String>,
}

/// Reads document links off profile pages.
pub struct FilingResolver {
    client: Arc<RateLimitedClient>,
}

impl FilingResolver {
    pub fn new(client: Arc<RateLimitedClient>) -> Self {
        Self { client }
    }

    /// ADV Part 1 and Part 2 links for a firm.
    ///
    /// When the profile only links to the brochure listing, the listing is
    /// fetched once and its first brochure is used.
    pub async fn resolve_firm_filings(&self, target: &ProfileTarget) -> Result<FirmFilingLinks> {
        let profile_url = build_profile_url(SearchScope::Firm, target);
        let body = self.client.get(&profile_url).await?.text();

        let (adv_href, brochure_href) = {
            let document = Html::parse_document(&body);
            (
                anchor_href(&document, &ADV_FORM_LINK),
                anchor_href(&document, &BROCHURE_LINK),
            )
        };

        let brochure_href = match brochure_href {
            Some(href) if href.starts_with(BROCHURE_LISTING_PREFIX) => {
                self.first_listed_brochure(&href).await?
            }
            other => other,
        };

        let links = FirmFilingLinks {
            adv_form_url: adv_href.as_deref().and_then(absolutize),
            brochure_url: brochure_href.as_deref().and_then(absolutize),
        };
        tracing::debug!(
            profile = %profile_url,
            adv_form = links.adv_form_url.is_some(),
            brochure = links.brochure_url.is_some(),
            "Resolved firm filings"
        );
        Ok(links)
    }

    /// Detailed report link for an individual.
    pub async fn resolve_individual_report(&self, target: &ProfileTarget) -> Result<Option<String>> {
        let profile_url = build_profile_url(SearchScope::Individual, target);
        let body = self.client.get(&profile_url).await?.text();

        let href = anchor_href(&Html::parse_document(&body), &DETAILED_REPORT_LINK);
        let report_url = href.as_deref().and_then(absolutize);
        if report_url.is_none() {
            tracing::info!(profile = %profile_url, "No detailed report link on profile");
        }
        Ok(report_url)
    }

    async fn first_listed_brochure(&self, listing_href: &str) -> Result<Option<String>> {
        let Some(listing_url) = absolutize(listing_href) else {
            return Ok(None);
        };
        tracing::debug!(listing = %listing_url, "Following brochure listing");

        let body = self.client.get(&listing_url).await?.text();
        Ok(anchor_href(
            &Html::parse_document(&body),
            &FIRST_LISTED_BROCHURE,
        ))
    }
}

fn anchor_href(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use iapd_core::Crd;
    use iapd_session::mock::ScriptedTransport;
    use std::time::Duration;

    const FIRM_PROFILE: &str = include_str!("../tests/fixtures/firm_profile.html");
    const FIRM_PROFILE_DIRECT: &str = include_str!("../tests/fixtures/firm_profile_direct.html");
    const FIRM_PROFILE_NO_LINKS: &str =
        include_str!("../tests/fixtures/firm_profile_no_links.html");
    const BROCHURE_LISTING: &str = include_str!("../tests/fixtures/brochure_listing.html");
    const INDIVIDUAL_PROFILE: &str = include_str!("../tests/fixtures/individual_profile.html");

    fn resolver(transport: &Arc<ScriptedTransport>) -> FilingResolver {
        let client = RateLimitedClient::with_delays(transport.clone(), Duration::ZERO, Duration::ZERO);
        FilingResolver::new(Arc::new(client))
    }

    fn crd(value: &str) -> ProfileTarget {
        ProfileTarget::Crd(Crd::new(value).unwrap())
    }

    #[tokio::test]
    async fn test_brochure_listing_followed_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_page(FIRM_PROFILE).push_page(BROCHURE_LISTING);

        let links = resolver(&transport)
            .resolve_firm_filings(&crd("105958"))
            .await
            .unwrap();

        assert_eq!(
            links.adv_form_url.as_deref(),
            Some("https://adviserinfo.sec.gov/IAPD/content/ViewForm/crd_iapd_stream_pdf.aspx?ORG_PK=105958")
        );
        assert_eq!(
            links.brochure_url.as_deref(),
            Some("https://adviserinfo.sec.gov/IAPD/Content/Common/crd_iapd_Brochure.aspx?BRCHR_VRSN_ID=598765")
        );

        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].url, "https://adviserinfo.sec.gov/Firm/105958");
        assert_eq!(
            sent[1].url,
            "https://adviserinfo.sec.gov/IAPD/Part2Brochures.aspx?ORG_PK=105958"
        );
    }

    #[tokio::test]
    async fn test_direct_brochure_needs_no_extra_hop() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_page(FIRM_PROFILE_DIRECT);

        let links = resolver(&transport)
            .resolve_firm_filings(&ProfileTarget::Url(
                "https://adviserinfo.sec.gov/Firm/142586".to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(
            links.brochure_url.as_deref(),
            Some("https://adviserinfo.sec.gov/IAPD/Content/Common/crd_iapd_Brochure.aspx?BRCHR_VRSN_ID=612345")
        );
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_links_are_none() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_page(FIRM_PROFILE_NO_LINKS);

        let links = resolver(&transport)
            .resolve_firm_filings(&crd("999"))
            .await
            .unwrap();
        assert_eq!(links, FirmFilingLinks::default());
    }

    #[tokio::test]
    async fn test_individual_report() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_page(INDIVIDUAL_PROFILE).push_page(FIRM_PROFILE_NO_LINKS);
        let resolver = resolver(&transport);

        let report = resolver
            .resolve_individual_report(&crd("2712930"))
            .await
            .unwrap();
        assert_eq!(
            report.as_deref(),
            Some("https://files.adviserinfo.sec.gov/IAPD/Content/Common/crd_iapd_Indvl.aspx?INDVL_PK=2712930")
        );
        assert_eq!(
            transport.requests()[0].url,
            "https://adviserinfo.sec.gov/Individual/2712930"
        );

        let missing = resolver.resolve_individual_report(&crd("1")).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_profile_status_error_propagates() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(503);

        let err = resolver(&transport)
            .resolve_firm_filings(&crd("105958"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Http(ref e) if e.status_code() == Some(503)));
    }
}

use iapd_core::{ProfileTarget, SearchScope};
use url::Url;

pub const BASE_URL: &str = "https://adviserinfo.sec.gov";
pub const CANONICAL_HOST: &str = "adviserinfo.sec.gov";
pub const LANDING_URL: &str = "https://adviserinfo.sec.gov/IAPD/default.aspx";
pub const SEARCH_URL: &str = "https://adviserinfo.sec.gov/IAPD/IAPDSearch.aspx";

/// Brochure links under this path point at a listing page, not a document.
pub const BROCHURE_LISTING_PREFIX: &str = "/IAPD/Part2Brochures.aspx";

/// Profile page URL for a firm or individual target.
pub fn build_profile_url(scope: SearchScope, target: &ProfileTarget) -> String {
    match target {
        ProfileTarget::Url(url) => url.clone(),
        ProfileTarget::Crd(crd) => match scope {
            SearchScope::Firm => format!("{BASE_URL}/Firm/{crd}"),
            SearchScope::Individual => format!("{BASE_URL}/Individual/{crd}"),
        },
    }
}

/// Result cards link to profiles either absolutely or with a site-relative path.
pub fn normalize_result_href(href: &str) -> String {
    if href.starts_with("/Firm") || href.starts_with("/Individual") {
        format!("{BASE_URL}{href}")
    } else {
        href.to_string()
    }
}

/// Resolve a document href against the site root. Blank hrefs resolve to nothing.
pub fn absolutize(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(href) {
        return Some(url.to_string());
    }
    Url::parse(BASE_URL)
        .and_then(|base| base.join(href))
        .map(String::from)
        .ok()
}

/// Whether a URL is hosted on the registry itself.
pub fn is_canonical_host(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|host| host.eq_ignore_ascii_case(CANONICAL_HOST)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iapd_core::Crd;

    #[test]
    fn test_build_profile_url_from_crd() {
        let target = ProfileTarget::Crd(Crd::new("105958").unwrap());
        assert_eq!(
            build_profile_url(SearchScope::Firm, &target),
            "https://adviserinfo.sec.gov/Firm/105958"
        );
        assert_eq!(
            build_profile_url(SearchScope::Individual, &target),
            "https://adviserinfo.sec.gov/Individual/105958"
        );
    }

    #[test]
    fn test_build_profile_url_passes_url_through() {
        let target = ProfileTarget::Url("https://adviserinfo.sec.gov/Firm/1".to_string());
        assert_eq!(
            build_profile_url(SearchScope::Individual, &target),
            "https://adviserinfo.sec.gov/Firm/1"
        );
    }

    #[test]
    fn test_normalize_result_href() {
        assert_eq!(
            normalize_result_href("/Firm/105958"),
            "https://adviserinfo.sec.gov/Firm/105958"
        );
        assert_eq!(
            normalize_result_href("/Individual/42"),
            "https://adviserinfo.sec.gov/Individual/42"
        );
        assert_eq!(
            normalize_result_href("https://brokercheck.finra.org/firm/7"),
            "https://brokercheck.finra.org/firm/7"
        );
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize("/IAPD/content/ViewForm/crd_iapd_stream_pdf.aspx?ORG_PK=105958"),
            Some(
                "https://adviserinfo.sec.gov/IAPD/content/ViewForm/crd_iapd_stream_pdf.aspx?ORG_PK=105958"
                    .to_string()
            )
        );
        assert_eq!(
            absolutize("https://files.adviserinfo.sec.gov/brochure.pdf"),
            Some("https://files.adviserinfo.sec.gov/brochure.pdf".to_string())
        );
        assert_eq!(absolutize(""), None);
        assert_eq!(absolutize("   "), None);
    }

    #[test]
    fn test_canonical_host() {
        assert!(is_canonical_host("https://adviserinfo.sec.gov/Firm/1"));
        assert!(!is_canonical_host("https://brokercheck.finra.org/firm/1"));
        assert!(!is_canonical_host("https://adviserinfo.sec.gov.evil.example/Firm/1"));
        assert!(!is_canonical_host("/Firm/1"));
    }
}

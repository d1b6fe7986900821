//! Shared types used across the IAPD crawler.
//!
//! This module defines the search inputs, the records extracted from search
//! results, and the document bundles resolved from profile pages.

use crate::error::IapdError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

/// Which registry a search runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// Investment adviser firms
    Firm,
    /// Individual representatives
    Individual,
}

impl SearchScope {
    /// Lowercase name as accepted by [`FromStr`].
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firm => "firm",
            Self::Individual => "individual",
        }
    }
}

impl FromStr for SearchScope {
    type Err = IapdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firm" => Ok(Self::Firm),
            "individual" => Ok(Self::Individual),
            other => Err(IapdError::Validation(format!(
                "invalid search scope '{other}', must be firm or individual"
            ))),
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Newtype for Central Registration Depository numbers.
///
/// CRD numbers are non-empty strings of ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crd(String);

impl Crd {
    /// Create a new `Crd` from a string, trimming surrounding whitespace.
    ///
    /// # Errors
    /// Returns error if the value is not made of digits only.
    pub fn new(crd: impl Into<String>) -> Result<Self, IapdError> {
        let crd = crd.into().trim().to_string();
        Self::validate(&crd)?;
        Ok(Self(crd))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(crd: &str) -> Result<(), IapdError> {
        static CRD_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = CRD_REGEX.get_or_init(|| Regex::new(r"^\d+$").expect("valid regex"));

        if regex.is_match(crd) {
            Ok(())
        } else {
            Err(IapdError::Validation(format!(
                "invalid CRD number: must contain digits only, got '{crd}'"
            )))
        }
    }
}

impl fmt::Display for Crd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Profile page to resolve documents from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileTarget {
    /// Formatted into the canonical profile URL for the scope
    Crd(Crd),
    /// Explicit profile URL
    Url(String),
}

impl ProfileTarget {
    /// Build a target from an optional CRD number and an optional URL.
    ///
    /// The URL wins when both are supplied.
    ///
    /// # Errors
    /// Returns a validation error when neither is supplied or the CRD is malformed.
    pub fn from_parts(crd: Option<&str>, url: Option<&str>) -> Result<Self, IapdError> {
        match (crd, url) {
            (_, Some(url)) if !url.trim().is_empty() => Ok(Self::Url(url.trim().to_string())),
            (Some(crd), _) if !crd.trim().is_empty() => Ok(Self::Crd(Crd::new(crd)?)),
            _ => Err(IapdError::Validation(
                "CRD number or URL required".to_string(),
            )),
        }
    }
}

impl From<Crd> for ProfileTarget {
    fn from(crd: Crd) -> Self {
        Self::Crd(crd)
    }
}

/// Default search radius around a ZIP code, in miles.
pub const DEFAULT_ZIP_RADIUS_MILES: &str = "5";

/// One search submission.
///
/// # Example
///
/// ```rust
/// use iapd_core::{SearchQuery, SearchScope};
///
/// let query = SearchQuery::new("Jane Smith", SearchScope::Individual)
///     .with_zip_code("10001")
///     .with_zip_radius("25")
///     .with_employer("Acme Advisors");
/// assert_eq!(query.employer_filter(), Some("Acme Advisors"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    term: String,
    scope: SearchScope,
    zip_code: Option<String>,
    zip_radius_miles: String,
    employer_filter: Option<String>,
}

impl SearchQuery {
    /// Create a query with the default ZIP radius and no filters.
    pub fn new(term: impl Into<String>, scope: SearchScope) -> Self {
        Self {
            term: term.into(),
            scope,
            zip_code: None,
            zip_radius_miles: DEFAULT_ZIP_RADIUS_MILES.to_string(),
            employer_filter: None,
        }
    }

    /// Restrict results to the area around a ZIP code.
    #[must_use]
    pub fn with_zip_code(mut self, zip_code: impl Into<String>) -> Self {
        self.zip_code = Some(zip_code.into());
        self
    }

    /// Radius around the ZIP code, in miles, as the site's dropdown value.
    #[must_use]
    pub fn with_zip_radius(mut self, miles: impl Into<String>) -> Self {
        self.zip_radius_miles = miles.into();
        self
    }

    /// Filter individuals by current employer.
    #[must_use]
    pub fn with_employer(mut self, employer: impl Into<String>) -> Self {
        self.employer_filter = Some(employer.into());
        self
    }

    /// Search term.
    #[must_use]
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Search scope.
    #[must_use]
    pub fn scope(&self) -> SearchScope {
        self.scope
    }

    /// ZIP code filter, if any.
    #[must_use]
    pub fn zip_code(&self) -> Option<&str> {
        self.zip_code.as_deref()
    }

    /// ZIP radius in miles.
    #[must_use]
    pub fn zip_radius_miles(&self) -> &str {
        &self.zip_radius_miles
    }

    /// Employer filter, if any.
    #[must_use]
    pub fn employer_filter(&self) -> Option<&str> {
        self.employer_filter.as_deref()
    }
}

/// A registration flag shown on a result card (e.g. `SEC`, `IA`, `BD`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationType {
    /// Label of the registration
    pub name: String,
    /// False when the card marks it inactive or not licensed
    pub active: bool,
}

/// One row of a search results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultEntry {
    /// Absolute link to the firm or individual profile
    pub url: String,
    /// Display name
    pub name: String,
    /// CRD number
    pub crd: Option<String>,
    /// SEC file number (e.g. `801-12345`)
    pub sec_number: Option<String>,
    /// Other names the entity is known by
    pub alternate_names: Option<String>,
    /// Main office address
    pub address: Option<String>,
    /// Registration flags in page order
    pub registration_types: Vec<RegistrationType>,
}

/// Disclosure documents resolved for a firm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingBundle {
    /// Form ADV Part 1 PDF
    pub adv_form_url: Option<String>,
    /// Local copy of the ADV Part 1, when downloaded
    pub adv_form_local_path: Option<PathBuf>,
    /// Form ADV Part 2 brochure
    pub brochure_url: Option<String>,
    /// Local copy of the brochure, when downloaded
    pub brochure_local_path: Option<PathBuf>,
}

/// Detailed report resolved for an individual.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualReport {
    /// Detailed report link
    pub report_url: Option<String>,
    /// Local copy of the report, when downloaded
    pub local_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parse() {
        assert_eq!("firm".parse::<SearchScope>().unwrap(), SearchScope::Firm);
        assert_eq!(
            " Individual ".parse::<SearchScope>().unwrap(),
            SearchScope::Individual
        );
        let err = "broker".parse::<SearchScope>().unwrap_err();
        assert!(err.to_string().contains("must be firm or individual"));
    }

    #[test]
    fn test_scope_display_roundtrip() {
        for scope in [SearchScope::Firm, SearchScope::Individual] {
            assert_eq!(scope.to_string().parse::<SearchScope>().unwrap(), scope);
        }
    }

    #[test]
    fn test_valid_crd() {
        let crd = Crd::new(" 105958 ").unwrap();
        assert_eq!(crd.as_str(), "105958");
        assert_eq!(crd.to_string(), "105958");
    }

    #[test]
    fn test_invalid_crd() {
        assert!(Crd::new("").is_err());
        assert!(Crd::new("12a45").is_err());
        assert!(Crd::new("801-12345").is_err());
    }

    #[test]
    fn test_profile_target_prefers_url() {
        let target =
            ProfileTarget::from_parts(Some("1234"), Some("https://adviserinfo.sec.gov/Firm/99"))
                .unwrap();
        assert_eq!(
            target,
            ProfileTarget::Url("https://adviserinfo.sec.gov/Firm/99".to_string())
        );

        let target = ProfileTarget::from_parts(Some("1234"), None).unwrap();
        assert_eq!(target, ProfileTarget::Crd(Crd::new("1234").unwrap()));
    }

    #[test]
    fn test_profile_target_requires_input() {
        let err = ProfileTarget::from_parts(None, None).unwrap_err();
        assert_eq!(err.to_string(), "validation error: CRD number or URL required");
        assert!(ProfileTarget::from_parts(Some("  "), Some("")).is_err());
    }

    #[test]
    fn test_query_defaults() {
        let query = SearchQuery::new("Vanguard", SearchScope::Firm);
        assert_eq!(query.term(), "Vanguard");
        assert_eq!(query.scope(), SearchScope::Firm);
        assert_eq!(query.zip_radius_miles(), DEFAULT_ZIP_RADIUS_MILES);
        assert!(query.zip_code().is_none());
        assert!(query.employer_filter().is_none());
    }

    #[test]
    fn test_entry_serialization() {
        let entry = SearchResultEntry {
            url: "https://adviserinfo.sec.gov/Firm/105958".to_string(),
            name: "THE VANGUARD GROUP, INC.".to_string(),
            crd: Some("105958".to_string()),
            sec_number: Some("801-11953".to_string()),
            alternate_names: None,
            address: Some("Malvern, PA 19355".to_string()),
            registration_types: vec![RegistrationType {
                name: "SEC".to_string(),
                active: true,
            }],
        };

        let json = serde_json::to_value(&entry).expect("serialize entry");
        assert_eq!(json["crd"], "105958");
        assert_eq!(json["registration_types"][0]["active"], true);
        assert!(json["alternate_names"].is_null());
    }
}

//! ASP.NET postback replay for the IAPD search form.
//!
//! The search page is a Web Forms page: every submission must echo the hidden
//! view-state tokens of the page it was issued from, plus an `__EVENTTARGET`
//! naming the control that "fired". [`PostbackDriver`] keeps that form state
//! between round trips and walks the result pager until the next-page link
//! disappears.

use crate::error::{Result, ScanError};
use crate::filter::ResultFilter;
use crate::parser::ResultParser;
use crate::url_builder::{LANDING_URL, SEARCH_URL};
use futures::stream::{self, Stream};
use iapd_core::{SearchQuery, SearchResultEntry, SearchScope};
use iapd_session::{RateLimitedClient, RetryPolicy, SessionError};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const EVENT_TARGET: &str = "__EVENTTARGET";
pub const VIEW_STATE: &str = "__VIEWSTATE";
pub const VIEW_STATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
pub const EVENT_VALIDATION: &str = "__EVENTVALIDATION";

pub const SEARCH_BUTTON_TARGET: &str = "ctl00$cphMain$sbox$searchBtn";
pub const NEXT_PAGE_TARGET: &str = "ctl00$cphMain$ucSearchPagerTop$pageNext";

pub const SCOPE_FIELD: &str = "ctl00$cphMain$sbox$searchScope";
pub const FIRM_TERM_FIELD: &str = "ctl00$cphMain$sbox$txtFirm";
pub const INDIVIDUAL_TERM_FIELD: &str = "ctl00$cphMain$sbox$txtIndvl";
pub const ZIP_RANGE_FIELD: &str = "ctl00$cphMain$sbox$ddlZipRange";
pub const ZIP_FIELD: &str = "ctl00$cphMain$sbox$txtZip";
pub const EMPLOYER_FIELD: &str = "ctl00$cphMain$sbox$txtAtFirm";

static NEXT_PAGE_LINK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"a[id="ctl00_cphMain_ucSearchPagerTop_pageNext"]"#)
        .expect("next page selector is valid")
});

/// Radio value submitted for a scope.
pub fn scope_value(scope: SearchScope) -> &'static str {
    match scope {
        SearchScope::Firm => "rdoFirm",
        SearchScope::Individual => "rdoIndvl",
    }
}

/// Text field carrying the search term for a scope.
pub fn term_field(scope: SearchScope) -> &'static str {
    match scope {
        SearchScope::Firm => FIRM_TERM_FIELD,
        SearchScope::Individual => INDIVIDUAL_TERM_FIELD,
    }
}

/// The three hidden tokens a page issues for its next submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTokens {
    pub view_state: String,
    pub view_state_generator: String,
    pub event_validation: String,
}

impl PageTokens {
    /// Read the tokens from a page.
    ///
    /// A missing input is a protocol error. An input without a `value`
    /// attribute yields an empty token.
    pub fn extract(document: &Html) -> Result<Self> {
        Ok(Self {
            view_state: hidden_value(document, VIEW_STATE)?,
            view_state_generator: hidden_value(document, VIEW_STATE_GENERATOR)?,
            event_validation: hidden_value(document, EVENT_VALIDATION)?,
        })
    }
}

fn hidden_value(document: &Html, name: &str) -> Result<String> {
    let selector = Selector::parse(&format!(r#"input[name="{name}"]"#))
        .map_err(|e| ScanError::protocol(format!("bad selector for {name}: {e}")))?;

    document
        .select(&selector)
        .next()
        .map(|input| input.value().attr("value").unwrap_or_default().to_string())
        .ok_or_else(|| ScanError::protocol(format!("missing {name}")))
}

/// Whether the result pager offers another page.
pub fn has_next_page(document: &Html) -> bool {
    document.select(&NEXT_PAGE_LINK).next().is_some()
}

/// Field values resubmitted with every postback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    fields: BTreeMap<String, String>,
}

impl FormState {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn remove(&mut self, name: &str) {
        self.fields.remove(name);
    }

    pub fn set_event_target(&mut self, target: &str) {
        self.set(EVENT_TARGET, target);
    }

    pub fn apply_tokens(&mut self, tokens: PageTokens) {
        self.set(VIEW_STATE, tokens.view_state);
        self.set(VIEW_STATE_GENERATOR, tokens.view_state_generator);
        self.set(EVENT_VALIDATION, tokens.event_validation);
    }

    /// Write the query fields. The term only ever sits in the field of the
    /// query's scope; the other scope's term field is dropped.
    pub fn apply_query(&mut self, query: &SearchQuery) {
        let scope = query.scope();
        let other = match scope {
            SearchScope::Firm => SearchScope::Individual,
            SearchScope::Individual => SearchScope::Firm,
        };

        self.set(SCOPE_FIELD, scope_value(scope));
        self.set(term_field(scope), query.term());
        self.remove(term_field(other));
        self.set(ZIP_RANGE_FIELD, query.zip_radius_miles());

        match query.zip_code() {
            Some(zip) => self.set(ZIP_FIELD, zip),
            None => self.remove(ZIP_FIELD),
        }
        match query.employer_filter() {
            Some(employer) => self.set(EMPLOYER_FIELD, employer),
            None => self.remove(EMPLOYER_FIELD),
        }
    }

    /// Encode as form pairs for a POST body.
    pub fn to_form(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Paginating,
    Exhausted,
}

/// Stateful search session over one rate-limited client.
pub struct PostbackDriver {
    client: Arc<RateLimitedClient>,
    parser: ResultParser,
    form: FormState,
    query: Option<SearchQuery>,
    state: DriverState,
}

impl PostbackDriver {
    pub fn new(client: Arc<RateLimitedClient>) -> Self {
        Self {
            client,
            parser: ResultParser::default(),
            form: FormState::default(),
            query: None,
            state: DriverState::Uninitialized,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn set_filter(&mut self, filter: ResultFilter) {
        self.parser = ResultParser::new(filter);
    }

    /// Submit a query and return its first results page.
    ///
    /// A fresh driver walks landing page, form POST and results GET. A driver
    /// that already holds form state posts the new query straight to the
    /// results page.
    pub async fn search(&mut self, query: &SearchQuery) -> Result<Vec<SearchResultEntry>> {
        let outcome = self.submit(query).await;
        self.settle(outcome)
    }

    /// Fetch the next results page, or `None` once the pager is exhausted.
    pub async fn advance(&mut self) -> Result<Option<Vec<SearchResultEntry>>> {
        let outcome = self.next_results().await;
        self.settle(outcome)
    }

    /// Forget all form state; the next search starts from the landing page.
    pub fn reset(&mut self) {
        self.form = FormState::default();
        self.query = None;
        self.state = DriverState::Uninitialized;
    }

    /// An error status leaves the form holding the tokens of the last page
    /// absorbed, so the round trip can be repeated. Any other failure may
    /// have left them stale.
    fn settle<T>(&mut self, outcome: Result<T>) -> Result<T> {
        if let Err(error) = &outcome {
            if !matches!(error, ScanError::Http(SessionError::Status { .. })) {
                tracing::debug!(error = %error, "Discarding postback state");
                self.reset();
            }
        }
        outcome
    }

    async fn submit(&mut self, query: &SearchQuery) -> Result<Vec<SearchResultEntry>> {
        let body = if self.state == DriverState::Uninitialized {
            self.initialize(query).await?
        } else {
            tracing::debug!(scope = %query.scope(), "Re-submitting search on live session");
            self.form.apply_query(query);
            self.form.set_event_target(SEARCH_BUTTON_TARGET);
            self.client
                .post_form(SEARCH_URL, self.form.to_form())
                .await?
                .text()
        };

        let entries = self.absorb(&body, query)?;
        self.query = Some(query.clone());
        tracing::info!(
            scope = %query.scope(),
            results = entries.len(),
            more = self.state == DriverState::Paginating,
            "Search submitted"
        );
        Ok(entries)
    }

    async fn next_results(&mut self) -> Result<Option<Vec<SearchResultEntry>>> {
        if self.state != DriverState::Paginating {
            return Ok(None);
        }
        let Some(query) = self.query.clone() else {
            return Ok(None);
        };

        self.form.set_event_target(NEXT_PAGE_TARGET);
        let body = self
            .client
            .post_form(SEARCH_URL, self.form.to_form())
            .await?
            .text();

        let entries = self.absorb(&body, &query)?;
        tracing::debug!(results = entries.len(), "Fetched next results page");
        Ok(Some(entries))
    }

    async fn initialize(&mut self, query: &SearchQuery) -> Result<String> {
        let landing = self.client.get(LANDING_URL).await?.text();
        let tokens = PageTokens::extract(&Html::parse_document(&landing))?;

        let mut form = FormState::default();
        form.apply_tokens(tokens);
        form.apply_query(query);
        form.set_event_target(SEARCH_BUTTON_TARGET);

        self.client.post_form(LANDING_URL, form.to_form()).await?;
        let results = self.client.get(SEARCH_URL).await?.text();

        self.form = form;
        Ok(results)
    }

    /// Take over the tokens and pager state of a results page.
    fn absorb(&mut self, body: &str, query: &SearchQuery) -> Result<Vec<SearchResultEntry>> {
        let document = Html::parse_document(body);
        let tokens = PageTokens::extract(&document)?;

        self.form.apply_tokens(tokens);
        self.form.apply_query(query);
        self.form.set_event_target(SEARCH_BUTTON_TARGET);
        self.state = if has_next_page(&document) {
            DriverState::Paginating
        } else {
            DriverState::Exhausted
        };

        Ok(self.parser.parse_document(&document))
    }
}

/// Lazy sequence of results pages for one query.
///
/// Holds the driver mutably, so a session serves one pagination at a time.
/// Each round trip runs under the retry policy; a round trip that still fails
/// is logged and ends the sequence.
pub struct SearchPages<'a> {
    driver: &'a mut PostbackDriver,
    retry: &'a RetryPolicy,
    query: SearchQuery,
    submitted: bool,
    finished: bool,
}

impl<'a> SearchPages<'a> {
    pub fn new(
        driver: &'a mut PostbackDriver,
        retry: &'a RetryPolicy,
        query: SearchQuery,
        filter: ResultFilter,
    ) -> Self {
        driver.set_filter(filter);
        Self {
            driver,
            retry,
            query,
            submitted: false,
            finished: false,
        }
    }

    pub async fn next_page(&mut self) -> Option<Vec<SearchResultEntry>> {
        if self.finished {
            return None;
        }

        let mut backoff = self.retry.backoff();
        loop {
            let attempt = if self.submitted {
                self.driver.advance().await
            } else {
                self.driver.search(&self.query).await.map(Some)
            };

            match attempt {
                Ok(Some(page)) => {
                    self.submitted = true;
                    return Some(page);
                }
                Ok(None) => break,
                Err(error) => match backoff.on_failure(&error) {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => {
                        tracing::warn!(term = self.query.term(), "Search ended early: {}", error);
                        break;
                    }
                },
            }
        }

        self.finished = true;
        None
    }

    pub fn into_stream(self) -> impl Stream<Item = Vec<SearchResultEntry>> + 'a {
        stream::unfold(self, |mut pages| async move {
            let page = pages.next_page().await?;
            Some((page, pages))
        })
    }
}

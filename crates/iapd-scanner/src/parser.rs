use crate::filter::ResultFilter;
use crate::url_builder::normalize_result_href;
use iapd_core::{RegistrationType, SearchResultEntry};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static RESULT_CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.alinkborder").expect("result card selector is valid"));

static DISPLAY_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.displayname").expect("display name selector is valid"));

static DISPLAY_CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.displaycrd").expect("display card selector is valid"));

static ALTERNATE_NAMES: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.names").expect("alternate names selector is valid"));

static DIV_WITH_ID: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[id]").expect("div selector is valid"));

static CRD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CRD# (\d+)").expect("CRD regex is hardcoded and valid"));

static SEC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SEC# ([0-9A-Za-z-]+)").expect("SEC regex is hardcoded and valid"));

static ADDRESS_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ctl00_cphMain_rptrSearchResult_ctl\d{2,}_uc(Firm|Indvl)Item_divAddress")
        .expect("address id regex is hardcoded and valid")
});

static TYPE_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ctl00_cphMain_rptrSearchResult_ctl\d{2,}_uc(Firm|Indvl)Item_div\w{2,4}$")
        .expect("registration type id regex is hardcoded and valid")
});

static STATUS_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"ctl00_cphMain_rptrSearchResult_ctl\d{2,}_uc(Firm|Indvl)Item_div\w{2,4}(Inactive|NotLicensed)",
    )
    .expect("registration status id regex is hardcoded and valid")
});

/// Turns a search results page into [`SearchResultEntry`] records in DOM order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultParser {
    filter: ResultFilter,
}

impl ResultParser {
    pub fn new(filter: ResultFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> ResultFilter {
        self.filter
    }

    pub fn parse(&self, html: &str) -> Vec<SearchResultEntry> {
        self.parse_document(&Html::parse_document(html))
    }

    /// Malformed cards are skipped with a warning; the rest of the page still parses.
    pub fn parse_document(&self, document: &Html) -> Vec<SearchResultEntry> {
        let entries = document
            .select(&RESULT_CARD)
            .enumerate()
            .filter_map(|(index, card)| Self::parse_card(index, &card))
            .collect();

        self.filter.apply(entries)
    }

    fn parse_card(index: usize, card: &ElementRef) -> Option<SearchResultEntry> {
        let Some(href) = card.value().attr("href") else {
            tracing::warn!(index, "Skipping result card without href");
            return None;
        };

        let Some(name) = card.select(&DISPLAY_NAME).next().map(|el| element_text(&el)) else {
            tracing::warn!(index, href, "Skipping result card without display name");
            return None;
        };

        let display_card = card
            .select(&DISPLAY_CARD)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();

        let alternate_names = card
            .select(&ALTERNATE_NAMES)
            .next()
            .map(|el| element_text(&el));

        let address = divs_matching(card, &ADDRESS_ID_PATTERN)
            .next()
            .map(|el| element_text(&el));

        let registration_types = divs_matching(card, &TYPE_ID_PATTERN)
            .map(|div| RegistrationType {
                name: own_text(&div),
                active: divs_matching(&div, &STATUS_ID_PATTERN).next().is_none(),
            })
            .collect();

        Some(SearchResultEntry {
            url: normalize_result_href(href),
            name,
            crd: capture(&CRD_PATTERN, &display_card),
            sec_number: capture(&SEC_PATTERN, &display_card),
            alternate_names,
            address,
            registration_types,
        })
    }
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// First non-blank text node directly under the element.
fn own_text(element: &ElementRef) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn divs_matching<'a>(
    scope: &ElementRef<'a>,
    pattern: &'static Regex,
) -> impl Iterator<Item = ElementRef<'a>> {
    scope
        .select(&DIV_WITH_ID)
        .filter(move |div| div.value().id().is_some_and(|id| pattern.is_match(id)))
}

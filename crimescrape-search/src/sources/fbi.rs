//! FBI wanted lists: Ten Most Wanted, fugitives and terrorism.
//!
//! The list pages are rendered client-side, so this module is normally
//! given a stealth engine. Candidates are matched on the listed name with
//! [`is_match`]; the matched person's detail page supplies the charges and
//! the warning banner that decides the risk.

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{Result, SearchError};
use crate::fetch::{looks_like_captcha, FetchEngine, FetchOptions};
use crate::html::{extract_text, select_attr, select_text};
use crate::matching::{is_match, DEFAULT_THRESHOLD};
use crate::merge::merge;
use crate::response;
use crate::source::SourceModule;
use crate::types::{Query, RiskLevel, SourceResult};

pub const DEFAULT_BASE_URL: &str = "https://www.fbi.gov/";

const NOTICE_KEY: &str = "fbi-most-wanted";

/// Listing categories whose subjects are not flagged armed and dangerous
/// when the detail page cannot be verified.
const NON_DANGEROUS_CRIMES: &[&str] = &["White Collar Crimes", "Counterintelligence"];

const LISTING_ITEM: &str = "li.portal-type-person.castle-grid-block-item";

/// One of the FBI's public wanted lists and how its cards are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WantedList {
    pub path: &'static str,
    /// Selector for the person's name inside a listing card.
    pub name_selector: &'static str,
    /// Selector for the crime category inside a listing card, if shown.
    pub crime_selector: Option<&'static str>,
    /// Whether the page lazy-loads cards while scrolling.
    pub scroll: bool,
}

pub const TOP_TEN: WantedList = WantedList {
    path: "wanted/topten",
    name_selector: "h3.title",
    crime_selector: None,
    scroll: false,
};

pub const FUGITIVES: WantedList = WantedList {
    path: "wanted/fugitives",
    name_selector: "p.name",
    crime_selector: Some("h3.title"),
    scroll: true,
};

pub const TERRORISM: WantedList = WantedList {
    path: "wanted/terrorism",
    name_selector: "p.name",
    crime_selector: Some("h3.title"),
    scroll: true,
};

/// A listing card that matched the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub name: String,
    pub crime: String,
    pub href: String,
}

/// Searches the FBI wanted lists.
pub struct FbiModule {
    engine: FetchEngine,
    base_url: Url,
    threshold: u8,
}

impl FbiModule {
    /// # Errors
    ///
    /// Never fails for the built-in base URL; see [`FbiModule::with_base_url`].
    pub fn new(engine: impl Into<FetchEngine>) -> Result<Self> {
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| SearchError::Config(format!("invalid FBI base URL: {e}")))?;
        Ok(Self {
            engine: engine.into(),
            base_url,
            threshold: DEFAULT_THRESHOLD,
        })
    }

    /// Module driving headless Chromium per `config`.
    ///
    /// # Errors
    ///
    /// Same as [`FbiModule::new`].
    #[cfg(feature = "chromium")]
    pub fn from_config(config: &crate::config::SearchConfig) -> Result<Self> {
        Self::new(crate::fetch::StealthEngine::chromium(config))
    }

    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `base` is not an absolute URL.
    pub fn with_base_url(mut self, base: &str) -> Result<Self> {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        self.base_url = Url::parse(&base)
            .map_err(|e| SearchError::Config(format!("invalid FBI base URL {base:?}: {e}")))?;
        Ok(self)
    }

    /// Minimum name similarity (0-100) for a listing to count as a match.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold.min(100);
        self
    }

    async fn search_list(&self, list: &WantedList, query: &Query) -> Result<Option<SourceResult>> {
        let url = self
            .base_url
            .join(list.path)
            .map_err(|e| SearchError::Module(format!("bad list path {}: {e}", list.path)))?;
        let page = self
            .engine
            .fetch(url.as_str(), &FetchOptions::new().scroll(list.scroll))
            .await;
        if looks_like_captcha(&page) {
            return Err(SearchError::Captcha(url.to_string()));
        }

        let Some(listing) = find_listing(&page, list, query, self.threshold) else {
            return Ok(None);
        };
        let detail_url = url
            .join(&listing.href)
            .map_err(|e| SearchError::Module(format!("bad detail link {:?}: {e}", listing.href)))?;
        let detail = self.engine.fetch(detail_url.as_str(), &FetchOptions::new()).await;
        if looks_like_captcha(&detail) {
            return Err(SearchError::Captcha(detail_url.to_string()));
        }
        parse_detail(&detail, &listing).map(Some)
    }
}

#[async_trait]
impl SourceModule for FbiModule {
    fn name(&self) -> &str {
        "fbi"
    }

    async fn search(&self, query: &Query) -> Result<Option<SourceResult>> {
        let mut fragments = Vec::new();
        for list in [TOP_TEN, FUGITIVES, TERRORISM] {
            if let Some(result) = self.search_list(&list, query).await? {
                fragments.push(result);
            }
        }
        Ok(merge(fragments))
    }
}

/// First card on a list page whose name matches the query.
pub fn find_listing(page: &str, list: &WantedList, query: &Query, threshold: u8) -> Option<Listing> {
    let document = Html::parse_document(page);
    let item = Selector::parse(LISTING_ITEM).ok()?;
    let wanted = query.full_name().to_uppercase();

    document.select(&item).find_map(|card| {
        let name = select_text(card, list.name_selector)?;
        if !is_match(&wanted, &name, threshold) {
            return None;
        }
        let crime = list
            .crime_selector
            .map(|sel| extract_text(card, sel, ""))
            .unwrap_or_default();
        let href = select_attr(card, "a", "href")?;
        Some(Listing { name, crime, href })
    })
}

/// Build the result from a detail page.
///
/// If the page heading names someone else, falls back to a placeholder
/// notice whose risk depends on the listing's crime category.
///
/// # Errors
///
/// Propagates [`SearchError::Schema`] from [`response::build`].
pub fn parse_detail(page: &str, listing: &Listing) -> Result<SourceResult> {
    let document = Html::parse_document(page);
    let root = document.root_element();

    let heading = extract_text(root, "h1.documentFirstHeading", &listing.name);
    if !heading.eq_ignore_ascii_case(&listing.name) {
        return unverified(&listing.crime);
    }

    let summary = extract_text(root, "p.summary", "Unknown");
    let warning = extract_text(root, "h3.wanted-person-warning", "");
    let risk = if warning.contains("DANGEROUS") {
        RiskLevel::Dangerous
    } else {
        RiskLevel::High
    };

    response::build(
        risk.as_str(),
        NOTICE_KEY,
        Some(&crime_id(&listing.crime)),
        Some(clean_charges(&summary)),
    )
}

fn unverified(crime: &str) -> Result<SourceResult> {
    let risk = if NON_DANGEROUS_CRIMES.contains(&crime) {
        RiskLevel::High
    } else {
        RiskLevel::Dangerous
    };
    response::build(risk.as_str(), NOTICE_KEY, Some(""), Some(vec!["Unknown".to_string()]))
}

/// `"White Collar Crimes"` → `"whitecollarcrimes"`.
fn crime_id(crime: &str) -> String {
    crime.to_lowercase().replace(' ', "")
}

/// Split a `; `-separated summary into sentence-cased charges.
fn clean_charges(summary: &str) -> Vec<String> {
    summary
        .split("; ")
        .map(|charge| {
            let lower = charge.trim().to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .filter(|charge| !charge.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::SearchConfig;
    use crate::fetch::LightEngine;
    use crate::types::Notice;

    fn query() -> Query {
        Query::new("Ruja", "Ignatova").expect("valid")
    }

    fn card(name_html: &str, href: &str) -> String {
        format!(
            r#"<li class="portal-type-person castle-grid-block-item">
                 {name_html}<a href="{href}">details</a>
               </li>"#
        )
    }

    fn fugitives_page() -> String {
        format!(
            "<ul>{}{}</ul>",
            card(
                r#"<h3 class="title">Violent Crimes</h3><p class="name">JOHN SMITH</p>"#,
                "/wanted/vc/john-smith"
            ),
            card(
                r#"<h3 class="title">White Collar Crimes</h3><p class="name">RUJA IGNATOVA</p>"#,
                "/wanted/wcc/ruja-ignatova"
            ),
        )
    }

    fn detail_page(heading: &str, warning: &str) -> String {
        format!(
            r#"<h1 class="documentFirstHeading">{heading}</h1>
               <p class="summary">CONSPIRACY TO COMMIT WIRE FRAUD; Securities Fraud</p>
               <h3 class="wanted-person-warning panel">{warning}</h3>"#
        )
    }

    #[test]
    fn finds_matching_card_with_crime() {
        let listing = find_listing(&fugitives_page(), &FUGITIVES, &query(), DEFAULT_THRESHOLD)
            .expect("match");
        assert_eq!(listing.name, "RUJA IGNATOVA");
        assert_eq!(listing.crime, "White Collar Crimes");
        assert_eq!(listing.href, "/wanted/wcc/ruja-ignatova");
    }

    #[test]
    fn top_ten_cards_have_no_crime() {
        let page = card(r#"<h3 class="title">Ruja Ignatova</h3>"#, "/wanted/topten/ruja");
        let listing = find_listing(&page, &TOP_TEN, &query(), DEFAULT_THRESHOLD).expect("match");
        assert_eq!(listing.crime, "");
    }

    #[test]
    fn no_card_matches_unrelated_name() {
        let other = Query::new("Jane", "Doe").expect("valid");
        assert!(find_listing(&fugitives_page(), &FUGITIVES, &other, DEFAULT_THRESHOLD).is_none());
        assert!(find_listing("", &FUGITIVES, &other, DEFAULT_THRESHOLD).is_none());
    }

    #[test]
    fn detail_with_warning_is_dangerous() {
        let listing = Listing {
            name: "RUJA IGNATOVA".into(),
            crime: "White Collar Crimes".into(),
            href: String::new(),
        };
        let page = detail_page("RUJA IGNATOVA", "SHOULD BE CONSIDERED ARMED AND DANGEROUS");
        let result = parse_detail(&page, &listing).expect("valid result");
        assert_eq!(result.risk, RiskLevel::Dangerous);
        let notice = &result.notices[NOTICE_KEY];
        assert_eq!(notice.id, "whitecollarcrimes");
        assert_eq!(notice.charges, vec!["Conspiracy to commit wire fraud", "Securities fraud"]);
    }

    #[test]
    fn detail_without_warning_is_high() {
        let listing = Listing {
            name: "RUJA IGNATOVA".into(),
            crime: String::new(),
            href: String::new(),
        };
        let result = parse_detail(&detail_page("RUJA IGNATOVA", ""), &listing).expect("valid result");
        assert_eq!(result.risk, RiskLevel::High);
    }

    #[test]
    fn heading_mismatch_falls_back_by_crime() {
        let white_collar = Listing {
            name: "RUJA IGNATOVA".into(),
            crime: "White Collar Crimes".into(),
            href: String::new(),
        };
        let page = detail_page("SOMEONE ELSE", "ARMED AND DANGEROUS");
        let result = parse_detail(&page, &white_collar).expect("valid result");
        assert_eq!(result.risk, RiskLevel::High);
        assert_eq!(result.notices[NOTICE_KEY], Notice::new("", vec!["Unknown".into()]));

        let violent = Listing {
            crime: "Violent Crimes".into(),
            ..white_collar
        };
        let result = parse_detail(&page, &violent).expect("valid result");
        assert_eq!(result.risk, RiskLevel::Dangerous);
    }

    #[test]
    fn charges_are_sentence_cased() {
        assert_eq!(clean_charges("MONEY LAUNDERING; bank fraud"), vec!["Money laundering", "Bank fraud"]);
        assert_eq!(clean_charges(""), Vec::<String>::new());
    }

    async fn module_for(server: &MockServer) -> FbiModule {
        let engine = LightEngine::new(&SearchConfig::default()).expect("client");
        FbiModule::new(engine)
            .and_then(|m| m.with_base_url(&server.uri()))
            .expect("module")
    }

    #[tokio::test]
    async fn searches_all_lists_and_follows_detail_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wanted/topten"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ul></ul>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wanted/fugitives"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fugitives_page()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wanted/terrorism"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ul></ul>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wanted/wcc/ruja-ignatova"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("RUJA IGNATOVA", "")))
            .expect(1)
            .mount(&server)
            .await;

        let result = module_for(&server)
            .await
            .search(&query())
            .await
            .expect("search")
            .expect("match");
        assert_eq!(result.risk, RiskLevel::High);
        assert_eq!(result.notices[NOTICE_KEY].id, "whitecollarcrimes");
    }

    #[tokio::test]
    async fn captcha_page_is_captcha_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<div class="g-recaptcha">Are you a robot?</div>"#),
            )
            .mount(&server)
            .await;

        let err = module_for(&server).await.search(&query()).await.unwrap_err();
        assert!(matches!(err, SearchError::Captcha(_)));
    }

    #[tokio::test]
    async fn empty_lists_are_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        assert!(module_for(&server).await.search(&query()).await.expect("search").is_none());
    }
}

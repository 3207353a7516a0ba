//! Interpol public notices: red notices and UN Security Council notices.
//!
//! Uses the JSON web service behind the public notice search. Red notices
//! are searched by name and forename; UN notices are listed by surname and
//! filtered on an exact, case-insensitive forename match.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::fetch::{FetchEngine, FetchOptions, LightEngine};
use crate::html::parse_json;
use crate::merge::merge;
use crate::response::build;
use crate::source::SourceModule;
use crate::types::{Query, SourceResult};

/// Public Interpol notices web service.
pub const DEFAULT_BASE_URL: &str = "https://ws-public.interpol.int/notices/v1/";

const NO_CHARGES: &str = "No charges available";

/// Which notice list a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Red,
    Un,
}

impl NoticeKind {
    /// Notice key in the module's result, e.g. `interpol-red-notice`.
    pub fn notice_key(&self) -> &'static str {
        match self {
            Self::Red => "interpol-red-notice",
            Self::Un => "interpol-un-notice",
        }
    }
}

/// Searches Interpol red and UN notices.
pub struct InterpolModule {
    engine: FetchEngine,
    base_url: Url,
}

impl InterpolModule {
    /// Module against the public service using `engine`.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in base URL; see [`InterpolModule::with_base_url`].
    pub fn new(engine: impl Into<FetchEngine>) -> Result<Self> {
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| SearchError::Config(format!("invalid Interpol base URL: {e}")))?;
        Ok(Self {
            engine: engine.into(),
            base_url,
        })
    }

    /// Module with a light engine built from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Self::new(LightEngine::new(config)?)
    }

    /// Point the module at another deployment of the notices service.
    ///
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
            .map_err(|e| SearchError::Config(format!("invalid Interpol base URL {base:?}: {e}")))?;
        Ok(self)
    }

    async fn fetch_json(&self, url: &Url) -> Value {
        parse_json(&self.engine.fetch(url.as_str(), &FetchOptions::default()).await)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SearchError::Config("Interpol base URL cannot have a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn search_red(&self, query: &Query) -> Result<Option<SourceResult>> {
        let mut url = self.endpoint(&["red"])?;
        url.query_pairs_mut()
            .append_pair("name", query.last_name())
            .append_pair("forename", query.first_name());

        let Some(entity_id) = first_red_match(&self.fetch_json(&url).await)? else {
            return Ok(None);
        };
        let detail = self.fetch_json(&self.endpoint(&["red", &entity_id])?).await;
        notice_from_detail(&detail, NoticeKind::Red, &entity_id).map(Some)
    }

    async fn search_un(&self, query: &Query) -> Result<Option<SourceResult>> {
        let mut url = self.endpoint(&["un"])?;
        url.query_pairs_mut()
            .append_pair("name", query.last_name())
            .append_pair("page", "1")
            .append_pair("resultPerPage", "1000");

        let Some(entity_id) = un_match(&self.fetch_json(&url).await, query) else {
            return Ok(None);
        };
        let detail = self
            .fetch_json(&self.endpoint(&["un", "persons", &entity_id])?)
            .await;
        notice_from_detail(&detail, NoticeKind::Un, &entity_id).map(Some)
    }
}

#[async_trait]
impl SourceModule for InterpolModule {
    fn name(&self) -> &str {
        "interpol"
    }

    async fn search(&self, query: &Query) -> Result<Option<SourceResult>> {
        let red = self.search_red(query).await?;
        let un = self.search_un(query).await?;
        Ok(merge(red.into_iter().chain(un)))
    }
}

/// Entity id of the first red-notice hit, `None` when the search is empty.
///
/// # Errors
///
/// Returns [`SearchError::Module`] if the service reports hits but lists none.
pub fn first_red_match(search: &Value) -> Result<Option<String>> {
    let total = search.get("total").and_then(Value::as_u64).unwrap_or(0);
    if total == 0 {
        return Ok(None);
    }
    search
        .pointer("/_embedded/notices/0/entity_id")
        .and_then(Value::as_str)
        .map(|id| Some(id.to_string()))
        .ok_or_else(|| {
            SearchError::Module(format!("red notice search reported {total} hits but listed none"))
        })
}

/// Entity id of the UN notice whose forename and name equal the query's,
/// ignoring case.
pub fn un_match(search: &Value, query: &Query) -> Option<String> {
    search
        .pointer("/_embedded/notices")
        .and_then(Value::as_array)?
        .iter()
        .find(|notice| {
            let field = |name: &str| notice.get(name).and_then(Value::as_str).unwrap_or_default();
            field("forename").to_uppercase() == query.first_name().to_uppercase()
                && field("name").to_uppercase() == query.last_name().to_uppercase()
        })
        .and_then(|notice| notice.get("entity_id"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Build the module result for one notice detail record.
///
/// Charges come from the first arrest warrant, split on `;` line breaks.
/// `fallback_id` is used when the detail record carries no entity id
/// (for example when the detail fetch came back empty).
///
/// # Errors
///
/// Returns [`SearchError::Schema`] if the result cannot be built.
pub fn notice_from_detail(detail: &Value, kind: NoticeKind, fallback_id: &str) -> Result<SourceResult> {
    let id = detail
        .get("entity_id")
        .and_then(Value::as_str)
        .unwrap_or(fallback_id);

    let mut charges: Vec<String> = detail
        .get("arrest_warrants")
        .and_then(Value::as_array)
        .and_then(|warrants| warrants.first())
        .map(|warrant| warrant.get("charge").and_then(Value::as_str).unwrap_or("Unknown"))
        .map(|charge| {
            charge
                .split(";\r\n")
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    if charges.is_empty() {
        charges.push(NO_CHARGES.to_string());
    }

    build("Dangerous", kind.notice_key(), Some(id), Some(charges))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::types::RiskLevel;

    fn query() -> Query {
        Query::new("Ruja", "Ignatova").expect("valid")
    }

    #[test]
    fn empty_red_search_is_no_match() {
        assert_eq!(first_red_match(&json!({"total": 0})).expect("ok"), None);
        assert_eq!(first_red_match(&json!({})).expect("ok"), None);
    }

    #[test]
    fn red_search_takes_first_notice() {
        let search = json!({
            "total": 2,
            "_embedded": {"notices": [{"entity_id": "2017/1"}, {"entity_id": "2018/2"}]}
        });
        assert_eq!(first_red_match(&search).expect("ok").as_deref(), Some("2017/1"));
    }

    #[test]
    fn red_search_with_hits_but_no_list_is_module_error() {
        let err = first_red_match(&json!({"total": 3, "_embedded": {"notices": []}})).unwrap_err();
        assert!(matches!(err, SearchError::Module(_)));
    }

    #[test]
    fn un_match_requires_both_names() {
        let search = json!({"_embedded": {"notices": [
            {"forename": "ANNA", "name": "IGNATOVA", "entity_id": "un-1"},
            {"forename": "RUJA", "name": "IGNATOVA", "entity_id": "un-2"}
        ]}});
        assert_eq!(un_match(&search, &query()).as_deref(), Some("un-2"));
        assert_eq!(un_match(&json!({}), &query()), None);
    }

    #[test]
    fn detail_charges_split_on_line_breaks() {
        let detail = json!({
            "entity_id": "2017/1",
            "arrest_warrants": [{"charge": "Fraud;\r\nMoney laundering"}, {"charge": "ignored"}]
        });
        let result = notice_from_detail(&detail, NoticeKind::Red, "x").expect("build");
        assert_eq!(result.risk, RiskLevel::Dangerous);
        let notice = &result.notices["interpol-red-notice"];
        assert_eq!(notice.id, "2017/1");
        assert_eq!(notice.charges, vec!["Fraud", "Money laundering"]);
    }

    #[test]
    fn detail_without_warrants_has_placeholder_charge() {
        let result = notice_from_detail(&json!({}), NoticeKind::Un, "un-9").expect("build");
        let notice = &result.notices["interpol-un-notice"];
        assert_eq!(notice.id, "un-9");
        assert_eq!(notice.charges, vec![NO_CHARGES]);
    }

    async fn module_for(server: &MockServer) -> InterpolModule {
        let engine = LightEngine::new(&SearchConfig::default()).expect("client");
        InterpolModule::new(engine)
            .and_then(|m| m.with_base_url(&server.uri()))
            .expect("module")
    }

    #[tokio::test]
    async fn red_and_un_notices_are_merged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/red"))
            .and(query_param("name", "Ignatova"))
            .and(query_param("forename", "Ruja"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 1,
                "_embedded": {"notices": [{"entity_id": "2017/1234"}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/red/2017%2F1234"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entity_id": "2017/1234",
                "arrest_warrants": [{"charge": "Fraud"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/un"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_embedded": {"notices": [{"forename": "Ruja", "name": "Ignatova", "entity_id": "un-7"}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/un/persons/un-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entity_id": "un-7"})))
            .mount(&server)
            .await;

        let result = module_for(&server)
            .await
            .search(&query())
            .await
            .expect("search")
            .expect("match");
        assert_eq!(result.risk, RiskLevel::Dangerous);
        assert_eq!(result.notices.len(), 2);
        assert_eq!(result.notices["interpol-red-notice"].charges, vec!["Fraud"]);
        assert_eq!(result.notices["interpol-un-notice"].id, "un-7");
    }

    #[tokio::test]
    async fn no_notices_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/red"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/un"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_embedded": {"notices": []}})))
            .mount(&server)
            .await;

        let result = module_for(&server).await.search(&query()).await.expect("search");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn unreachable_service_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = module_for(&server).await.search(&query()).await.expect("search");
        assert!(result.is_none());
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let engine = LightEngine::new(&SearchConfig::default()).expect("client");
        let module = InterpolModule::new(engine)
            .and_then(|m| m.with_base_url("http://localhost:9000/notices/v1"))
            .expect("module");
        let url = module.endpoint(&["red", "2017/1"]).expect("url");
        assert_eq!(url.as_str(), "http://localhost:9000/notices/v1/red/2017%2F1");
    }

    #[test]
    fn invalid_base_url_rejected() {
        let engine = LightEngine::new(&SearchConfig::default()).expect("client");
        let err = InterpolModule::new(engine)
            .and_then(|m| m.with_base_url("not a url"))
            .err()
            .expect("invalid");
        assert!(matches!(err, SearchError::Config(_)));
    }
}

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, Utc};
use futures::future::join_all;
use regex::Regex;
use reqwest::Url;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::render::rows_from_document;

pub const DEFAULT_META1: &str = "meta1.json";
pub const DEFAULT_META2: &str = "meta2.json";
pub const DEFAULT_TABLE_DIR: &str = "tables/";
pub const CACHE_BUSTER_PARAM: &str = "v";

const USER_AGENT: &str = concat!("rankpage/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid base url '{url}': {message}")]
    InvalidBase { url: String, message: String },

    #[error("invalid document path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("request failed: {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} {url}")]
    Status { url: String, status: u16 },

    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The two metadata documents next to a ranking page. `meta1` carries page
/// text and pager settings and may be empty; `meta2` carries `total_pages`.
#[derive(Clone, Debug, Default)]
pub struct SiteMeta {
    pub meta1: Value,
    pub meta2: Value,
}

impl SiteMeta {
    pub fn total_pages(&self) -> usize {
        let raw = match self.meta2.get("total_pages") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        if raw.is_finite() && raw >= 1.0 {
            raw as usize
        } else {
            1
        }
    }

    /// Build identifier used to pin table fetches to one data release.
    pub fn build(&self) -> Option<String> {
        match self.meta1.get("build") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Today's date as `YYYY-MM-DD` in UTC; changes once a day so caches
/// refresh daily.
pub fn daily_cache_buster() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Today's date in Japan (UTC+9, no daylight saving).
pub fn tokyo_today() -> NaiveDate {
    match FixedOffset::east_opt(9 * 3600) {
        Some(jst) => Utc::now().with_timezone(&jst).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// Cache buster for chart tables: `date` (or `meta.date`) from the chart
/// metadata when it is a `YYYY-MM-DD` string, otherwise `fallback`.
pub fn chart_cache_buster(meta: &Value, fallback: NaiveDate) -> String {
    let date = meta
        .get("date")
        .or_else(|| meta.get("meta").and_then(|m| m.get("date")))
        .and_then(Value::as_str);
    match date {
        Some(d) if is_iso_date(d) => d.to_string(),
        _ => fallback.format("%Y-%m-%d").to_string(),
    }
}

static ISO_DATE_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn is_iso_date(value: &str) -> bool {
    ISO_DATE_RE
        .get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

#[derive(Clone, Debug)]
pub struct SiteClient {
    client: reqwest::Client,
    base: Url,
    cache_buster: Option<String>,
}

impl SiteClient {
    /// `base` is the directory holding the page's JSON documents. A missing
    /// trailing slash is added so relative names resolve inside it.
    pub fn new(
        base: &str,
        timeout_seconds: u64,
        cache_buster: Option<String>,
    ) -> Result<Self, FetchError> {
        let base = directory_url(base)?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(USER_AGENT),
        );
        headers.insert(
            reqwest::header::CACHE_CONTROL,
            reqwest::header::HeaderValue::from_static("no-store"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_seconds.max(1)))
            .build()
            .map_err(|e| FetchError::HttpClientBuild { source: e })?;

        Ok(Self {
            client,
            base,
            cache_buster,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn cache_buster(&self) -> Option<&str> {
        self.cache_buster.as_deref()
    }

    /// Resolves `path` against the base directory and applies `version`
    /// (or the client's cache buster) as the `v` parameter.
    pub fn resolve(&self, path: &str, version: Option<&str>) -> Result<Url, FetchError> {
        let mut url = self.base.join(path).map_err(|e| FetchError::InvalidPath {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        if let Some(v) = version.or(self.cache_buster.as_deref()) {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| k != CACHE_BUSTER_PARAM)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            url.set_query(None);
            url.query_pairs_mut()
                .extend_pairs(kept.iter())
                .append_pair(CACHE_BUSTER_PARAM, v);
        }
        Ok(url)
    }

    pub async fn fetch_json(&self, path: &str) -> Result<Value, FetchError> {
        let url = self.resolve(path, None)?;
        self.get_json(url).await
    }

    async fn get_json(&self, url: Url) -> Result<Value, FetchError> {
        let url_str = url.to_string();
        debug!(url = %url_str, "fetching");
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url_str.clone(),
                source: e,
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_str,
                status: status.as_u16(),
            });
        }

        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.contains("json") {
            // static hosts often serve .json as text/plain; the body decides
            warn!(url = %url_str, content_type = %content_type, "non-JSON content-type");
        }

        let body = res.text().await.map_err(|e| FetchError::Request {
            url: url_str.clone(),
            source: e,
        })?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url_str,
            source: e,
        })
    }

    /// Like [`fetch_json`](Self::fetch_json) but any failure yields `{}`.
    pub async fn fetch_optional_json(&self, path: &str) -> Value {
        match self.fetch_json(path).await {
            Ok(v) => v,
            Err(e) => {
                debug!(path, error = %e, "optional document unavailable");
                Value::Object(Map::new())
            }
        }
    }

    /// Loads both metadata documents concurrently. Only `meta2` is required.
    pub async fn load_meta(&self, meta1: &str, meta2: &str) -> Result<SiteMeta, FetchError> {
        let (meta1, meta2) = tokio::join!(self.fetch_optional_json(meta1), self.fetch_json(meta2));
        Ok(SiteMeta {
            meta1,
            meta2: meta2?,
        })
    }

    /// Fetches `<table_dir>table.<page>.json`, pinned to `version` when given.
    pub async fn fetch_rows(
        &self,
        table_dir: &str,
        page: usize,
        version: Option<&str>,
    ) -> Result<Vec<Value>, FetchError> {
        let path = table_path(table_dir, page);
        let url = self.resolve(&path, version)?;
        let doc = self.get_json(url).await?;
        Ok(rows_from_document(doc))
    }

    /// Fetches named documents concurrently. One failing source does not
    /// affect the others.
    pub async fn fetch_sources(
        &self,
        sources: &[(String, String)],
    ) -> BTreeMap<String, Result<Value, FetchError>> {
        let fetches = sources.iter().map(|(name, path)| async move {
            (name.to_lowercase(), self.fetch_json(path).await)
        });
        join_all(fetches).await.into_iter().collect()
    }
}

pub fn table_path(table_dir: &str, page: usize) -> String {
    let dir = table_dir.trim();
    if dir.is_empty() {
        format!("table.{page}.json")
    } else if dir.ends_with('/') {
        format!("{dir}table.{page}.json")
    } else {
        format!("{dir}/table.{page}.json")
    }
}

/// Directory URL for a page URL: the query and fragment are dropped, an
/// `index.html` leaf is stripped, and a trailing slash is ensured.
pub fn directory_url(raw: &str) -> Result<Url, FetchError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidBase {
        url: raw.to_string(),
        message: e.to_string(),
    })?;
    url.set_query(None);
    url.set_fragment(None);
    let path = url.path().to_string();
    let lower = path.to_ascii_lowercase();
    let path = if lower.ends_with("/index.html") || lower.ends_with("/index.htm") {
        let cut = path.rfind('/').map(|i| i + 1).unwrap_or(path.len());
        path[..cut].to_string()
    } else if path.ends_with('/') {
        path
    } else {
        format!("{path}/")
    };
    url.set_path(&path);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn total_pages_is_at_least_one() {
        let meta = |v: Value| SiteMeta {
            meta1: json!({}),
            meta2: v,
        };
        assert_eq!(meta(json!({"total_pages": 12})).total_pages(), 12);
        assert_eq!(meta(json!({"total_pages": "4"})).total_pages(), 4);
        assert_eq!(meta(json!({"total_pages": 0})).total_pages(), 1);
        assert_eq!(meta(json!({"total_pages": -3})).total_pages(), 1);
        assert_eq!(meta(json!({})).total_pages(), 1);
    }

    #[test]
    fn build_reads_meta1() {
        let meta = SiteMeta {
            meta1: json!({"build": " 2024-06-01T09 "}),
            meta2: json!({}),
        };
        assert_eq!(meta.build().as_deref(), Some("2024-06-01T09"));
        assert_eq!(SiteMeta::default().build(), None);
    }

    #[test]
    fn chart_cache_buster_prefers_meta_date() {
        let fallback = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            chart_cache_buster(&json!({"date": "2024-05-06"}), fallback),
            "2024-05-06"
        );
        assert_eq!(
            chart_cache_buster(&json!({"meta": {"date": "2023-12-31"}}), fallback),
            "2023-12-31"
        );
        assert_eq!(
            chart_cache_buster(&json!({"date": "2024/05/06"}), fallback),
            "2024-01-02"
        );
        assert_eq!(
            chart_cache_buster(&json!({"date": "2024-05-06T00:00"}), fallback),
            "2024-01-02"
        );
    }

    #[test]
    fn directory_url_normalizes() {
        let u = directory_url("https://example.com/rank/all/likes/index.html?p=3#x").unwrap();
        assert_eq!(u.as_str(), "https://example.com/rank/all/likes/");
        let u = directory_url("https://example.com/rank/all/likes").unwrap();
        assert_eq!(u.as_str(), "https://example.com/rank/all/likes/");
        assert!(directory_url("not a url").is_err());
    }

    #[test]
    fn resolve_applies_version() {
        let client = SiteClient::new("https://example.com/r/", 5, Some("2024-01-01".into())).unwrap();
        let u = client.resolve("meta1.json", None).unwrap();
        assert_eq!(u.as_str(), "https://example.com/r/meta1.json?v=2024-01-01");
        let u = client.resolve(&table_path("tables", 2), Some("b7")).unwrap();
        assert_eq!(u.as_str(), "https://example.com/r/tables/table.2.json?v=b7");

        let client = SiteClient::new("https://example.com/r/", 5, None).unwrap();
        let u = client.resolve("meta2.json", None).unwrap();
        assert_eq!(u.as_str(), "https://example.com/r/meta2.json");
    }

    #[test]
    fn table_path_joins_directory() {
        assert_eq!(table_path("tables/", 3), "tables/table.3.json");
        assert_eq!(table_path("tables", 3), "tables/table.3.json");
        assert_eq!(table_path("", 1), "table.1.json");
    }
}

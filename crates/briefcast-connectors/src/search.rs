//! Search connector — web search, trending topics, quotes, Hacker News, and
//! page fetching.
//!
//! `search`, `trending`, and `quotes` go to the configured search provider;
//! `hacker_news_top` uses the public Algolia HN API and needs no key.

use async_trait::async_trait;
use briefcast_core::config::SearchConfig;
use briefcast_core::error::{BriefcastError, Result};
use briefcast_core::traits::Connector;
use serde_json::{Map, Value, json};

use crate::{opt_str, opt_u64, required_str, unknown_operation};

const HN_API: &str = "https://hn.algolia.com/api/v1";

/// Upper bound on extracted page text handed to later steps.
const FETCH_CONTENT_MAX_CHARS: usize = 8000;

pub struct SearchConnector {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl SearchConnector {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    async fn provider_get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        if self.endpoint.is_empty() {
            return Err(BriefcastError::Connector(
                "search endpoint not configured ([search] in config.toml)".into(),
            ));
        }
        let resp = self
            .client
            .get(format!("{}/{path}", self.endpoint))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| BriefcastError::Connector(format!("search request: {e}")))?;

        if !resp.status().is_success() {
            return Err(BriefcastError::Connector(format!(
                "search provider returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| BriefcastError::Connector(format!("search response: {e}")))
    }

    async fn hacker_news_top(&self, params: &Map<String, Value>) -> Result<Value> {
        let count = opt_u64(params, "count").unwrap_or(10).min(50);
        let resp = self
            .client
            .get(format!("{HN_API}/search"))
            .query(&[
                ("tags", "front_page".to_string()),
                ("hitsPerPage", count.to_string()),
            ])
            .send()
            .await
            .map_err(|e| BriefcastError::Connector(format!("HN request: {e}")))?;

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| BriefcastError::Connector(format!("HN response: {e}")))?;

        let results: Vec<Value> = payload["hits"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .map(|hit| {
                        json!({
                            "title": hit["title"],
                            "url": hit["url"],
                            "points": hit["points"],
                            "comments": hit["num_comments"],
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({ "results": results }))
    }

    async fn fetch_content(&self, params: &Map<String, Value>) -> Result<Value> {
        let url = required_str(params, "url", "search.fetch_content")?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BriefcastError::Connector(format!("fetch {url}: {e}")))?;

        if !resp.status().is_success() {
            return Err(BriefcastError::Connector(format!(
                "fetch {url} returned {}",
                resp.status()
            )));
        }
        let html = resp
            .text()
            .await
            .map_err(|e| BriefcastError::Connector(format!("fetch body: {e}")))?;

        let mut text = strip_tags(&html);
        if text.len() > FETCH_CONTENT_MAX_CHARS {
            let mut end = FETCH_CONTENT_MAX_CHARS;
            while end > 0 && !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        Ok(json!({ "content": text, "url": url }))
    }
}

#[async_trait]
impl Connector for SearchConnector {
    fn service(&self) -> &str {
        "search"
    }

    async fn call(&self, operation: &str, params: &Map<String, Value>) -> Result<Value> {
        match operation {
            "search" => {
                let query = required_str(params, "query", "search.search")?;
                let count = opt_u64(params, "count").unwrap_or(10);
                self.provider_get(
                    "search",
                    &[("q", query.to_string()), ("count", count.to_string())],
                )
                .await
            }
            "trending" => {
                let mut query = vec![(
                    "count",
                    opt_u64(params, "count").unwrap_or(10).to_string(),
                )];
                if let Some(topic) = opt_str(params, "topic") {
                    query.push(("topic", topic.to_string()));
                }
                self.provider_get("trending", &query).await
            }
            "quotes" => {
                let mut query = Vec::new();
                if let Some(topic) = opt_str(params, "topic") {
                    query.push(("topic", topic.to_string()));
                }
                self.provider_get("quotes", &query).await
            }
            "hacker_news_top" => self.hacker_news_top(params).await,
            "fetch_content" => self.fetch_content(params).await,
            other => Err(unknown_operation("search", other)),
        }
    }
}

/// Crude tag stripper: drops script/style blocks, then everything inside
/// angle brackets, and collapses whitespace.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 4);
    let mut rest = html;
    let mut in_tag = false;
    let mut skip_until: Option<&str> = None;

    while !rest.is_empty() {
        if let Some(close) = skip_until {
            match rest.to_ascii_lowercase().find(close) {
                Some(pos) => {
                    rest = &rest[pos + close.len()..];
                    skip_until = None;
                }
                None => break,
            }
            continue;
        }

        let Some(c) = rest.chars().next() else { break };
        if in_tag {
            if c == '>' {
                in_tag = false;
            }
            rest = &rest[c.len_utf8()..];
            continue;
        }
        if c == '<' {
            let lower = rest.to_ascii_lowercase();
            if lower.starts_with("<script") {
                skip_until = Some("</script>");
            } else if lower.starts_with("<style") {
                skip_until = Some("</style>");
            } else {
                in_tag = true;
                rest = &rest[1..];
            }
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_endpoint() {
        let connector = SearchConnector::new(&SearchConfig::default());
        let mut params = Map::new();
        params.insert("query".into(), json!("rust"));
        let err = connector.call("search", &params).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn test_missing_query() {
        let connector = SearchConnector::new(&SearchConfig::default());
        let err = connector.call("search", &Map::new()).await.unwrap_err();
        assert!(err.to_string().contains("'query'"));
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let connector = SearchConnector::new(&SearchConfig::default());
        let err = connector.call("scrape_all", &Map::new()).await.unwrap_err();
        assert!(err.to_string().contains("no operation"));
    }

    #[test]
    fn test_strip_tags() {
        let html = "<html><head><style>body { color: red }</style></head>\
                    <body><h1>Title</h1>\n<p>Hello   <b>world</b></p>\
                    <script>alert('x')</script></body></html>";
        assert_eq!(strip_tags(html), "Title Hello world");
    }

    #[test]
    fn test_strip_tags_unclosed_script() {
        assert_eq!(strip_tags("before<script>var x = 1;"), "before");
    }
}

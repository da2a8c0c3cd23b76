//! YouTube connector — Data API v3 search, trending, and playlist creation.
//!
//! Search and trending work with a plain API key. Playlist writes require the
//! configured key to be an OAuth bearer token with playlist scope; the token
//! plumbing itself is owned by the credential layer, not this connector.

use async_trait::async_trait;
use briefcast_core::config::YoutubeConfig;
use briefcast_core::error::{BriefcastError, Result};
use briefcast_core::traits::Connector;
use serde_json::{Map, Value, json};

use crate::{opt_str, opt_u64, required_str, unknown_operation};

pub struct YoutubeConnector {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl YoutubeConnector {
    pub fn new(config: &YoutubeConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn require_key(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(BriefcastError::Connector(
                "youtube api_key not configured ([youtube] in config.toml)".into(),
            ));
        }
        Ok(())
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let resp = self
            .client
            .get(format!("{}/{path}", self.endpoint))
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| BriefcastError::Connector(format!("youtube request: {e}")))?;

        if !resp.status().is_success() {
            return Err(BriefcastError::Connector(format!(
                "youtube returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| BriefcastError::Connector(format!("youtube response: {e}")))
    }

    async fn search(&self, params: &Map<String, Value>) -> Result<Value> {
        let query = required_str(params, "query", "youtube.search")?;
        self.require_key()?;
        let max_results = opt_u64(params, "max_results").unwrap_or(10).min(50);
        self.get_json(
            "search",
            &[
                ("part", "snippet".to_string()),
                ("type", "video".to_string()),
                ("q", query.to_string()),
                ("maxResults", max_results.to_string()),
            ],
        )
        .await
    }

    async fn trending(&self, params: &Map<String, Value>) -> Result<Value> {
        self.require_key()?;
        let max_results = opt_u64(params, "max_results").unwrap_or(10).min(50);
        let region = opt_str(params, "region").unwrap_or("US");
        self.get_json(
            "videos",
            &[
                ("part", "snippet".to_string()),
                ("chart", "mostPopular".to_string()),
                ("maxResults", max_results.to_string()),
                ("regionCode", region.to_string()),
            ],
        )
        .await
    }

    async fn create_playlist(&self, params: &Map<String, Value>) -> Result<Value> {
        let title = required_str(params, "title", "youtube.create_playlist")?;
        self.require_key()?;
        let description = opt_str(params, "description").unwrap_or("Created by Briefcast");

        let resp = self
            .client
            .post(format!("{}/playlists", self.endpoint))
            .bearer_auth(&self.api_key)
            .query(&[("part", "snippet")])
            .json(&json!({
                "snippet": { "title": title, "description": description }
            }))
            .send()
            .await
            .map_err(|e| BriefcastError::Connector(format!("create playlist: {e}")))?;

        if !resp.status().is_success() {
            return Err(BriefcastError::Connector(format!(
                "create playlist returned {}",
                resp.status()
            )));
        }
        let playlist: Value = resp
            .json()
            .await
            .map_err(|e| BriefcastError::Connector(format!("playlist response: {e}")))?;
        let playlist_id = playlist["id"].as_str().unwrap_or_default().to_string();

        // Seed videos, best-effort: a video that fails to attach does not
        // sink the playlist.
        let mut added = 0;
        if let Some(Value::Array(ids)) = params.get("video_ids") {
            for id in ids.iter().filter_map(|v| v.as_str()) {
                match self.add_to_playlist(&playlist_id, id).await {
                    Ok(()) => added += 1,
                    Err(e) => tracing::warn!("⚠️ Could not add video {} to playlist: {}", id, e),
                }
            }
        }

        Ok(json!({ "playlist_id": playlist_id, "title": title, "videos_added": added }))
    }

    async fn add_to_playlist(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/playlistItems", self.endpoint))
            .bearer_auth(&self.api_key)
            .query(&[("part", "snippet")])
            .json(&json!({
                "snippet": {
                    "playlistId": playlist_id,
                    "resourceId": { "kind": "youtube#video", "videoId": video_id }
                }
            }))
            .send()
            .await
            .map_err(|e| BriefcastError::Connector(format!("playlist item: {e}")))?;

        if !resp.status().is_success() {
            return Err(BriefcastError::Connector(format!(
                "playlist item returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn search_and_create_playlist(&self, params: &Map<String, Value>) -> Result<Value> {
        let query = required_str(params, "query", "youtube.search_and_create_playlist")?;
        let found = self.search(params).await?;

        let video_ids: Vec<Value> = found["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["id"]["videoId"].as_str())
                    .map(|id| Value::String(id.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let mut create_params = Map::new();
        create_params.insert(
            "title".into(),
            Value::String(
                opt_str(params, "title")
                    .map(String::from)
                    .unwrap_or_else(|| format!("Briefcast: {query}")),
            ),
        );
        create_params.insert("video_ids".into(), Value::Array(video_ids));
        self.create_playlist(&create_params).await
    }
}

#[async_trait]
impl Connector for YoutubeConnector {
    fn service(&self) -> &str {
        "youtube"
    }

    async fn call(&self, operation: &str, params: &Map<String, Value>) -> Result<Value> {
        match operation {
            "search" => self.search(params).await,
            "trending" => self.trending(params).await,
            "create_playlist" => self.create_playlist(params).await,
            "search_and_create_playlist" => self.search_and_create_playlist(params).await,
            other => Err(unknown_operation("youtube", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> YoutubeConnector {
        YoutubeConnector::new(&YoutubeConfig::default())
    }

    #[tokio::test]
    async fn test_missing_key() {
        let mut params = Map::new();
        params.insert("query".into(), json!("lofi"));
        let err = connector().call("search", &params).await.unwrap_err();
        assert!(err.to_string().contains("api_key not configured"));
    }

    #[tokio::test]
    async fn test_missing_query() {
        let err = connector().call("search", &Map::new()).await.unwrap_err();
        assert!(err.to_string().contains("'query'"));
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let err = connector().call("upload", &Map::new()).await.unwrap_err();
        assert!(err.to_string().contains("no operation"));
    }
}

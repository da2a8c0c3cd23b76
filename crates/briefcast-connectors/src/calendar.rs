//! Calendar connector — REST client against a configured calendar bridge.
//!
//! The bridge owns authentication with the actual calendar provider; this
//! side only needs an endpoint and a bearer token. Time-window parameters
//! accept relative expressions ("today", "yesterday", "3 days ago") as well
//! as ISO-8601.

use async_trait::async_trait;
use briefcast_core::config::CalendarConfig;
use briefcast_core::error::{BriefcastError, Result};
use briefcast_core::traits::Connector;
use briefcast_executor::values;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};

use crate::{opt_str, opt_u64, unknown_operation};

pub struct CalendarConnector {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl CalendarConnector {
    pub fn new(config: &CalendarConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn require_endpoint(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(BriefcastError::Connector(
                "calendar endpoint not configured ([calendar] in config.toml)".into(),
            ));
        }
        Ok(())
    }

    /// Resolve a time-window bound: relative expression, ISO-8601, or the
    /// given default.
    fn window_bound(
        params: &Map<String, Value>,
        key: &str,
        tz: &Tz,
        default: DateTime<Utc>,
    ) -> DateTime<Utc> {
        opt_str(params, key)
            .and_then(|s| values::parse_relative_date(s, tz, Utc::now()))
            .unwrap_or(default)
    }

    async fn list_events(&self, params: &Map<String, Value>) -> Result<Value> {
        self.require_endpoint()?;
        let tz: Tz = opt_str(params, "timezone")
            .and_then(|s| s.parse().ok())
            .unwrap_or(chrono_tz::UTC);

        let now = Utc::now();
        let today_start = now
            .with_timezone(&tz)
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_local_timezone(tz).earliest())
            .flatten()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);

        let time_min = Self::window_bound(params, "time_min", &tz, today_start);
        let time_max =
            Self::window_bound(params, "time_max", &tz, today_start + Duration::days(1));
        let max_results = opt_u64(params, "max_results").unwrap_or(50);

        let resp = self
            .client
            .get(format!("{}/events", self.endpoint))
            .bearer_auth(&self.api_key)
            .query(&[
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("maxResults", max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| BriefcastError::Connector(format!("calendar request: {e}")))?;

        if !resp.status().is_success() {
            return Err(BriefcastError::Connector(format!(
                "calendar returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| BriefcastError::Connector(format!("calendar response: {e}")))
    }

    /// Today's events: list_events with the window pinned to the local day.
    async fn get_today(&self, params: &Map<String, Value>) -> Result<Value> {
        let mut scoped = params.clone();
        scoped.insert("time_min".into(), Value::String("today".into()));
        scoped.insert("time_max".into(), Value::String("tomorrow".into()));
        self.list_events(&scoped).await
    }
}

#[async_trait]
impl Connector for CalendarConnector {
    fn service(&self) -> &str {
        "calendar"
    }

    async fn call(&self, operation: &str, params: &Map<String, Value>) -> Result<Value> {
        match operation {
            "list_events" => self.list_events(params).await,
            "get_today" => self.get_today(params).await,
            other => Err(unknown_operation("calendar", other)),
        }
    }
}

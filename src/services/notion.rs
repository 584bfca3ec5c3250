// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notion API client for querying and writing database rows.
//!
//! Handles:
//! - Cursor pagination over database queries
//! - Page create/update
//! - Database schema read/update
//! - Request pacing, 429 backoff and transport retries

use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, Stream, TryStreamExt};
use reqwest::{header::HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{AppError, Result};

pub const NOTION_API_VERSION: &str = "2022-06-28";
pub const NOTION_BASE_URL: &str = "https://api.notion.com/v1";

/// Default (and maximum) Notion page size for database queries.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Attempts per call, shared by 429 and transport retries.
const MAX_ATTEMPTS: u32 = 3;

/// `retry-after` used when a 429 carries no usable header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Position of a full database scan.
enum ScanCursor {
    Start,
    Next(String),
    Done,
}

/// Notion API client.
///
/// Clones share the pacing timer, so every request made through any clone
/// respects the same minimum spacing.
#[derive(Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    rate_limit_delay: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl NotionClient {
    /// Create a new Notion client.
    pub fn new(token: impl Into<String>, rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            http: super::http_client()?,
            base_url: NOTION_BASE_URL.to_string(),
            token: token.into(),
            rate_limit_delay,
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.notion_token.clone(), config.rate_limit_delay)
    }

    /// Point the client at a different API root (e.g. a local test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    // ─── Databases ───────────────────────────────────────────────────────────

    /// Query one page of a database.
    pub async fn query_database(
        &self,
        database_id: &str,
        start_cursor: Option<&str>,
        page_size: u32,
        sorts: Option<&Value>,
    ) -> Result<QueryPage> {
        let mut body = json!({ "page_size": page_size });
        if let Some(cursor) = start_cursor {
            body["start_cursor"] = json!(cursor);
        }
        if let Some(sorts) = sorts {
            body["sorts"] = sorts.clone();
        }

        self.request(
            Method::POST,
            &format!("/databases/{}/query", database_id),
            Some(&body),
        )
        .await
    }

    /// Stream every row of a database, following `next_cursor` until
    /// `has_more` is false.
    ///
    /// Each call starts a fresh query from the first page.
    pub fn query_database_all<'a>(
        &'a self,
        database_id: &'a str,
    ) -> impl Stream<Item = Result<NotionPage>> + 'a {
        stream::try_unfold(ScanCursor::Start, move |cursor| {
            self.next_rows(database_id, cursor)
        })
        .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<_, AppError>)))
        .try_flatten()
    }

    /// Fetch the rows at `cursor` and the cursor that follows them.
    async fn next_rows(
        &self,
        database_id: &str,
        cursor: ScanCursor,
    ) -> Result<Option<(Vec<NotionPage>, ScanCursor)>> {
        let start_cursor = match cursor {
            ScanCursor::Done => return Ok(None),
            ScanCursor::Start => None,
            ScanCursor::Next(c) => Some(c),
        };

        let page = self
            .query_database(database_id, start_cursor.as_deref(), DEFAULT_PAGE_SIZE, None)
            .await?;

        tracing::debug!(
            database_id,
            rows = page.results.len(),
            has_more = page.has_more,
            "Fetched database page"
        );

        // A missing cursor ends the scan even if has_more is set.
        let next = match (page.has_more, page.next_cursor) {
            (true, Some(c)) => ScanCursor::Next(c),
            _ => ScanCursor::Done,
        };

        Ok(Some((page.results, next)))
    }

    /// Get database metadata including its schema.
    pub async fn get_database(&self, database_id: &str) -> Result<NotionDatabase> {
        self.request(Method::GET, &format!("/databases/{}", database_id), None)
            .await
    }

    /// Add or overwrite database property definitions.
    pub async fn update_database(&self, database_id: &str, properties: &Value) -> Result<()> {
        let _: Value = self
            .request(
                Method::PATCH,
                &format!("/databases/{}", database_id),
                Some(&json!({ "properties": properties })),
            )
            .await?;
        Ok(())
    }

    // ─── Pages ───────────────────────────────────────────────────────────────

    /// Create a new row in a database.
    pub async fn create_page(&self, database_id: &str, properties: &Value) -> Result<NotionPage> {
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        self.request(Method::POST, "/pages", Some(&body)).await
    }

    /// Update an existing row's properties.
    pub async fn update_page(&self, page_id: &str, properties: &Value) -> Result<()> {
        let _: Value = self
            .request(
                Method::PATCH,
                &format!("/pages/{}", page_id),
                Some(&json!({ "properties": properties })),
            )
            .await?;
        Ok(())
    }

    // ─── Request execution ───────────────────────────────────────────────────

    /// Wait at least `min_wait`, and until `rate_limit_delay` has passed
    /// since the previous request, then stamp this request's send time.
    ///
    /// Runs before every attempt, retries included. The lock is held across
    /// the sleep, so clones queue behind each other.
    async fn pace(&self, min_wait: Duration) {
        let mut last = self.last_request.lock().await;
        let spacing = last
            .map(|prev| self.rate_limit_delay.saturating_sub(prev.elapsed()))
            .unwrap_or(Duration::ZERO);
        let wait = min_wait.max(spacing);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        *last = Some(Instant::now());
    }

    /// Make an API request with pacing and retries.
    ///
    /// - 429: wait `retry-after` seconds and retry
    /// - other >= 400: fail immediately with the API's message
    /// - transport failure: wait 2^attempt seconds and retry
    ///
    /// All retries draw from the same budget of `MAX_ATTEMPTS`. Every
    /// attempt is paced, so a retry never lands closer than
    /// `rate_limit_delay` to the request before it.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut retry_wait = Duration::ZERO;

        for attempt in 0..MAX_ATTEMPTS {
            let last_attempt = attempt + 1 == MAX_ATTEMPTS;
            self.pace(retry_wait).await;

            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.token)
                .header("Notion-Version", NOTION_API_VERSION);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    if last_attempt {
                        return Err(AppError::remote(0, e.to_string()));
                    }
                    retry_wait = Duration::from_secs(1 << attempt);
                    tracing::warn!(error = %e, %url, backoff = ?retry_wait, "Notion request failed, retrying");
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = retry_after_secs(response.headers());
                if last_attempt {
                    tracing::warn!(retry_after, "Notion rate limit retries exhausted");
                    return Err(AppError::RateLimitExceeded { retry_after });
                }
                tracing::warn!(retry_after, attempt, "Notion rate limit hit (429)");
                retry_wait = Duration::from_secs(retry_after);
                continue;
            }

            if status.as_u16() >= 400 {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::remote(status.as_u16(), error_message(&body)));
            }

            tracing::debug!(%method, path, status = status.as_u16(), "Notion request ok");

            match response.json::<T>().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_decode() => {
                    return Err(AppError::remote(
                        status.as_u16(),
                        format!("JSON parse error: {}", e),
                    ));
                }
                Err(e) => {
                    if last_attempt {
                        return Err(AppError::remote(0, e.to_string()));
                    }
                    retry_wait = Duration::from_secs(1 << attempt);
                    tracing::warn!(error = %e, %url, backoff = ?retry_wait, "Notion response read failed, retrying");
                }
            }
        }

        Err(AppError::remote(0, "Max retries exceeded"))
    }
}

/// Seconds to wait from a 429 response's `retry-after` header.
fn retry_after_secs(headers: &HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Extract the `message` field from a Notion error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "Unknown error".to_string()
            } else {
                body.trim().to_string()
            }
        })
}

/// One page of database query results.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryPage {
    #[serde(default)]
    pub results: Vec<NotionPage>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// A database row: its page ID plus the raw property bag.
#[derive(Debug, Clone, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl NotionPage {
    /// First text fragment of a rich_text property, if non-empty.
    pub fn rich_text(&self, name: &str) -> Option<&str> {
        let first = self.properties.get(name)?.get("rich_text")?.get(0)?;
        first
            .get("plain_text")
            .or_else(|| first.get("text").and_then(|t| t.get("content")))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Option name of a select property.
    pub fn select_name(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)?
            .get("select")?
            .get("name")?
            .as_str()
    }

    /// `start` of a date property.
    pub fn date_start(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)?
            .get("date")?
            .get("start")?
            .as_str()
            .filter(|s| !s.is_empty())
    }
}

/// Database metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct NotionDatabase {
    pub id: String,
    #[serde(default)]
    pub title: Vec<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl NotionDatabase {
    /// Plain-text database title, or "Unknown".
    pub fn title(&self) -> &str {
        self.title
            .first()
            .and_then(|t| t.get("plain_text"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
    }
}

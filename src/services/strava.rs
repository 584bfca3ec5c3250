// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for fetching activities.
//!
//! Handles:
//! - Access token refresh from the configured refresh token
//! - One refresh-and-retry when the API rejects the access token (401)
//! - Paginated activity listing
//! - Authorization code exchange for the one-time `auth` flow

use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Activity;

pub const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
pub const STRAVA_OAUTH_BASE: &str = "https://www.strava.com/oauth";

/// Default page size for activity listing (Strava allows up to 200).
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Largest page Strava serves; bigger requests come back capped.
pub const MAX_PER_PAGE: u32 = 200;

/// Scope requested by the `auth` command.
pub const AUTH_SCOPE: &str = "activity:read_all";

/// Strava API client.
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
    refresh_token: Option<String>,
    /// Short-lived access token, fetched on first use.
    access_token: Mutex<Option<String>>,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(
        client_id: String,
        client_secret: String,
        refresh_token: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            http: super::http_client()?,
            api_base: STRAVA_API_BASE.to_string(),
            oauth_base: STRAVA_OAUTH_BASE.to_string(),
            client_id,
            client_secret,
            refresh_token,
            access_token: Mutex::new(None),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
            config.strava_refresh_token.clone(),
        )
    }

    /// Point the client at different API and OAuth roots (e.g. a local test server).
    pub fn with_urls(mut self, api_base: impl Into<String>, oauth_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.oauth_base = oauth_base.into().trim_end_matches('/').to_string();
        self
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get the cached access token, refreshing it on first use.
    pub async fn ensure_token(&self) -> Result<String> {
        if let Some(token) = self.access_token.lock().await.as_ref() {
            return Ok(token.clone());
        }
        self.refresh_access_token().await
    }

    /// Exchange the refresh token for a new access token and cache it.
    pub async fn refresh_access_token(&self) -> Result<String> {
        let refresh_token = self.refresh_token.as_deref().ok_or_else(|| {
            AppError::Auth("No refresh token configured. Run 'strava2notion auth' first.".into())
        })?;

        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("Token refresh request failed: {}", e)))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!(
                "Token refresh failed ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let tokens: TokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Failed to parse token response: {}", e)))?;

        tracing::info!("Strava access token refreshed");

        *self.access_token.lock().await = Some(tokens.access_token.clone());
        Ok(tokens.access_token)
    }

    // ─── OAuth Bootstrap ─────────────────────────────────────────────────────

    /// Browser URL that asks the athlete to authorize this app.
    pub fn authorize_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}/authorize?client_id={}&redirect_uri={}&response_type=code&scope={}",
            self.oauth_base,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(AUTH_SCOPE),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("Token exchange failed: {}", e)))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token exchange failed");
            return Err(AppError::Auth(format!(
                "Token exchange failed with status {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Failed to parse token response: {}", e)))
    }

    // ─── API Calls ───────────────────────────────────────────────────────────

    /// Make an authenticated API request.
    ///
    /// A 401 triggers exactly one token refresh and one retry.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.api_base, path);

        let token = self.ensure_token().await?;
        let mut response = self.send(method.clone(), &url, params, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path, "Strava rejected access token (401), refreshing");
            let token = self.refresh_access_token().await?;
            response = self.send(method, &url, params, &token).await?;
        }

        self.check_response_json(response).await
    }

    /// List the athlete's activities, optionally bounded by `after`/`before`.
    ///
    /// Pages are requested from 1 upwards until a page comes back empty or
    /// shorter than `per_page`, which is clamped to `1..=MAX_PER_PAGE`.
    pub async fn list_activities(
        &self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
        per_page: u32,
    ) -> Result<Vec<Activity>> {
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let mut activities = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut params = vec![
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(after) = after {
                params.push(("after", after.timestamp().to_string()));
            }
            if let Some(before) = before {
                params.push(("before", before.timestamp().to_string()));
            }

            let items: Vec<Value> = self
                .request(Method::GET, "/athlete/activities", &params)
                .await?;

            tracing::debug!(page, count = items.len(), "Fetched Strava activity page");

            if items.is_empty() {
                break;
            }

            for item in &items {
                activities.push(Activity::from_strava_api(item)?);
            }

            if items.len() < per_page as usize {
                break;
            }
            page += 1;
        }

        tracing::info!(count = activities.len(), "Fetched activities from Strava");
        Ok(activities)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, String)],
        access_token: &str,
    ) -> Result<reqwest::Response> {
        self.http
            .request(method, url)
            .bearer_auth(access_token)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::remote(0, format!("Strava API request failed: {}", e)))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!("Strava rate limit hit (429)");
            }

            return Err(AppError::remote(
                status.as_u16(),
                format!("Strava API error: {}", body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::remote(status.as_u16(), format!("JSON parse error: {}", e)))
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub start_date_local: String,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub moving_time: Option<u64>,
    #[serde(default)]
    pub total_elevation_gain: Option<f64>,
    #[serde(default)]
    pub weighted_average_watts: Option<f64>,
}

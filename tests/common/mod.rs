// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process fake Notion and Strava servers for integration tests.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strava2notion::models::Activity;
use strava2notion::services::{NotionClient, StravaClient};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Build an activity payload as returned by Strava's list endpoint.
#[allow(dead_code)]
pub fn strava_activity_json(id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": "Run",
        "start_date_local": "2024-01-15T07:30:00Z",
        "distance": 5000.0,
        "moving_time": 1800,
        "total_elevation_gain": 12.0,
        "weighted_average_watts": null
    })
}

#[allow(dead_code)]
pub fn activity(id: u64, name: &str) -> Activity {
    Activity::from_strava_api(&strava_activity_json(id, name)).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Fake Notion
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct NotionState {
    /// (page id, properties) in insertion order
    pub rows: Vec<(String, Value)>,
    /// Server-side cap on rows per query page
    pub max_page_size: usize,
    pub schema: Value,
    pub creates: usize,
    pub updates: usize,
    pub queries: usize,
    /// Creates succeed this many times, then return 500
    pub fail_creates_after: Option<usize>,
    next_id: usize,
}

pub type SharedNotion = Arc<Mutex<NotionState>>;

#[allow(dead_code)]
pub struct FakeNotion {
    pub state: SharedNotion,
    pub base_url: String,
}

#[allow(dead_code)]
impl FakeNotion {
    pub async fn start() -> Self {
        Self::start_with_page_size(100).await
    }

    pub async fn start_with_page_size(max_page_size: usize) -> Self {
        let state = Arc::new(Mutex::new(NotionState {
            max_page_size,
            schema: json!({}),
            ..Default::default()
        }));
        let router = Router::new()
            .route("/databases/{id}/query", post(query_database))
            .route("/databases/{id}", get(get_database).patch(update_database))
            .route("/pages", post(create_page))
            .route("/pages/{id}", patch(update_page))
            .with_state(state.clone());
        let base_url = spawn(router).await;
        Self { state, base_url }
    }

    pub fn client(&self) -> NotionClient {
        NotionClient::new("secret_test", Duration::ZERO)
            .unwrap()
            .with_base_url(&self.base_url)
    }

    /// Insert a row directly, bypassing the API.
    pub fn seed_row(&self, strava_id: Option<&str>, date: Option<&str>, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("seed-{}", state.next_id);
        let mut properties = json!({
            "Name": { "title": [{ "text": { "content": name } }] },
            "Type": { "select": { "name": "Run" } },
        });
        if let Some(strava_id) = strava_id {
            properties["Strava ID"] = json!({ "rich_text": [{ "text": { "content": strava_id } }] });
        } else {
            properties["Strava ID"] = json!({ "rich_text": [] });
        }
        properties["Date"] = match date {
            Some(d) => json!({ "date": { "start": d } }),
            None => json!({ "date": null }),
        };
        state.rows.push((id.clone(), properties));
        id
    }

    pub fn row_count(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    pub fn creates(&self) -> usize {
        self.state.lock().unwrap().creates
    }

    pub fn updates(&self) -> usize {
        self.state.lock().unwrap().updates
    }

    /// Every stored row, as (page id, properties), in insertion order.
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().rows.clone()
    }

    /// Properties of the row whose Strava ID text equals `strava_id`.
    pub fn rows_with_strava_id(&self, strava_id: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|(_, p)| p["Strava ID"]["rich_text"][0]["text"]["content"] == strava_id)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

/// Render a stored row the way Notion returns pages (with `plain_text`).
fn render_page(id: &str, properties: &Value) -> Value {
    let mut properties = properties.clone();
    if let Some(map) = properties.as_object_mut() {
        for prop in map.values_mut() {
            for key in ["rich_text", "title"] {
                if let Some(items) = prop.get_mut(key).and_then(Value::as_array_mut) {
                    for item in items {
                        let text = item["text"]["content"].clone();
                        item["plain_text"] = text;
                    }
                }
            }
        }
    }
    json!({ "object": "page", "id": id, "properties": properties })
}

fn notion_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "object": "error", "status": status.as_u16(), "message": message })),
    )
        .into_response()
}

async fn query_database(
    State(state): State<SharedNotion>,
    Path(_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.queries += 1;

    let requested = body["page_size"].as_u64().unwrap_or(100) as usize;
    let page_size = requested.min(state.max_page_size).max(1);
    let start: usize = body["start_cursor"]
        .as_str()
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);
    let end = (start + page_size).min(state.rows.len());

    let results: Vec<Value> = state.rows[start.min(end)..end]
        .iter()
        .map(|(id, p)| render_page(id, p))
        .collect();
    let has_more = end < state.rows.len();
    let next_cursor = has_more.then(|| end.to_string());

    Json(json!({
        "object": "list",
        "results": results,
        "next_cursor": next_cursor,
        "has_more": has_more,
    }))
    .into_response()
}

async fn get_database(State(state): State<SharedNotion>, Path(id): Path<String>) -> Response {
    let state = state.lock().unwrap();
    Json(json!({
        "object": "database",
        "id": id,
        "title": [{ "plain_text": "Training Log" }],
        "properties": state.schema,
    }))
    .into_response()
}

async fn update_database(
    State(state): State<SharedNotion>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.schema = body["properties"].clone();
    Json(json!({ "object": "database", "id": id, "properties": state.schema })).into_response()
}

async fn create_page(State(state): State<SharedNotion>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    if state
        .fail_creates_after
        .is_some_and(|limit| state.creates >= limit)
    {
        return notion_error(StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error");
    }
    if body["parent"]["database_id"].as_str().is_none() {
        return notion_error(StatusCode::BAD_REQUEST, "parent.database_id is required");
    }

    state.creates += 1;
    state.next_id += 1;
    let id = format!("page-{}", state.next_id);
    let properties = body["properties"].clone();
    state.rows.push((id.clone(), properties.clone()));
    Json(render_page(&id, &properties)).into_response()
}

async fn update_page(
    State(state): State<SharedNotion>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    let Some(index) = state.rows.iter().position(|(row_id, _)| *row_id == id) else {
        return notion_error(StatusCode::NOT_FOUND, "Could not find page");
    };

    let updates = body["properties"].as_object().cloned().unwrap_or_default();
    if let Some(existing) = state.rows[index].1.as_object_mut() {
        for (k, v) in updates {
            existing.insert(k, v);
        }
    }
    state.updates += 1;
    let properties = state.rows[index].1.clone();
    Json(render_page(&id, &properties)).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Fake Strava
// ─────────────────────────────────────────────────────────────────────────────

pub const GOOD_REFRESH_TOKEN: &str = "good-refresh";
pub const GOOD_AUTH_CODE: &str = "good-code";

#[derive(Default)]
pub struct StravaState {
    pub activities: Vec<Value>,
    /// Currently accepted access token
    pub valid_token: Option<String>,
    pub refresh_calls: usize,
    /// Query parameters of every activity list request
    pub list_requests: Vec<HashMap<String, String>>,
    /// Reject every API call with 401, even with a fresh token
    pub always_unauthorized: bool,
    issued: usize,
}

pub type SharedStrava = Arc<Mutex<StravaState>>;

#[allow(dead_code)]
pub struct FakeStrava {
    pub state: SharedStrava,
    pub base_url: String,
}

#[allow(dead_code)]
impl FakeStrava {
    pub async fn start(activities: Vec<Value>) -> Self {
        let state = Arc::new(Mutex::new(StravaState {
            activities,
            ..Default::default()
        }));
        let router = Router::new()
            .route("/oauth/token", post(token))
            .route("/api/v3/athlete/activities", get(list_activities))
            .with_state(state.clone());
        let base_url = spawn(router).await;
        Self { state, base_url }
    }

    pub fn client(&self, refresh_token: Option<&str>) -> StravaClient {
        StravaClient::new(
            "client-id".to_string(),
            "client-secret".to_string(),
            refresh_token.map(str::to_string),
        )
        .unwrap()
        .with_urls(
            format!("{}/api/v3", self.base_url),
            format!("{}/oauth", self.base_url),
        )
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.lock().unwrap().refresh_calls
    }

    pub fn list_requests(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().unwrap().list_requests.clone()
    }

    /// Invalidate the current access token (simulates expiry).
    pub fn expire_token(&self) {
        self.state.lock().unwrap().valid_token = None;
    }
}

async fn token(
    State(state): State<SharedStrava>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();

    let accepted = match form.get("grant_type").map(String::as_str) {
        Some("refresh_token") => {
            state.refresh_calls += 1;
            form.get("refresh_token").map(String::as_str) == Some(GOOD_REFRESH_TOKEN)
        }
        Some("authorization_code") => form.get("code").map(String::as_str) == Some(GOOD_AUTH_CODE),
        _ => false,
    };
    if !accepted || form.get("client_secret").map(String::as_str) != Some("client-secret") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Bad Request", "errors": [{ "code": "invalid" }] })),
        )
            .into_response();
    }

    state.issued += 1;
    let access_token = format!("access-{}", state.issued);
    state.valid_token = Some(access_token.clone());
    Json(json!({
        "token_type": "Bearer",
        "access_token": access_token,
        "refresh_token": GOOD_REFRESH_TOKEN,
        "expires_at": 1_900_000_000,
        "expires_in": 21600
    }))
    .into_response()
}

async fn list_activities(
    State(state): State<SharedStrava>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();

    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    if state.always_unauthorized || bearer.is_none() || bearer != state.valid_token {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Authorization Error" })),
        )
            .into_response();
    }

    state.list_requests.push(params.clone());

    let per_page: usize = params
        .get("per_page")
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);
    let page: usize = params.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);
    let start = (page.saturating_sub(1) * per_page).min(state.activities.len());
    let end = (start + per_page).min(state.activities.len());

    Json(Value::Array(state.activities[start..end].to_vec())).into_response()
}

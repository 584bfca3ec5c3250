// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - API clients and sync logic.

pub mod notion;
pub mod schema;
pub mod status;
pub mod strava;
pub mod sync;

pub use notion::{NotionClient, NotionPage};
pub use strava::StravaClient;
pub use sync::{ActivitySyncer, SyncAction, SyncCounts};

use crate::error::{AppError, Result};
use std::time::Duration;

/// Per-request timeout for both APIs.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client shared by a single API client instance.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))
}

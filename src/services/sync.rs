// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity upsert into Notion.
//!
//! Handles the core workflow:
//! 1. Scan the database once and index rows by their `Strava ID` text
//! 2. Track the most recent `Date` so callers can fetch only newer activities
//! 3. For each activity, update the indexed row or create a new one
//!
//! Assumes this process is the only writer to the database for the run.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::{pin_mut, TryStreamExt};

use crate::error::{AppError, Result};
use crate::models::schema::props;
use crate::models::Activity;
use crate::services::NotionClient;

/// What `sync_activity` did with an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Updated,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Created => "created",
            SyncAction::Updated => "updated",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Totals from `sync_activities`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub created: usize,
    pub updated: usize,
}

impl SyncCounts {
    fn record(&mut self, action: SyncAction) {
        match action {
            SyncAction::Created => self.created += 1,
            SyncAction::Updated => self.updated += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Uninitialized,
    Indexed,
}

/// Upserts activities into one Notion database, keyed by Strava ID.
pub struct ActivitySyncer {
    client: NotionClient,
    database_id: String,
    state: SyncState,
    /// Strava ID (as text) -> Notion page ID
    strava_id_to_page_id: HashMap<String, String>,
    most_recent_date: Option<DateTime<Utc>>,
}

impl ActivitySyncer {
    pub fn new(client: NotionClient, database_id: impl Into<String>) -> Self {
        Self {
            client,
            database_id: database_id.into(),
            state: SyncState::Uninitialized,
            strava_id_to_page_id: HashMap::new(),
            most_recent_date: None,
        }
    }

    /// Load every existing row and rebuild the lookup index.
    ///
    /// Rows without a `Strava ID` are not indexed. Rows whose `Date` does not
    /// parse are skipped for the most-recent tracking only.
    pub async fn initialize(&mut self) -> Result<()> {
        let mut index = HashMap::new();
        let mut most_recent: Option<DateTime<Utc>> = None;

        let pages = self.client.query_database_all(&self.database_id);
        pin_mut!(pages);

        while let Some(page) = pages.try_next().await? {
            if let Some(strava_id) = page.rich_text(props::STRAVA_ID) {
                index.insert(strava_id.to_string(), page.id.clone());
            }

            if let Some(date) = page.date_start(props::DATE).and_then(parse_notion_date) {
                if most_recent.map_or(true, |cur| date > cur) {
                    most_recent = Some(date);
                }
            }
        }

        tracing::info!(
            database_id = %self.database_id,
            existing = index.len(),
            most_recent = ?most_recent,
            "Indexed existing Notion rows"
        );

        self.strava_id_to_page_id = index;
        self.most_recent_date = most_recent;
        self.state = SyncState::Indexed;
        Ok(())
    }

    /// Upsert one activity. Returns the Notion page ID and what was done.
    pub async fn sync_activity(&mut self, activity: &Activity) -> Result<(String, SyncAction)> {
        if self.state != SyncState::Indexed {
            return Err(AppError::NotInitialized);
        }

        let key = activity.strava_id.to_string();
        let properties = activity.to_notion_properties();

        if let Some(page_id) = self.strava_id_to_page_id.get(&key) {
            self.client.update_page(page_id, &properties).await?;
            tracing::debug!(strava_id = activity.strava_id, page_id = %page_id, "Updated row");
            return Ok((page_id.clone(), SyncAction::Updated));
        }

        let page = self
            .client
            .create_page(&self.database_id, &properties)
            .await?;
        tracing::debug!(strava_id = activity.strava_id, page_id = %page.id, "Created row");
        self.strava_id_to_page_id.insert(key, page.id.clone());
        Ok((page.id, SyncAction::Created))
    }

    /// Upsert activities in order, calling `on_progress` after each one.
    ///
    /// Stops at the first failure; rows already written stay written.
    pub async fn sync_activities<F>(
        &mut self,
        activities: &[Activity],
        mut on_progress: F,
    ) -> Result<SyncCounts>
    where
        F: FnMut(&Activity, SyncAction),
    {
        let mut counts = SyncCounts::default();

        for activity in activities {
            let (_, action) = self.sync_activity(activity).await.inspect_err(|e| {
                tracing::error!(
                    strava_id = activity.strava_id,
                    name = %activity.name,
                    error = %e,
                    "Failed to sync activity"
                )
            })?;
            counts.record(action);
            on_progress(activity, action);
        }

        tracing::info!(
            created = counts.created,
            updated = counts.updated,
            "Sync finished"
        );
        Ok(counts)
    }

    /// Number of indexed rows.
    pub fn existing_count(&self) -> usize {
        self.strava_id_to_page_id.len()
    }

    /// Most recent activity date in the database.
    pub fn most_recent_activity_date(&self) -> Option<DateTime<Utc>> {
        self.most_recent_date
    }

    /// `after` filter for the Strava fetch: the most recent known date,
    /// unless a full resync is requested.
    pub fn fetch_after(&self, full: bool) -> Option<DateTime<Utc>> {
        if full {
            None
        } else {
            self.most_recent_date
        }
    }
}

/// Parse a Notion date `start`: either `YYYY-MM-DD` or a datetime with or
/// without offset. Datetimes without offset and bare dates are read as UTC.
fn parse_notion_date(raw: &str) -> Option<DateTime<Utc>> {
    if raw.contains('T') {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    } else {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }
}

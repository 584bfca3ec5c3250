//! Database statistics for the `status` command.
//!
//! Computed from a full scan of the Notion database.

use std::collections::HashMap;

use crate::models::schema::props;
use crate::services::notion::NotionPage;

/// Label used for rows with no `Type` select.
pub const UNKNOWN_TYPE: &str = "Unknown";

/// Aggregate statistics over all rows of the database.
#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    /// Database title
    pub title: String,
    /// Total rows seen
    pub total_activities: usize,
    /// Largest `Date` start value (ISO 8601, compared as text)
    pub most_recent: Option<String>,
    /// Row count per activity type
    pub activities_by_type: HashMap<String, usize>,
}

impl DatabaseStats {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Fold one database row into the aggregates.
    pub fn record_page(&mut self, page: &NotionPage) {
        self.total_activities += 1;

        let activity_type = page.select_name(props::TYPE).unwrap_or(UNKNOWN_TYPE);
        *self
            .activities_by_type
            .entry(activity_type.to_string())
            .or_insert(0) += 1;

        if let Some(start) = page.date_start(props::DATE) {
            if self.most_recent.as_deref().map_or(true, |cur| start > cur) {
                self.most_recent = Some(start.to_string());
            }
        }
    }

    /// Calendar day of the most recent activity (first 10 chars of the date).
    pub fn most_recent_day(&self) -> Option<&str> {
        self.most_recent
            .as_deref()
            .map(|d| d.get(..10).unwrap_or(d))
    }

    /// Type counts, largest first (ties broken by name).
    pub fn types_by_count(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = self
            .activities_by_type
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        counts
    }
}

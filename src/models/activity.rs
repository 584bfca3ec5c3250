// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava activity model and its Notion property mapping.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::models::schema::props;
use crate::services::strava::StravaActivitySummary;

/// A Strava activity, normalized for syncing.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    /// Strava activity ID (dedup key in Notion)
    pub strava_id: u64,
    /// Activity name/title
    pub name: String,
    /// Activity type (Run, Ride, Swim, etc.)
    pub activity_type: String,
    /// Start time in the athlete's local time zone
    pub start_date_local: NaiveDateTime,
    /// Distance in meters
    pub distance_meters: f64,
    /// Moving time in seconds
    pub moving_time_seconds: u64,
    /// Total elevation gain in meters
    pub elevation_gain_meters: f64,
    /// Weighted average power in watts, if the activity has power data
    pub weighted_average_watts: Option<i64>,
}

impl Activity {
    /// Build an activity from one item of the Strava activity list.
    ///
    /// Fails with `AppError::Validation` when `id`, `name`, `type` or
    /// `start_date_local` is missing or malformed.
    pub fn from_strava_api(data: &Value) -> Result<Self> {
        let summary: StravaActivitySummary = serde_json::from_value(data.clone())
            .map_err(|e| AppError::Validation(e.to_string()))?;
        Self::try_from(summary)
    }

    /// Distance in kilometers, rounded to 2 decimals.
    pub fn distance_km(&self) -> f64 {
        round2(self.distance_meters / 1000.0)
    }

    /// Moving time in hours, rounded to 2 decimals.
    pub fn time_hours(&self) -> f64 {
        round2(self.moving_time_seconds as f64 / 3600.0)
    }

    /// Weighted average power, 0 when the activity has none.
    pub fn power(&self) -> i64 {
        self.weighted_average_watts.unwrap_or(0)
    }

    /// Link to the activity on Strava.
    pub fn strava_url(&self) -> String {
        format!("https://strava.com/activities/{}", self.strava_id)
    }

    /// Notion property bag for this activity.
    ///
    /// Keys and shapes must match the database schema in
    /// [`crate::models::schema::activity_schema`].
    pub fn to_notion_properties(&self) -> Value {
        json!({
            (props::NAME): { "title": [{ "text": { "content": self.name } }] },
            (props::TYPE): { "select": { "name": self.activity_type } },
            (props::LENGTH): { "number": self.distance_km() },
            (props::TIME): { "number": self.time_hours() },
            (props::POWER): { "number": self.power() },
            (props::ELEVATION): { "number": self.elevation_gain_meters },
            (props::DATE): { "date": { "start": self.start_date_local.format("%Y-%m-%dT%H:%M:%S").to_string() } },
            (props::STRAVA_LINK): { "url": self.strava_url() },
            (props::STRAVA_ID): { "rich_text": [{ "text": { "content": self.strava_id.to_string() } }] },
        })
    }

    /// One-line description for dry-run listings.
    pub fn summary(&self) -> String {
        format!(
            "{} ({}) - {}km, {}",
            self.name,
            self.activity_type,
            self.distance_km(),
            self.start_date_local.date()
        )
    }
}

impl TryFrom<StravaActivitySummary> for Activity {
    type Error = AppError;

    fn try_from(summary: StravaActivitySummary) -> Result<Self> {
        let start_date_local = parse_local_timestamp(&summary.start_date_local).ok_or_else(|| {
            AppError::Validation(format!(
                "activity {}: unparsable start_date_local {:?}",
                summary.id, summary.start_date_local
            ))
        })?;

        Ok(Self {
            strava_id: summary.id,
            name: summary.name,
            activity_type: summary.activity_type,
            start_date_local,
            distance_meters: summary.distance.unwrap_or(0.0),
            moving_time_seconds: summary.moving_time.unwrap_or(0),
            elevation_gain_meters: summary.total_elevation_gain.unwrap_or(0.0),
            weighted_average_watts: summary.weighted_average_watts.map(|w| w.round() as i64),
        })
    }
}

/// Parse Strava's `start_date_local`.
///
/// Strava marks local times with a trailing `Z` even though they are not
/// UTC, so the suffix is dropped and the wall-clock time kept.
fn parse_local_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let wall_clock = raw.strip_suffix('Z').unwrap_or(raw);

    NaiveDateTime::parse_from_str(wall_clock, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            NaiveDate::parse_from_str(wall_clock, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

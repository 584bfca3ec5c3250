// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Notion database schema for synced activities.

use serde_json::{json, Value};

/// Property names used in the Notion database.
pub mod props {
    pub const NAME: &str = "Name";
    pub const TYPE: &str = "Type";
    /// Distance (km)
    pub const LENGTH: &str = "Length";
    /// Moving time (hours)
    pub const TIME: &str = "Time";
    /// Weighted average power (watts)
    pub const POWER: &str = "Power";
    /// Elevation gain (meters)
    pub const ELEVATION: &str = "Elevation";
    pub const DATE: &str = "Date";
    pub const STRAVA_LINK: &str = "Strava Link";
    /// Text copy of the Strava activity ID, used for deduplication
    pub const STRAVA_ID: &str = "Strava ID";
}

/// Property definitions written by `init-schema`.
pub fn activity_schema() -> Value {
    json!({
        (props::NAME): { "title": {} },
        (props::TYPE): { "select": {} },
        (props::LENGTH): { "number": { "format": "number" } },
        (props::TIME): { "number": { "format": "number" } },
        (props::POWER): { "number": { "format": "number" } },
        (props::ELEVATION): { "number": { "format": "number" } },
        (props::DATE): { "date": {} },
        (props::STRAVA_LINK): { "url": {} },
        (props::STRAVA_ID): { "rich_text": {} },
    })
}

/// Property type of a schema entry ("title", "number", ...).
pub fn property_type(definition: &Value) -> &str {
    definition
        .as_object()
        .and_then(|o| o.keys().next())
        .map(String::as_str)
        .unwrap_or("unknown")
}

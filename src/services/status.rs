// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database status report.

use futures_util::{pin_mut, TryStreamExt};

use crate::error::Result;
use crate::models::DatabaseStats;
use crate::services::NotionClient;

/// Scan the whole database and aggregate row statistics.
pub async fn collect_stats(client: &NotionClient, database_id: &str) -> Result<DatabaseStats> {
    let database = client.get_database(database_id).await?;
    let mut stats = DatabaseStats::new(database.title());

    let pages = client.query_database_all(database_id);
    pin_mut!(pages);
    while let Some(page) = pages.try_next().await? {
        stats.record_page(&page);
    }

    tracing::debug!(
        database_id,
        total = stats.total_activities,
        "Collected database stats"
    );
    Ok(stats)
}

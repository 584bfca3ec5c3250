// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notion database schema initialization.

use serde_json::Value;

use crate::error::Result;
use crate::models::schema::activity_schema;
use crate::services::NotionClient;

/// Write the activity property definitions to the database.
///
/// Returns the database title and the schema that was applied.
pub async fn init_schema(client: &NotionClient, database_id: &str) -> Result<(String, Value)> {
    let database = client.get_database(database_id).await?;
    let title = database.title().to_string();

    let schema = activity_schema();
    client.update_database(database_id, &schema).await?;

    tracing::info!(database_id, title = %title, "Database schema updated");
    Ok((title, schema))
}

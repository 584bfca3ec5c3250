// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Command line interface: `sync`, `auth`, `init-schema` and `status`.

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::models::schema::property_type;
use crate::routes::callback::{self, CALLBACK_PATH, CALLBACK_TIMEOUT, DEFAULT_CALLBACK_PORT};
use crate::services::strava::DEFAULT_PER_PAGE;
use crate::services::{schema, status};
use crate::services::{ActivitySyncer, NotionClient, StravaClient, SyncAction};

/// Sync Strava activities to a Notion database.
#[derive(Parser, Debug)]
#[command(name = "strava2notion", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync activities from Strava to Notion.
    ///
    /// By default only activities after the most recent one already in
    /// Notion are fetched.
    Sync {
        /// Full sync (all activities, not just recent)
        #[arg(long)]
        full: bool,
        /// Show what would be synced without syncing
        #[arg(long)]
        dry_run: bool,
    },
    /// Authorize with Strava to get a refresh token
    Auth {
        /// Local port for the OAuth callback
        #[arg(long, default_value_t = DEFAULT_CALLBACK_PORT)]
        port: u16,
    },
    /// Initialize the Notion database with the required properties
    InitSchema,
    /// Show current sync status and database statistics
    Status,
}

/// Load configuration and run one command.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;

    match cli.command {
        Commands::Sync { full, dry_run } => sync(&config, full, dry_run).await,
        Commands::Auth { port } => auth(&config, port).await,
        Commands::InitSchema => init_schema(&config).await,
        Commands::Status => show_status(&config).await,
    }
}

async fn sync(config: &Config, full: bool, dry_run: bool) -> Result<()> {
    let notion = NotionClient::from_config(config)?;
    let strava = StravaClient::from_config(config)?;

    let mut syncer = ActivitySyncer::new(notion, config.notion_database_id.clone());
    syncer.initialize().await?;
    println!(
        "Found {} existing activities in Notion",
        syncer.existing_count()
    );

    let after = syncer.fetch_after(full);
    match after {
        Some(date) => println!(
            "Incremental sync: fetching activities after {}",
            date.date_naive()
        ),
        None => println!("Full sync: fetching all activities"),
    }

    println!("\nFetching activities from Strava...");
    let activities = strava.list_activities(after, None, DEFAULT_PER_PAGE).await?;
    println!("Found {} activities from Strava", activities.len());

    if activities.is_empty() {
        println!("No new activities to sync.");
        return Ok(());
    }

    if dry_run {
        println!("\nDry run - would sync:");
        for activity in &activities {
            println!("  {}", activity.summary());
        }
        return Ok(());
    }

    println!("\nSyncing to Notion...");
    let counts = syncer
        .sync_activities(&activities, |activity, action| {
            let symbol = match action {
                SyncAction::Created => "+",
                SyncAction::Updated => "~",
            };
            println!("  [{}] {}", symbol, activity.name);
        })
        .await?;

    println!(
        "\nSync complete: {} created, {} updated",
        counts.created, counts.updated
    );
    Ok(())
}

async fn auth(config: &Config, port: u16) -> Result<()> {
    let strava = StravaClient::from_config(config)?;
    let redirect_uri = format!("http://localhost:{}{}", port, CALLBACK_PATH);

    println!("Open this URL in your browser to authorize with Strava:");
    println!("\n  {}\n", strava.authorize_url(&redirect_uri));
    println!("(Make sure 'localhost' is set as your Authorization Callback Domain in Strava)");

    let code = callback::wait_for_code(port, CALLBACK_TIMEOUT).await?;
    let tokens = strava.exchange_code(&code).await?;

    println!("\nAuthorization successful!\n");
    println!("Add this to your .env file:");
    println!("STRAVA_REFRESH_TOKEN=\"{}\"", tokens.refresh_token);
    println!();
    let preview: String = tokens.access_token.chars().take(20).collect();
    println!("Access token (expires): {}...", preview);
    println!(
        "Token type: {}",
        tokens.token_type.as_deref().unwrap_or("Bearer")
    );
    match tokens.expires_at {
        Some(ts) => println!("Expires at: {}", ts),
        None => println!("Expires at: unknown"),
    }
    Ok(())
}

async fn init_schema(config: &Config) -> Result<()> {
    let notion = NotionClient::from_config(config)?;

    println!("Updating Notion database schema...");
    let (title, applied) = schema::init_schema(&notion, &config.notion_database_id).await?;
    println!("Database: {}", title);

    println!("\nSchema updated! Properties:");
    if let Some(properties) = applied.as_object() {
        for (name, definition) in properties {
            println!("  + {}: {}", name, property_type(definition));
        }
    }
    println!("\nDone! Your database now has all required properties.");
    Ok(())
}

async fn show_status(config: &Config) -> Result<()> {
    let notion = NotionClient::from_config(config)?;
    let stats = status::collect_stats(&notion, &config.notion_database_id).await?;

    println!("\nNotion Database: {}", stats.title);
    println!("Total activities: {}", stats.total_activities);
    if let Some(day) = stats.most_recent_day() {
        println!("Most recent: {}", day);
    }
    println!("\nActivities by type:");
    for (activity_type, count) in stats.types_by_count() {
        println!("  {}: {}", activity_type, count);
    }
    Ok(())
}

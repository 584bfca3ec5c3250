// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! strava2notion: mirror Strava activities into a Notion database
//!
//! This crate provides the Strava and Notion API clients and the upsert
//! logic that keeps one Notion row per Strava activity.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

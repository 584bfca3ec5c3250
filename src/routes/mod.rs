// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod callback;

pub use callback::{callback_router, wait_for_code, CallbackResult};

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared application state for API handlers.

use std::sync::Arc;

use hatchery_core::runtime::EngineRuntime;

/// State handed to every handler: the running engine.
#[derive(Clone)]
pub struct AppState {
    /// The reservation engine with its background jobs.
    pub engine: Arc<EngineRuntime>,
}

impl AppState {
    /// Wrap a running engine.
    pub fn new(engine: Arc<EngineRuntime>) -> Self {
        Self { engine }
    }
}

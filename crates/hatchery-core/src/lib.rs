// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hatchery Core - Reservation Lifecycle Engine
//!
//! This crate runs the reservation lifecycle for an incubator storefront:
//! first-come-first-served admission with a hold interval, overdue-pickup
//! reaping with stock restoration, atomic sales recording, and a low-stock
//! email pipeline with durable cooldowns. All state lives in PostgreSQL or
//! SQLite so every decision survives restarts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     hatchery-server                      │
//! │               (JSON API over axum, CSV export)           │
//! └──────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                      EngineRuntime                       │
//! │  ┌───────────┐ ┌────────┐ ┌───────┐ ┌──────────────────┐ │
//! │  │ Admission │ │ Reaper │ │ Sales │ │    Notifier      │ │
//! │  └─────┬─────┘ └───┬────┘ └───┬───┘ └──────┬───────────┘ │
//! │        │  per-product locks   │            │ EmailSink   │
//! │        ▼           ▼          ▼            ▼             │
//! │  ┌────────────────────────────────┐ ┌─────────────────┐  │
//! │  │  ReservationStore + ledger     │ │  SMTP / stub    │  │
//! │  └───────────────┬────────────────┘ └─────────────────┘  │
//! └──────────────────│───────────────────────────────────────┘
//!                    ▼
//!        ┌───────────────────────┐
//!        │  PostgreSQL / SQLite  │
//!        └───────────────────────┘
//! ```
//!
//! # Reservation State Machine
//!
//! ```text
//!                  ┌─────────┐
//!                  │ PENDING │
//!                  └────┬────┘
//!        hold elapsed,  │  insufficient stock
//!        stock debited  │  or zero at creation
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!     ┌──────────┐             ┌──────────┐
//!     │ APPROVED │────────────▶│ REJECTED │
//!     └────┬─────┘  not picked └──────────┘
//!          │        up on time
//!          │ pickup confirmed
//!          ▼
//!     ┌───────────┐
//!     │ COMPLETED │  (sales record written atomically)
//!     └───────────┘
//! ```
//!
//! `APPROVED` is the only state holding a stock debit; leaving it either
//! commits the sale or credits the stock back. Terminal states never change.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `HATCHERY_DATABASE_URL` | Yes | - | PostgreSQL or SQLite connection string |
//! | `HATCHERY_HOLD_INTERVAL_MINUTES` | No | `2` | Admission wait before stock debit |
//! | `HATCHERY_PICKUP_TIMEOUT_SECS` | No | `86400` | Approved age cutoff for the reaper |
//! | `HATCHERY_LOW_STOCK_THRESHOLD` | No | `10` | Units at or below trigger alerts |
//! | `HATCHERY_COOLDOWN_HOURS` | No | `24` | Minimum gap between alerts per pair |
//! | `HATCHERY_OUTER_INTERVAL_MINUTES` | No | `5` | Notification scan cadence |
//! | `HATCHERY_SUB_SLOT_OFFSETS` | No | `1,4` | Dispatch minutes within the interval |
//! | `HATCHERY_AUTO_NOTIFICATIONS` | No | `true` | Global notification enable |
//! | `HATCHERY_RETENTION_DAYS` | No | `7` | Email log purge age |
//!
//! # Modules
//!
//! - [`config`]: Engine configuration from environment variables
//! - [`persistence`]: Storage trait with PostgreSQL and SQLite backends
//! - [`admission`]: First-come-first-served admission controller
//! - [`reaper`]: Overdue-pickup auto-cancellation
//! - [`sales`]: Sales recorder and report queries
//! - [`notifier`]: Low-stock notification dispatcher
//! - [`scheduler`]: Background job loops with graceful shutdown
//! - [`runtime`]: Embeddable runtime wiring everything together

#![deny(missing_docs)]

/// First-come-first-served admission controller.
pub mod admission;

/// Clock abstraction; tests inject a manual clock.
pub mod clock;

/// Engine configuration loaded from environment variables.
pub mod config;

/// Outbound email contract, SMTP implementation, and recording stub.
pub mod email;

/// Error types for engine operations with API error code mapping.
pub mod error;

/// Stock ledger and per-product locks.
pub mod ledger;

/// Email log retention worker.
pub mod log_cleanup;

/// Embedded database migrations.
pub mod migrations;

/// Low-stock notification dispatcher.
pub mod notifier;

/// Persistence trait with PostgreSQL and SQLite backends.
pub mod persistence;

/// Overdue-pickup auto-cancellation.
pub mod reaper;

/// Sales recorder and report queries.
pub mod sales;

/// Named background job scheduler.
pub mod scheduler;

/// Reservation store with invalidation signals.
pub mod store;

/// Embeddable runtime wiring the components together.
pub mod runtime;

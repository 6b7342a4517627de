// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for hatchery-core.
//!
//! Provides a unified error type for the reservation lifecycle engine with
//! stable machine-readable error codes for API responses.

use thiserror::Error;

/// Result type using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur during reservation processing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// Input validation failed. Never retried.
    #[error("Validation error for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: &'static str,
        /// The validation error message.
        message: String,
    },

    /// A referenced entity does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// The entity kind ("product", "reservation", ...).
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// Stock could not cover the requested quantity.
    ///
    /// At the system level this is an expected outcome (the reservation is
    /// rejected); it surfaces as an error only on explicit admin flows such
    /// as manual approval.
    #[error("Insufficient stock for product '{product_id}'")]
    InsufficientStock {
        /// The product whose stock was insufficient.
        product_id: String,
    },

    /// Attempted state change not permitted by the reservation lifecycle.
    #[error("Reservation '{reservation_id}' is in invalid state: expected '{expected}', got '{actual}'")]
    InvalidTransition {
        /// The reservation ID.
        reservation_id: String,
        /// The status the operation requires.
        expected: String,
        /// The status the reservation actually has.
        actual: String,
    },

    /// Database operation failed. Transient; background jobs retry on the
    /// next scheduler tick.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Email delivery failed. Logged with reason; not retried this tick.
    #[error("Email delivery failed: {0}")]
    Email(String),

    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl CoreError {
    /// Get the stable error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Database(_) => "STORE_UNAVAILABLE",
            Self::Email(_) => "EMAIL_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! API request handlers.

pub mod health;
pub mod reservations;
pub mod sales;

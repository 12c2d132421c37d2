// Copyright (c) 2024-2027 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Routing module
//!
//! Routes each turn to a censored or uncensored model.

pub mod model_router;

pub use model_router::*;

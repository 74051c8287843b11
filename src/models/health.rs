// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};

/// Message returned by the liveness route.
pub const SERVER_OK_MESSAGE: &str = "SERVER IS OK";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            message: SERVER_OK_MESSAGE.to_string(),
        }
    }
}

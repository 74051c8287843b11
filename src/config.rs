// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Server configuration loaded from environment variables.

use anyhow::{bail, Context, Result};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use url::Url;

/// Default request body limit, matching the 100kb used by common JSON body parsers.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 100 * 1024;

/// Configuration for the HTTP server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Base URL of the external authentication service behind `/api/v1/auth`.
    pub auth_service_url: Url,
    /// Maximum accepted request body size for parsed and forwarded bodies.
    pub body_limit_bytes: usize,
    pub upstream_timeout: Duration,
}

impl ServerConfig {
    /// Load server configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse::<IpAddr>()
            .context("HOST must be a valid IP address")?;

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let raw_auth_url = lookup("AUTH_SERVICE_URL").context("AUTH_SERVICE_URL must be set")?;
        let auth_service_url =
            Url::parse(&raw_auth_url).context("AUTH_SERVICE_URL must be a valid URL")?;
        if !matches!(auth_service_url.scheme(), "http" | "https") {
            bail!(
                "AUTH_SERVICE_URL must use http or https, got: {}",
                auth_service_url.scheme()
            );
        }

        let body_limit_bytes = lookup("BODY_LIMIT_BYTES")
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("BODY_LIMIT_BYTES must be a valid number")?
            .unwrap_or(DEFAULT_BODY_LIMIT_BYTES);

        let upstream_timeout_secs = lookup("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse::<u64>()
            .context("UPSTREAM_TIMEOUT_SECS must be a valid number")?;

        Ok(Self {
            host,
            port,
            auth_service_url,
            body_limit_bytes,
            upstream_timeout: Duration::from_secs(upstream_timeout_secs),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gateway configuration: trust material locations and the agent endpoint.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Default local print agent endpoint (loopback, fixed port).
pub const DEFAULT_AGENT_ENDPOINT: &str = "ws://localhost:8182";

/// How long a loaded certificate chain stays fresh.
pub const DEFAULT_CHAIN_TTL_SECS: u64 = 300;

/// Gateway settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// WebSocket URI of the local print agent.
    pub agent_endpoint: String,
    /// PEM-encoded RSA private key (PKCS#8 or PKCS#1).
    pub private_key_path: PathBuf,
    /// Leaf certificate text.
    pub certificate_path: PathBuf,
    /// Optional intermediate certificate text.
    pub intermediate_certificate_path: Option<PathBuf>,
    pub chain_cache_ttl_secs: u64,
    pub connect_timeout_secs: u64,
    pub response_timeout_secs: u64,
    /// Used to estimate when an accepted job will have printed.
    pub estimated_print_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            agent_endpoint: DEFAULT_AGENT_ENDPOINT.into(),
            private_key_path: PathBuf::from("private-key.pem"),
            certificate_path: PathBuf::from("digital-certificate.txt"),
            intermediate_certificate_path: None,
            chain_cache_ttl_secs: DEFAULT_CHAIN_TTL_SECS,
            connect_timeout_secs: 10,
            response_timeout_secs: 30,
            estimated_print_secs: 30,
        }
    }
}

impl GatewayConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            GatewayError::Configuration(format!("invalid config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let endpoint = self.agent_endpoint.trim();
        if endpoint.is_empty() {
            return Err(GatewayError::Configuration(
                "agent_endpoint must not be empty".into(),
            ));
        }
        // The agent lives on loopback; plain WebSocket only.
        if !endpoint.starts_with("ws://") {
            return Err(GatewayError::Configuration(format!(
                "agent_endpoint must be a ws:// URI, got {endpoint}"
            )));
        }
        if self.connect_timeout_secs == 0 || self.response_timeout_secs == 0 {
            return Err(GatewayError::Configuration(
                "timeouts must be at least one second".into(),
            ));
        }
        Ok(())
    }

    pub fn private_key_file(&self) -> PathBuf {
        resolve_path(&self.private_key_path)
    }

    pub fn certificate_file(&self) -> PathBuf {
        resolve_path(&self.certificate_path)
    }

    pub fn intermediate_certificate_file(&self) -> Option<PathBuf> {
        self.intermediate_certificate_path.as_deref().map(resolve_path)
    }

    pub fn chain_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.chain_cache_ttl_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    pub fn estimated_print_duration(&self) -> Duration {
        Duration::from_secs(self.estimated_print_secs)
    }
}

/// Resolve `path` against the process working directory unless it is
/// already absolute.
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

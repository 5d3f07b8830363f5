// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Certificate chain provider: the trust material the print agent checks
// every signed command against.
//
// The chain is the leaf certificate optionally followed by one intermediate,
// joined with a marker line the agent splits on.  Loaded text is cached for
// a fixed TTL and then re-read so that a certificate swapped on disk is
// picked up without a restart.

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use printgate_core::GatewayConfig;
use printgate_core::config::DEFAULT_CHAIN_TTL_SECS;
use printgate_core::error::{GatewayError, Result};
use tracing::{debug, info, instrument, warn};

/// Marker the agent expects between the leaf and intermediate certificates.
pub const INTERMEDIATE_SEPARATOR: &str = "\n--START INTERMEDIATE CERT--\n";

/// Join leaf and intermediate certificate text into the wire chain.
pub fn build_chain(leaf: &str, intermediate: Option<&str>) -> String {
    match intermediate {
        Some(intermediate) => {
            format!("{}{INTERMEDIATE_SEPARATOR}{}", leaf.trim(), intermediate.trim())
        }
        None => leaf.trim().to_owned(),
    }
}

/// Where certificate text comes from.
pub trait CertificateStore: Send + Sync {
    /// The leaf certificate. Missing or unreadable leaf text is fatal.
    fn load_leaf(&self) -> Result<String>;

    /// The intermediate certificate, if one is available.
    fn load_intermediate(&self) -> Result<Option<String>>;
}

/// Certificate text read from files on disk.
#[derive(Debug, Clone)]
pub struct FileCertificateStore {
    leaf_path: PathBuf,
    intermediate_path: Option<PathBuf>,
}

impl FileCertificateStore {
    pub fn new(leaf_path: impl Into<PathBuf>, intermediate_path: Option<PathBuf>) -> Self {
        Self {
            leaf_path: leaf_path.into(),
            intermediate_path,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.certificate_file(),
            config.intermediate_certificate_file(),
        )
    }
}

impl CertificateStore for FileCertificateStore {
    fn load_leaf(&self) -> Result<String> {
        let text = std::fs::read_to_string(&self.leaf_path).map_err(|e| {
            GatewayError::Configuration(format!(
                "leaf certificate {} unreadable: {e}",
                self.leaf_path.display()
            ))
        })?;
        if text.trim().is_empty() {
            return Err(GatewayError::Configuration(format!(
                "leaf certificate {} is empty",
                self.leaf_path.display()
            )));
        }
        Ok(text)
    }

    fn load_intermediate(&self) -> Result<Option<String>> {
        let Some(path) = &self.intermediate_path else {
            return Ok(None);
        };

        // The intermediate is best effort: without it the agent may still
        // trust the leaf directly.
        match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => {
                warn!(
                    path = %path.display(),
                    "intermediate certificate is empty, using leaf only"
                );
                Ok(None)
            }
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "intermediate certificate unavailable, using leaf only"
                );
                Ok(None)
            }
        }
    }
}

struct CachedChain {
    chain: String,
    loaded_at: Instant,
}

/// Loads and caches the certificate chain.
///
/// Reads never hold the cache lock across file I/O.  Two callers that miss
/// at the same moment may both reload; the second write simply replaces an
/// identical value.
pub struct CertificateChainProvider {
    store: Box<dyn CertificateStore>,
    ttl: Duration,
    cache: RwLock<Option<CachedChain>>,
}

impl CertificateChainProvider {
    pub fn new(store: impl CertificateStore + 'static, ttl: Duration) -> Self {
        Self {
            store: Box::new(store),
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Provider over the files named in `config`.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            FileCertificateStore::from_config(config),
            config.chain_cache_ttl(),
        )
    }

    /// Provider with the default five minute TTL.
    pub fn with_default_ttl(store: impl CertificateStore + 'static) -> Self {
        Self::new(store, Duration::from_secs(DEFAULT_CHAIN_TTL_SECS))
    }

    /// Return the chain, reloading it when the cached copy is older than the
    /// TTL.
    pub fn get_chain(&self) -> Result<String> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.as_ref() {
                if cached.loaded_at.elapsed() < self.ttl {
                    return Ok(cached.chain.clone());
                }
            }
        }

        let chain = self.load()?;
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        *cache = Some(CachedChain {
            chain: chain.clone(),
            loaded_at: Instant::now(),
        });
        Ok(chain)
    }

    /// Drop the cached chain so the next call reloads it.
    pub fn invalidate(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        *cache = None;
        debug!("certificate chain cache invalidated");
    }

    #[instrument(skip(self))]
    fn load(&self) -> Result<String> {
        let leaf = self.store.load_leaf()?;
        let intermediate = self.store.load_intermediate()?;
        let chain = build_chain(&leaf, intermediate.as_deref());
        info!(
            with_intermediate = intermediate.is_some(),
            chain_len = chain.len(),
            "certificate chain loaded"
        );
        Ok(chain)
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Challenge signing for the agent's trust handshake.
//
// The agent hands the browser an opaque challenge string; the server signs
// its UTF-8 bytes with the same RSA-SHA256 key used for envelopes and the
// base64 signature goes back verbatim.  No envelope, no certificate.

use std::path::PathBuf;

use printgate_core::GatewayConfig;
use printgate_core::error::{GatewayError, Result};
use tracing::{debug, instrument};

use crate::signing::SigningKey;

/// Signs trust-handshake challenges.
///
/// The key is loaded fresh on every call and dropped straight after.
#[derive(Debug, Clone)]
pub struct ChallengeSigner {
    key_path: PathBuf,
}

impl ChallengeSigner {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.private_key_file())
    }

    /// Base64 RSA-SHA256 signature over `challenge`.
    #[instrument(skip_all, fields(challenge_len = challenge.len()))]
    pub fn sign_challenge(&self, challenge: &str) -> Result<String> {
        if challenge.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "challenge must not be empty".into(),
            ));
        }

        let key = SigningKey::load(&self.key_path)?;
        let signature = key.sign_base64(challenge.as_bytes())?;
        debug!("challenge signed");
        Ok(signature)
    }
}

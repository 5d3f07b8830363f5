// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signed command envelopes: RSA PKCS#1 v1.5 / SHA-256 over the compact
// JSON form of every field except the signature itself.
//
// # Canonical form
//
// The bytes signed are `serde_json::to_string(&UnsignedEnvelope)`: no
// whitespace, keys in declaration order (`call`, `params`, `certificate`,
// `timestamp`, `uid`, `position`).  Object keys nested inside `params`
// come out sorted because `serde_json::Map` is a BTreeMap.  The signature is
// appended afterwards as the last key and the unsigned form is never
// rebuilt from the signed one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use printgate_core::GatewayConfig;
use printgate_core::error::{GatewayError, Result};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{KeyPair, RSA_PKCS1_SHA256, RsaKeyPair};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::certificates::CertificateChainProvider;

/// Fixed dialog position the agent expects in every signed envelope.
pub const ENVELOPE_POSITION: Position = Position { x: 960, y: 516 };

/// Number of random bytes behind a uid.
const UID_BYTES: usize = 6;

/// Shortest uid accepted; shorter draws are discarded and redrawn.
const UID_MIN_LEN: usize = 6;

/// Screen position metadata carried in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

/// Everything the signature covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedEnvelope {
    pub call: String,
    pub params: serde_json::Value,
    pub certificate: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub uid: String,
    pub position: Position,
}

impl UnsignedEnvelope {
    /// The exact text that gets signed.
    pub fn canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An envelope plus its base64 signature, ready to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    #[serde(flatten)]
    pub envelope: UnsignedEnvelope,
    pub signature: String,
}

impl SignedEnvelope {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An RSA private key loaded from PEM.
pub struct SigningKey {
    key_pair: RsaKeyPair,
}

impl SigningKey {
    /// Read and parse a PEM private key file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            GatewayError::KeyLoad(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_pem(&data)
    }

    /// Parse a PEM private key. Accepts `PRIVATE KEY` (PKCS#8) and
    /// `RSA PRIVATE KEY` (PKCS#1).
    pub fn from_pem(data: &[u8]) -> Result<Self> {
        let block = pem::parse(data)
            .map_err(|e| GatewayError::KeyLoad(format!("not a PEM document: {e}")))?;

        let key_pair = match block.tag() {
            "PRIVATE KEY" => RsaKeyPair::from_pkcs8(block.contents()),
            "RSA PRIVATE KEY" => RsaKeyPair::from_der(block.contents()),
            other => {
                return Err(GatewayError::KeyLoad(format!(
                    "unsupported PEM block '{other}'"
                )));
            }
        }
        .map_err(|e| GatewayError::KeyLoad(format!("key rejected: {e}")))?;

        debug!(
            modulus_bits = key_pair.public().modulus_len() * 8,
            "RSA signing key loaded"
        );
        Ok(Self { key_pair })
    }

    /// Sign `message` with RSA PKCS#1 v1.5 padding over a SHA-256 digest.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let rng = SystemRandom::new();
        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &rng, message, &mut signature)
            .map_err(|e| GatewayError::Signing(format!("RSA signing failed: {e}")))?;
        Ok(signature)
    }

    /// Base64 signature over `message`.
    pub fn sign_base64(&self, message: &[u8]) -> Result<String> {
        Ok(STANDARD.encode(self.sign(message)?))
    }

    /// DER `RSAPublicKey` matching this key.
    pub fn public_key_der(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }
}

/// Short per-command token: six random bytes, base64 encoded, with `+`,
/// `/` and `=` removed and the rest lowercased.
///
/// Stripping can leave fewer than six characters; such draws are retried
/// so every uid is 6 to 8 characters of `[a-z0-9]`.
pub fn generate_uid(rng: &dyn SecureRandom) -> Result<String> {
    let mut bytes = [0u8; UID_BYTES];
    loop {
        rng.fill(&mut bytes)
            .map_err(|_| GatewayError::Signing("random source unavailable".into()))?;

        let uid: String = STANDARD
            .encode(bytes)
            .chars()
            .filter(|c| !matches!(c, '+' | '/' | '='))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if uid.len() >= UID_MIN_LEN {
            return Ok(uid);
        }
    }
}

/// Builds signed envelopes for privileged agent commands.
///
/// The private key is read from disk on every call; commands are rare and
/// this keeps key material out of long-lived memory.
pub struct PayloadSigner {
    chain: Arc<CertificateChainProvider>,
    key_path: PathBuf,
    rng: SystemRandom,
}

impl PayloadSigner {
    pub fn new(chain: Arc<CertificateChainProvider>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            chain,
            key_path: key_path.into(),
            rng: SystemRandom::new(),
        }
    }

    pub fn from_config(chain: Arc<CertificateChainProvider>, config: &GatewayConfig) -> Self {
        Self::new(chain, config.private_key_file())
    }

    /// Build and sign the envelope for `call`.
    ///
    /// Key and chain reads use blocking file I/O; both files are a few KB
    /// and commands arrive at till pace.
    ///
    /// Fails with `Configuration` when the certificate chain cannot be
    /// loaded and with `KeyLoad`/`Signing` when the key is unusable. Nothing
    /// is retried.
    #[instrument(skip(self, params), fields(call = %call))]
    pub fn sign(&self, call: &str, params: serde_json::Value) -> Result<SignedEnvelope> {
        let certificate = self.chain.get_chain()?;
        let key = SigningKey::load(&self.key_path)?;

        let envelope = UnsignedEnvelope {
            call: call.to_owned(),
            params,
            certificate,
            timestamp: Utc::now().timestamp_millis(),
            uid: generate_uid(&self.rng)?,
            position: ENVELOPE_POSITION,
        };

        let canonical = envelope.canonical_json()?;
        let signature = key.sign_base64(canonical.as_bytes())?;

        debug!(uid = %envelope.uid, timestamp = envelope.timestamp, "envelope signed");
        Ok(SignedEnvelope {
            envelope,
            signature,
        })
    }

    /// Confirm the key parses and the chain loads.
    pub fn check(&self) -> Result<()> {
        SigningKey::load(&self.key_path)?;
        self.chain.get_chain()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::certificates::FileCertificateStore;
    use ring::signature::{RSA_PKCS1_2048_8192_SHA256, UnparsedPublicKey};
    use std::collections::HashSet;

    pub(crate) const KEY_PKCS8: &str = include_str!("../testdata/signing-key.pem");
    pub(crate) const KEY_PKCS1: &str = include_str!("../testdata/signing-key-pkcs1.pem");
    pub(crate) const LEAF: &str = include_str!("../testdata/leaf-cert.pem");

    /// Verify `signature` (base64) over `message` with `public_key_der`.
    pub(crate) fn verify(public_key_der: &[u8], message: &[u8], signature_b64: &str) -> bool {
        let Ok(signature) = STANDARD.decode(signature_b64) else {
            return false;
        };
        UnparsedPublicKey::new(&RSA_PKCS1_2048_8192_SHA256, public_key_der)
            .verify(message, &signature)
            .is_ok()
    }

    fn signer_in(dir: &Path) -> PayloadSigner {
        let key_path = dir.join("key.pem");
        let leaf_path = dir.join("leaf.pem");
        std::fs::write(&key_path, KEY_PKCS8).expect("write key");
        std::fs::write(&leaf_path, LEAF).expect("write leaf");
        let chain = Arc::new(CertificateChainProvider::with_default_ttl(
            FileCertificateStore::new(leaf_path, None),
        ));
        PayloadSigner::new(chain, key_path)
    }

    fn public_key() -> Vec<u8> {
        SigningKey::from_pem(KEY_PKCS8.as_bytes())
            .expect("test key")
            .public_key_der()
            .to_vec()
    }

    #[test]
    fn both_pem_encodings_load_the_same_key() {
        let pkcs8 = SigningKey::from_pem(KEY_PKCS8.as_bytes()).expect("pkcs8");
        let pkcs1 = SigningKey::from_pem(KEY_PKCS1.as_bytes()).expect("pkcs1");
        assert_eq!(pkcs8.public_key_der(), pkcs1.public_key_der());
    }

    #[test]
    fn certificate_is_not_a_key() {
        let result = SigningKey::from_pem(LEAF.as_bytes());
        assert!(matches!(result, Err(GatewayError::KeyLoad(_))));
    }

    #[test]
    fn garbage_is_not_a_key() {
        let result = SigningKey::from_pem(b"definitely not pem");
        assert!(matches!(result, Err(GatewayError::KeyLoad(_))));
    }

    #[test]
    fn missing_key_file_is_key_load_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = SigningKey::load(dir.path().join("nope.pem"));
        assert!(matches!(result, Err(GatewayError::KeyLoad(_))));
    }

    #[test]
    fn uid_shape() {
        let rng = SystemRandom::new();
        for _ in 0..100_000 {
            let uid = generate_uid(&rng).expect("uid");
            assert!((6..=8).contains(&uid.len()), "bad length: {uid}");
            assert!(
                uid.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
                "bad chars: {uid}"
            );
        }
    }

    #[test]
    fn consecutive_uids_differ() {
        let rng = SystemRandom::new();
        let mut previous = generate_uid(&rng).expect("uid");
        for _ in 0..10_000 {
            let next = generate_uid(&rng).expect("uid");
            assert_ne!(previous, next);
            previous = next;
        }
    }

    #[test]
    fn envelope_carries_fixed_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let signer = signer_in(dir.path());

        let signed = signer
            .sign("print", serde_json::json!([{ "printer": "HP-1" }]))
            .expect("sign");
        assert_eq!(signed.envelope.call, "print");
        assert_eq!(signed.envelope.certificate, LEAF.trim());
        assert_eq!(signed.envelope.position, Position { x: 960, y: 516 });
        assert!(signed.envelope.timestamp > 1_600_000_000_000);
    }

    #[test]
    fn signature_verifies_over_unsigned_form() {
        let dir = tempfile::tempdir().expect("tempdir");
        let signer = signer_in(dir.path());

        let signed = signer
            .sign("print", serde_json::json!([{ "printer": "HP-1", "data": [] }]))
            .expect("sign");
        let canonical = signed.envelope.canonical_json().expect("canonical");
        assert!(verify(&public_key(), canonical.as_bytes(), &signed.signature));
    }

    #[test]
    fn tampering_breaks_the_signature() {
        let dir = tempfile::tempdir().expect("tempdir");
        let signer = signer_in(dir.path());
        let signed = signer
            .sign("print", serde_json::json!(["HP-1"]))
            .expect("sign");
        let key = public_key();

        let mut timestamp = signed.envelope.clone();
        timestamp.timestamp += 1;
        let mut uid = signed.envelope.clone();
        uid.uid.push('x');
        let mut params = signed.envelope.clone();
        params.params = serde_json::json!(["HP-2"]);

        for tampered in [timestamp, uid, params] {
            let canonical = tampered.canonical_json().expect("canonical");
            assert!(!verify(&key, canonical.as_bytes(), &signed.signature));
        }
    }

    #[test]
    fn identical_commands_get_distinct_signatures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let signer = signer_in(dir.path());
        let params = serde_json::json!(["HP-1"]);

        let a = signer.sign("print", params.clone()).expect("a");
        let mut b = signer.sign("print", params).expect("b");
        // Force the same millisecond; the uid alone must separate them.
        b.envelope.timestamp = a.envelope.timestamp;

        assert_ne!(a.envelope.uid, b.envelope.uid);
        assert_ne!(
            a.envelope.canonical_json().expect("a"),
            b.envelope.canonical_json().expect("b")
        );
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn wire_form_has_every_field() {
        let dir = tempfile::tempdir().expect("tempdir");
        let signer = signer_in(dir.path());
        let signed = signer.sign("print", serde_json::json!([])).expect("sign");

        let wire: serde_json::Value =
            serde_json::from_str(&signed.to_json().expect("json")).expect("parse");
        for key in ["call", "params", "certificate", "timestamp", "uid", "position", "signature"] {
            assert!(wire.get(key).is_some(), "missing {key}");
        }
        assert_eq!(wire["position"], serde_json::json!({ "x": 960, "y": 516 }));

        let canonical = signed.envelope.canonical_json().expect("canonical");
        assert!(canonical.starts_with(r#"{"call":"print","params":[],"certificate":"#));
        assert!(canonical.ends_with(r#""position":{"x":960,"y":516}}"#));
    }

    #[test]
    fn missing_key_fails_signing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let signer = signer_in(dir.path());
        std::fs::remove_file(dir.path().join("key.pem")).expect("remove key");

        let result = signer.sign("print", serde_json::json!([]));
        assert!(matches!(result, Err(GatewayError::KeyLoad(_))));
        assert!(signer.check().is_err());
    }

    #[test]
    fn missing_chain_fails_signing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let signer = signer_in(dir.path());
        std::fs::remove_file(dir.path().join("leaf.pem")).expect("remove leaf");

        let result = signer.sign("print", serde_json::json!([]));
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }

    #[test]
    fn many_signatures_are_unique() {
        let dir = tempfile::tempdir().expect("tempdir");
        let signer = signer_in(dir.path());
        let signatures: HashSet<String> = (0..20)
            .map(|_| signer.sign("print", serde_json::json!([])).expect("sign").signature)
            .collect();
        assert_eq!(signatures.len(), 20);
    }
}

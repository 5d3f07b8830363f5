// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! printgate-security — trust material for talking to the print agent.
//!
//! Loads the certificate chain that identifies this server, builds signed
//! command envelopes the agent can verify, and signs handshake challenges.
//! All signatures are RSA PKCS#1 v1.5 over SHA-256.

pub mod certificates;
pub mod challenge;
pub mod signing;

// PUBLIC API: Re-export signing primitives
pub use certificates::{
    CertificateChainProvider, CertificateStore, FileCertificateStore, build_chain,
};
pub use challenge::ChallengeSigner;
pub use signing::{PayloadSigner, SignedEnvelope, SigningKey, UnsignedEnvelope};

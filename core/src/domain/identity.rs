// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Node Identity and Key Roles
//!
//! Domain-level abstraction over signing keys. A node holds exactly one
//! [`MessageSigner`] (its own private key or shared secret) and a [`KeyRing`]
//! of verifiers for the peers it trusts directly. The concrete Ed25519 and
//! HMAC-SHA256 implementations live in [`crate::infrastructure::signing`].
//!
//! ## Security
//!
//! - Neither [`Signature`] nor any key type prints its bytes in `Debug` output.
//! - A node never holds a signer for another role.

use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::domain::error::ProtocolError;

/// Signature scheme tag carried by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningScheme {
    /// Asymmetric: verified with the sender's public key.
    #[serde(rename = "ed25519")]
    Ed25519,
    /// Symmetric: keyed digest with a pre-shared secret.
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
}

impl SigningScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::HmacSha256 => "hmac-sha256",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ed25519" => Some(Self::Ed25519),
            "hmac-sha256" => Some(Self::HmacSha256),
            _ => None,
        }
    }
}

impl std::fmt::Display for SigningScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheme-tagged signature bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    scheme: SigningScheme,
    bytes: Vec<u8>,
}

impl Signature {
    pub fn new(scheme: SigningScheme, bytes: Vec<u8>) -> Self {
        Self { scheme, bytes }
    }

    pub fn scheme(&self) -> SigningScheme {
        self.scheme
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn from_base64(scheme: SigningScheme, encoded: &str) -> Result<Self, ProtocolError> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| ProtocolError::AuthenticationFailure(format!("invalid base64 signature: {}", e)))?;
        Ok(Self { scheme, bytes })
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("scheme", &self.scheme)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Produces signatures under this node's identity.
pub trait MessageSigner: Send + Sync {
    /// The `sender_id` this signer speaks for.
    fn sender_id(&self) -> &str;

    fn scheme(&self) -> SigningScheme;

    fn sign(&self, canonical: &[u8]) -> Signature;
}

/// Verifies signatures produced by one peer.
pub trait SignatureVerifier: Send + Sync {
    fn scheme(&self) -> SigningScheme;

    /// # Errors
    ///
    /// [`ProtocolError::AuthenticationFailure`] when the signature does not match.
    /// Implementations must compare in constant time.
    fn verify(&self, canonical: &[u8], signature: &Signature) -> Result<(), ProtocolError>;
}

/// Verifiers for the peers this node trusts directly, keyed by `sender_id`.
#[derive(Clone, Default)]
pub struct KeyRing {
    peers: HashMap<String, Arc<dyn SignatureVerifier>>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peer(mut self, sender_id: impl Into<String>, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.insert(sender_id, verifier);
        self
    }

    pub fn insert(&mut self, sender_id: impl Into<String>, verifier: Arc<dyn SignatureVerifier>) {
        self.peers.insert(sender_id.into(), verifier);
    }

    pub fn verifier_for(&self, sender_id: &str) -> Option<Arc<dyn SignatureVerifier>> {
        self.peers.get(sender_id).cloned()
    }

    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.peers.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut peers: Vec<&str> = self.peers().collect();
        peers.sort_unstable();
        f.debug_struct("KeyRing").field("peers", &peers).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_debug_hides_bytes() {
        let sig = Signature::new(SigningScheme::Ed25519, vec![0xAB; 64]);
        let rendered = format!("{:?}", sig);
        assert!(rendered.contains("len: 64"));
        assert!(!rendered.contains("171"));
        assert!(!rendered.to_lowercase().contains("abab"));
    }

    #[test]
    fn test_signature_base64_round_trip() {
        let sig = Signature::new(SigningScheme::HmacSha256, vec![1, 2, 3, 4]);
        let decoded = Signature::from_base64(SigningScheme::HmacSha256, &sig.to_base64()).unwrap();
        assert_eq!(decoded, sig);
        assert!(Signature::from_base64(SigningScheme::Ed25519, "***").is_err());
    }

    #[test]
    fn test_scheme_names() {
        assert_eq!(SigningScheme::parse("ed25519"), Some(SigningScheme::Ed25519));
        assert_eq!(SigningScheme::parse("hmac-sha256"), Some(SigningScheme::HmacSha256));
        assert_eq!(SigningScheme::parse("rsa"), None);
    }
}

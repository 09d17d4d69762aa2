// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Asymmetric scheme: Ed25519 over the canonical bytes.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, VerifyingKey};
use rand_core::OsRng;

use crate::domain::error::{KeyError, ProtocolError};
use crate::domain::identity::{MessageSigner, Signature, SignatureVerifier, SigningScheme};

pub struct Ed25519Signer {
    sender_id: String,
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(sender_id: impl Into<String>, key: SigningKey) -> Self {
        Self {
            sender_id: sender_id.into(),
            key,
        }
    }

    pub fn generate(sender_id: impl Into<String>) -> Self {
        Self::new(sender_id, SigningKey::generate(&mut OsRng))
    }

    pub fn from_secret_bytes(sender_id: impl Into<String>, bytes: &[u8]) -> Result<Self, KeyError> {
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyError::Invalid("Ed25519 private key must be 32 bytes".to_string()))?;
        Ok(Self::new(sender_id, SigningKey::from_bytes(&secret)))
    }

    pub fn verifier(&self) -> Ed25519Verifier {
        Ed25519Verifier {
            key: self.key.verifying_key(),
        }
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("sender_id", &self.sender_id)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl MessageSigner for Ed25519Signer {
    fn sender_id(&self) -> &str {
        &self.sender_id
    }

    fn scheme(&self) -> SigningScheme {
        SigningScheme::Ed25519
    }

    fn sign(&self, canonical: &[u8]) -> Signature {
        let signature = self.key.sign(canonical);
        Signature::new(SigningScheme::Ed25519, signature.to_bytes().to_vec())
    }
}

#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    pub fn from_public_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let public: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyError::Invalid("Ed25519 public key must be 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&public)
            .map_err(|e| KeyError::Invalid(format!("Invalid public key: {}", e)))?;
        Ok(Self { key })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.key.as_bytes()
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn scheme(&self) -> SigningScheme {
        SigningScheme::Ed25519
    }

    fn verify(&self, canonical: &[u8], signature: &Signature) -> Result<(), ProtocolError> {
        let sig_bytes: [u8; 64] = signature.as_bytes().try_into().map_err(|_| {
            ProtocolError::AuthenticationFailure("Invalid signature length (must be 64 bytes)".to_string())
        })?;
        let signature = DalekSignature::from_bytes(&sig_bytes);
        self.key
            .verify_strict(canonical, &signature)
            .map_err(|_| ProtocolError::AuthenticationFailure("Ed25519 signature mismatch".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = Ed25519Signer::generate("client");
        let verifier = signer.verifier();
        let sig = signer.sign(b"canonical");
        assert_eq!(sig.as_bytes().len(), 64);
        assert!(verifier.verify(b"canonical", &sig).is_ok());
        assert!(matches!(
            verifier.verify(b"canonicaL", &sig),
            Err(ProtocolError::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let a = Ed25519Signer::generate("a");
        let b = Ed25519Signer::generate("b");
        let sig = a.sign(b"msg");
        assert!(b.verifier().verify(b"msg", &sig).is_err());
    }

    #[test]
    fn test_truncated_signature_fails() {
        let signer = Ed25519Signer::generate("client");
        let sig = signer.sign(b"msg");
        let short = Signature::new(SigningScheme::Ed25519, sig.as_bytes()[..63].to_vec());
        assert!(signer.verifier().verify(b"msg", &short).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let signer = Ed25519Signer::generate("client");
        assert!(format!("{:?}", signer).contains("<redacted>"));
    }
}

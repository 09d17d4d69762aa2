// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Symmetric scheme: HMAC-SHA256 with a pre-shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::error::{KeyError, ProtocolError};
use crate::domain::identity::{MessageSigner, Signature, SignatureVerifier, SigningScheme};

type HmacSha256 = Hmac<Sha256>;

/// Minimum shared secret length in bytes.
pub const MIN_SECRET_LEN: usize = 16;

/// Keyed MAC state, prepared once from the secret.
#[derive(Clone)]
struct SharedSecret(HmacSha256);

impl SharedSecret {
    fn new(bytes: Vec<u8>) -> Result<Self, KeyError> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(KeyError::Invalid(format!(
                "shared secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        let mac = HmacSha256::new_from_slice(&bytes)
            .map_err(|e| KeyError::Invalid(format!("invalid shared secret: {}", e)))?;
        Ok(Self(mac))
    }

    fn mac(&self) -> HmacSha256 {
        self.0.clone()
    }
}

pub struct HmacSigner {
    sender_id: String,
    secret: SharedSecret,
}

impl HmacSigner {
    pub fn new(sender_id: impl Into<String>, secret: Vec<u8>) -> Result<Self, KeyError> {
        Ok(Self {
            sender_id: sender_id.into(),
            secret: SharedSecret::new(secret)?,
        })
    }

    pub fn verifier(&self) -> HmacVerifier {
        HmacVerifier {
            secret: self.secret.clone(),
        }
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner")
            .field("sender_id", &self.sender_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl MessageSigner for HmacSigner {
    fn sender_id(&self) -> &str {
        &self.sender_id
    }

    fn scheme(&self) -> SigningScheme {
        SigningScheme::HmacSha256
    }

    fn sign(&self, canonical: &[u8]) -> Signature {
        let mut mac = self.secret.mac();
        mac.update(canonical);
        Signature::new(SigningScheme::HmacSha256, mac.finalize().into_bytes().to_vec())
    }
}

pub struct HmacVerifier {
    secret: SharedSecret,
}

impl HmacVerifier {
    pub fn new(secret: Vec<u8>) -> Result<Self, KeyError> {
        Ok(Self {
            secret: SharedSecret::new(secret)?,
        })
    }
}

impl std::fmt::Debug for HmacVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacVerifier").field("secret", &"<redacted>").finish()
    }
}

impl SignatureVerifier for HmacVerifier {
    fn scheme(&self) -> SigningScheme {
        SigningScheme::HmacSha256
    }

    fn verify(&self, canonical: &[u8], signature: &Signature) -> Result<(), ProtocolError> {
        let mut mac = self.secret.mac();
        mac.update(canonical);
        // verify_slice compares in constant time
        mac.verify_slice(signature.as_bytes())
            .map_err(|_| ProtocolError::AuthenticationFailure("HMAC mismatch".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sign_verify() {
        let signer = HmacSigner::new("client", vec![7u8; 32]).unwrap();
        let sig = signer.sign(b"payload");
        assert_eq!(sig.as_bytes().len(), 32);
        assert!(signer.verifier().verify(b"payload", &sig).is_ok());
        assert!(signer.verifier().verify(b"payloaD", &sig).is_err());
    }

    #[test]
    fn test_different_secret_fails() {
        let signer = HmacSigner::new("client", vec![7u8; 32]).unwrap();
        let other = HmacVerifier::new(vec![8u8; 32]).unwrap();
        assert!(other.verify(b"payload", &signer.sign(b"payload")).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(HmacSigner::new("client", vec![1u8; 4]).is_err());
    }
}

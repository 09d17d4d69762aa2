// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Signature Codec
//!
//! Signs and verifies protocol messages under either scheme.
//!
//! ```text
//! MessageDraft ──canonical_bytes──▶ signer.sign ──▶ Message (sealed)
//! Message      ──canonical_bytes──▶ verifier.verify(bytes, signature)
//! ```
//!
//! Verification failure is terminal for the message; callers never retry it.

pub mod canonical;
pub mod ed25519;
pub mod hmac;
pub mod keys;

use crate::domain::error::ProtocolError;
use crate::domain::identity::{MessageSigner, SignatureVerifier};
use crate::domain::message::{Message, MessageDraft, Signable};

pub use canonical::{canonical_bytes, payload_hash};
pub use ed25519::{Ed25519Signer, Ed25519Verifier};
pub use hmac::{HmacSigner, HmacVerifier};
pub use keys::{generate_keypair, generate_shared_secret, KeyMaterial, KeyPairPaths};

pub struct SignatureCodec;

impl SignatureCodec {
    /// Seal a draft with `signer`.
    ///
    /// The draft's `sender_id` must be the signer's identity; a mismatch is a
    /// configuration error surfaced as [`ProtocolError::AuthenticationFailure`].
    pub fn sign(draft: MessageDraft, signer: &dyn MessageSigner) -> Result<Message, ProtocolError> {
        if draft.sender_id() != signer.sender_id() {
            return Err(ProtocolError::AuthenticationFailure(format!(
                "signer '{}' cannot sign as '{}'",
                signer.sender_id(),
                draft.sender_id()
            )));
        }
        let signature = signer.sign(&canonical_bytes(&draft));
        Ok(draft.seal(signature))
    }

    pub fn verify(message: &Message, verifier: &dyn SignatureVerifier) -> Result<(), ProtocolError> {
        if message.signature().scheme() != verifier.scheme() {
            return Err(ProtocolError::AuthenticationFailure(format!(
                "signature scheme {} does not match expected {}",
                message.signature().scheme(),
                verifier.scheme()
            )));
        }
        verifier.verify(&canonical_bytes(message), message.signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::{Signature, SigningScheme};
    use crate::domain::message::{Body, CommandRequest, Nonce, Payload};

    fn draft(sender: &str) -> MessageDraft {
        let body = Body::new(Payload::Command(CommandRequest::new("ls -la"))).unwrap();
        MessageDraft::new(body, sender, 1_700_000_000)
    }

    fn schemes() -> Vec<(Box<dyn MessageSigner>, Box<dyn SignatureVerifier>)> {
        let ed = Ed25519Signer::generate("client");
        let ed_v = ed.verifier();
        let mac = HmacSigner::new("client", vec![42u8; 32]).unwrap();
        let mac_v = mac.verifier();
        vec![
            (Box::new(ed), Box::new(ed_v)),
            (Box::new(mac), Box::new(mac_v)),
        ]
    }

    #[test]
    fn test_sign_verify_both_schemes() {
        for (signer, verifier) in schemes() {
            let message = SignatureCodec::sign(draft("client"), signer.as_ref()).unwrap();
            assert_eq!(message.signature().scheme(), signer.scheme());
            assert!(SignatureCodec::verify(&message, verifier.as_ref()).is_ok());
        }
    }

    #[test]
    fn test_any_field_mutation_breaks_signature() {
        for (signer, verifier) in schemes() {
            let m = SignatureCodec::sign(draft("client"), signer.as_ref()).unwrap();
            let sig = m.signature().clone();

            let other_body = Body::new(Payload::Command(CommandRequest::new("rm -rf /"))).unwrap();
            let tampered = vec![
                Message::from_parts(other_body, "client", m.timestamp(), m.nonce().clone(), sig.clone()),
                Message::from_parts(m.body().clone(), "server", m.timestamp(), m.nonce().clone(), sig.clone()),
                Message::from_parts(m.body().clone(), "client", m.timestamp() + 1, m.nonce().clone(), sig.clone()),
                Message::from_parts(m.body().clone(), "client", m.timestamp(), Nonce::generate(), sig.clone()),
            ];
            for t in tampered {
                assert!(matches!(
                    SignatureCodec::verify(&t, verifier.as_ref()),
                    Err(ProtocolError::AuthenticationFailure(_))
                ));
            }

            let mut bytes = sig.as_bytes().to_vec();
            bytes[0] ^= 0x01;
            let flipped = Message::from_parts(
                m.body().clone(),
                "client",
                m.timestamp(),
                m.nonce().clone(),
                Signature::new(sig.scheme(), bytes),
            );
            assert!(SignatureCodec::verify(&flipped, verifier.as_ref()).is_err());
        }
    }

    #[test]
    fn test_changed_message_type_breaks_signature() {
        let signer = Ed25519Signer::generate("client");
        let body = Body::new(Payload::CacheLookup(crate::domain::message::CacheLookupRequest {
            key: "k".to_string(),
        }))
        .unwrap();
        let m = SignatureCodec::sign(MessageDraft::new(body, "client", 10), &signer).unwrap();
        let as_hit = Body::decode(
            crate::domain::message::MessageType::CacheMiss,
            m.body().document().clone(),
        )
        .unwrap();
        let t = Message::from_parts(as_hit, "client", 10, m.nonce().clone(), m.signature().clone());
        assert!(SignatureCodec::verify(&t, &signer.verifier()).is_err());
    }

    #[test]
    fn test_scheme_tag_mismatch_rejected() {
        let signer = HmacSigner::new("client", vec![1u8; 32]).unwrap();
        let m = SignatureCodec::sign(draft("client"), &signer).unwrap();
        let ed_verifier = Ed25519Signer::generate("x").verifier();
        assert!(SignatureCodec::verify(&m, &ed_verifier).is_err());
        assert_eq!(m.signature().scheme(), SigningScheme::HmacSha256);
    }

    #[test]
    fn test_sign_as_other_identity_refused() {
        let signer = Ed25519Signer::generate("relay");
        assert!(SignatureCodec::sign(draft("client"), &signer).is_err());
    }
}

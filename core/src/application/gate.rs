// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Inbound Message Gate
//!
//! The single choke-point every received message passes before anything acts
//! on it, on servers (requests) and clients (responses) alike.
//!
//! ```text
//! Message
//!   └─ KeyRing::verifier_for(sender_id)   unknown sender → AuthenticationFailure
//!   └─ SignatureCodec::verify              mismatch       → AuthenticationFailure
//!   └─ ReplayGuard::admit                  stale / dup    → ReplayRejected
//! ```
//!
//! The signature is checked before the nonce is recorded, so a forged message
//! can never consume a legitimate sender's nonce.

use std::sync::Arc;

use crate::domain::error::ProtocolError;
use crate::domain::identity::{KeyRing, MessageSigner};
use crate::domain::message::{Body, Message, MessageDraft, Signable};
use crate::domain::replay::{Clock, ReplayPolicy};
use crate::infrastructure::audit::SecurityAuditLog;
use crate::infrastructure::replay_guard::ReplayGuard;
use crate::infrastructure::signing::{KeyMaterial, SignatureCodec};

pub struct MessageGate {
    keys: KeyRing,
    replay: Arc<ReplayGuard>,
    clock: Arc<dyn Clock>,
    audit: SecurityAuditLog,
}

impl MessageGate {
    pub fn new(keys: KeyRing, replay: Arc<ReplayGuard>, clock: Arc<dyn Clock>, audit: SecurityAuditLog) -> Self {
        Self {
            keys,
            replay,
            clock,
            audit,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn replay_guard(&self) -> &Arc<ReplayGuard> {
        &self.replay
    }

    /// Verify and admit `message`. Rejections are written to the audit log.
    pub fn check(&self, message: &Message) -> Result<(), ProtocolError> {
        let now = self.clock.now();
        let result = self.check_at(message, now);
        if let Err(e) = &result {
            self.audit.rejected(message, now, e);
        }
        result
    }

    fn check_at(&self, message: &Message, now: i64) -> Result<(), ProtocolError> {
        let verifier = self.keys.verifier_for(message.sender_id()).ok_or_else(|| {
            ProtocolError::AuthenticationFailure(format!("unknown sender '{}'", message.sender_id()))
        })?;
        SignatureCodec::verify(message, verifier.as_ref())?;
        self.replay
            .admit(message.sender_id(), message.nonce().as_str(), message.timestamp(), now)
            .into_result(message.sender_id(), message.timestamp(), now)
    }
}

/// What a node needs to speak the protocol: its own signer and a gate for
/// what it receives.
#[derive(Clone)]
pub struct SigningContext {
    pub signer: Arc<dyn MessageSigner>,
    pub gate: Arc<MessageGate>,
}

impl SigningContext {
    pub fn new(signer: Arc<dyn MessageSigner>, gate: Arc<MessageGate>) -> Self {
        Self { signer, gate }
    }

    /// Build a context from loaded key material with a fresh replay guard.
    pub fn from_key_material(material: KeyMaterial, policy: ReplayPolicy, clock: Arc<dyn Clock>) -> Self {
        let audit = SecurityAuditLog::new(material.signer.sender_id());
        let gate = MessageGate::new(
            material.known_peers,
            Arc::new(ReplayGuard::new(policy)),
            clock,
            audit,
        );
        Self {
            signer: material.signer,
            gate: Arc::new(gate),
        }
    }

    pub fn sender_id(&self) -> &str {
        self.signer.sender_id()
    }

    /// Sign `body` as a new message from this node, stamped now with a fresh nonce.
    pub fn seal(&self, body: Body) -> Result<Message, ProtocolError> {
        let draft = MessageDraft::new(body, self.signer.sender_id(), self.gate.clock().now());
        SignatureCodec::sign(draft, self.signer.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ReplayKind;
    use crate::domain::message::{Payload, PingRequest};
    use crate::domain::replay::ManualClock;
    use crate::infrastructure::signing::Ed25519Signer;

    const T0: i64 = 1_700_000_000;

    fn setup() -> (SigningContext, MessageGate, ManualClock) {
        let clock = ManualClock::new(T0);
        let client = Ed25519Signer::generate("client");
        let keys = KeyRing::new().with_peer("client", Arc::new(client.verifier()));
        let gate = MessageGate::new(
            keys,
            Arc::new(ReplayGuard::new(ReplayPolicy::default())),
            Arc::new(clock.clone()),
            SecurityAuditLog::new("server"),
        );
        let client_gate = MessageGate::new(
            KeyRing::new(),
            Arc::new(ReplayGuard::new(ReplayPolicy::default())),
            Arc::new(clock.clone()),
            SecurityAuditLog::new("client"),
        );
        (
            SigningContext::new(Arc::new(client), Arc::new(client_gate)),
            gate,
            clock,
        )
    }

    fn ping() -> Body {
        Body::new(Payload::Ping(PingRequest::default())).unwrap()
    }

    #[test]
    fn test_valid_message_admitted_once() {
        let (client, gate, _) = setup();
        let m = client.seal(ping()).unwrap();
        assert!(gate.check(&m).is_ok());
        assert!(matches!(
            gate.check(&m),
            Err(ProtocolError::ReplayRejected { kind: ReplayKind::Duplicate, .. })
        ));
    }

    #[test]
    fn test_unknown_sender_rejected() {
        let (_, gate, _) = setup();
        let stranger = SigningContext::new(
            Arc::new(Ed25519Signer::generate("mallory")),
            Arc::new(MessageGate::new(
                KeyRing::new(),
                Arc::new(ReplayGuard::new(ReplayPolicy::default())),
                Arc::new(ManualClock::new(T0)),
                SecurityAuditLog::default(),
            )),
        );
        let m = stranger.seal(ping()).unwrap();
        assert!(matches!(gate.check(&m), Err(ProtocolError::AuthenticationFailure(_))));
    }

    #[test]
    fn test_stale_message_rejected() {
        let (client, gate, clock) = setup();
        let m = client.seal(ping()).unwrap();
        clock.advance(301);
        assert!(matches!(
            gate.check(&m),
            Err(ProtocolError::ReplayRejected { kind: ReplayKind::Stale, .. })
        ));
    }

    #[test]
    fn test_extreme_timestamps_are_rejected_not_panicking() {
        let (_, gate, _) = setup();
        let mallory = Ed25519Signer::generate("mallory");
        let m = SignatureCodec::sign(MessageDraft::new(ping(), "mallory", i64::MIN), &mallory).unwrap();
        assert!(matches!(gate.check(&m), Err(ProtocolError::AuthenticationFailure(_))));

        let clock = ManualClock::new(T0);
        let client = Ed25519Signer::generate("client");
        let gate = MessageGate::new(
            KeyRing::new().with_peer("client", Arc::new(client.verifier())),
            Arc::new(ReplayGuard::new(ReplayPolicy::default())),
            Arc::new(clock),
            SecurityAuditLog::new("server"),
        );
        for ts in [i64::MIN, i64::MAX] {
            let m = SignatureCodec::sign(MessageDraft::new(ping(), "client", ts), &client).unwrap();
            assert!(matches!(
                gate.check(&m),
                Err(ProtocolError::ReplayRejected { kind: ReplayKind::Stale, .. })
            ));
        }
    }

    #[test]
    fn test_forgery_does_not_burn_nonce() {
        let (client, gate, _) = setup();
        let genuine = client.seal(ping()).unwrap();
        let forged_sig = crate::domain::identity::Signature::new(
            genuine.signature().scheme(),
            vec![0u8; 64],
        );
        let forged = Message::from_parts(
            genuine.body().clone(),
            genuine.sender_id(),
            genuine.timestamp(),
            genuine.nonce().clone(),
            forged_sig,
        );
        assert!(matches!(gate.check(&forged), Err(ProtocolError::AuthenticationFailure(_))));
        assert!(gate.check(&genuine).is_ok());
    }
}

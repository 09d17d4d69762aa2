// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Wire Format
//!
//! Each message travels as one length-delimited frame holding a JSON
//! envelope:
//!
//! ```json
//! {
//!   "type": "COMMAND",
//!   "payload": { "command": "ls -la", "timeout_secs": 300 },
//!   "sender_id": "client",
//!   "timestamp": 1700000000,
//!   "nonce": "9f2c…",
//!   "signature": { "scheme": "ed25519", "value": "<base64>" }
//! }
//! ```
//!
//! Unknown envelope and payload fields are ignored. A frame that is not a
//! valid envelope, or names an unknown `type`, decodes to
//! `Some(Err(ProtocolViolation))` so the session can answer it and keep the
//! connection; only I/O and framing errors end the stream.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::domain::error::ProtocolError;
use crate::domain::identity::{Signature, SigningScheme};
use crate::domain::message::{Body, Message, MessageType, Nonce, Signable, MIN_NONCE_LEN};

/// Largest accepted frame; bounds upload and download sizes.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// Room left in a frame for the envelope around a base64 transfer payload.
pub const FRAME_OVERHEAD: usize = 64 * 1024;

/// Largest file that fits in one `UPLOAD` or `DOWNLOAD_RESULT` once base64
/// encoded.
pub const MAX_TRANSFER_BYTES: u64 = ((MAX_FRAME_LENGTH - FRAME_OVERHEAD) / 4 * 3) as u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSignature {
    pub scheme: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default = "empty_object")]
    pub payload: Value,
    pub sender_id: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: WireSignature,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl From<&Message> for WireEnvelope {
    fn from(message: &Message) -> Self {
        Self {
            message_type: message.message_type().as_str().to_string(),
            payload: message.document().clone(),
            sender_id: message.sender_id().to_string(),
            timestamp: message.timestamp(),
            nonce: message.nonce().as_str().to_string(),
            signature: WireSignature {
                scheme: message.signature().scheme().as_str().to_string(),
                value: message.signature().to_base64(),
            },
        }
    }
}

impl TryFrom<WireEnvelope> for Message {
    type Error = ProtocolError;

    fn try_from(envelope: WireEnvelope) -> Result<Self, Self::Error> {
        let message_type: MessageType = envelope.message_type.parse()?;
        if envelope.nonce.len() < MIN_NONCE_LEN {
            return Err(ProtocolError::ProtocolViolation(format!(
                "nonce must be at least {} hex characters",
                MIN_NONCE_LEN
            )));
        }
        if envelope.sender_id.is_empty() {
            return Err(ProtocolError::ProtocolViolation("empty sender_id".to_string()));
        }
        let scheme = SigningScheme::parse(&envelope.signature.scheme).ok_or_else(|| {
            ProtocolError::AuthenticationFailure(format!(
                "unsupported signature scheme '{}'",
                envelope.signature.scheme
            ))
        })?;
        let signature = Signature::from_base64(scheme, &envelope.signature.value)?;
        let body = Body::decode(message_type, envelope.payload)?;
        Ok(Message::from_parts(
            body,
            envelope.sender_id,
            envelope.timestamp,
            Nonce::from(envelope.nonce),
            signature,
        ))
    }
}

pub fn decode_frame(frame: &[u8]) -> Result<Message, ProtocolError> {
    let envelope: WireEnvelope = serde_json::from_slice(frame)
        .map_err(|e| ProtocolError::ProtocolViolation(format!("malformed envelope: {}", e)))?;
    Message::try_from(envelope)
}

pub fn encode_message(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(&WireEnvelope::from(message))
        .map_err(|e| ProtocolError::ProtocolViolation(format!("cannot encode message: {}", e)))
}

/// Fail with `ProtocolViolation` when `message` would not fit in one frame.
pub fn ensure_fits(message: &Message) -> Result<(), ProtocolError> {
    let len = encode_message(message)?.len();
    if len > MAX_FRAME_LENGTH {
        return Err(ProtocolError::ProtocolViolation(format!(
            "encoded {} is {} bytes, over the {} byte frame limit",
            message.message_type(),
            len,
            MAX_FRAME_LENGTH
        )));
    }
    Ok(())
}

/// Length-delimited JSON codec for [`Message`]s.
pub struct MessageCodec {
    frames: LengthDelimitedCodec,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self {
            frames: LengthDelimitedCodec::builder()
                .max_frame_length(MAX_FRAME_LENGTH)
                .new_codec(),
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Result<Message, ProtocolError>;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.decode(src)? {
            Some(frame) => Ok(Some(decode_frame(&frame))),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = encode_message(&message)?;
        self.frames.encode(Bytes::from(bytes), dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::{DownloadResult, MessageDraft, Payload, PingRequest};
    use crate::infrastructure::signing::{Ed25519Signer, SignatureCodec};
    use serde_json::json;

    fn ping(signer: &Ed25519Signer) -> Message {
        let body = Body::new(Payload::Ping(PingRequest::default())).unwrap();
        SignatureCodec::sign(MessageDraft::new(body, "client", 1_700_000_000), signer).unwrap()
    }

    #[test]
    fn test_codec_round_trip_preserves_signature() {
        let signer = Ed25519Signer::generate("client");
        let message = ping(&signer);
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(message.clone(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(decoded, message);
        assert!(SignatureCodec::verify(&decoded, &signer.verifier()).is_ok());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_unknown_fields_survive_and_still_verify() {
        let signer = Ed25519Signer::generate("client");
        let body = Body::decode(
            MessageType::Command,
            json!({ "command": "uptime", "timeout_secs": 5, "x-trace": "abc" }),
        )
        .unwrap();
        let message =
            SignatureCodec::sign(MessageDraft::new(body, "client", 1_700_000_000), &signer).unwrap();

        let mut envelope = serde_json::to_value(WireEnvelope::from(&message)).unwrap();
        envelope["routing_hint"] = json!("ignored");
        let decoded = decode_frame(&serde_json::to_vec(&envelope).unwrap()).unwrap();
        assert!(SignatureCodec::verify(&decoded, &signer.verifier()).is_ok());
        assert_eq!(decoded.document()["x-trace"], "abc");
    }

    #[test]
    fn test_unknown_type_is_protocol_violation() {
        let signer = Ed25519Signer::generate("client");
        let mut envelope = serde_json::to_value(WireEnvelope::from(&ping(&signer))).unwrap();
        envelope["type"] = json!("SELF_DESTRUCT");
        let err = decode_frame(&serde_json::to_vec(&envelope).unwrap()).unwrap_err();
        assert!(matches!(err, ProtocolError::ProtocolViolation(_)));
    }

    #[test]
    fn test_garbage_frame_does_not_end_stream() {
        let mut codec = MessageCodec::new();
        let mut frames = LengthDelimitedCodec::new();
        let mut buf = BytesMut::new();
        frames.encode(Bytes::from_static(b"not json"), &mut buf).unwrap();
        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(item, Err(ProtocolError::ProtocolViolation(_))));
    }

    #[test]
    fn test_largest_transfer_fits_in_a_frame() {
        let signer = Ed25519Signer::generate("client");
        let data = vec![0xa5u8; MAX_TRANSFER_BYTES as usize];
        let body = Body::new(Payload::DownloadResult(DownloadResult::found(&data))).unwrap();
        let message =
            SignatureCodec::sign(MessageDraft::new(body, "server", 1_700_000_000), &signer).unwrap();
        assert!(ensure_fits(&message).is_ok());
    }

    #[test]
    fn test_short_nonce_rejected() {
        let signer = Ed25519Signer::generate("client");
        let mut envelope = serde_json::to_value(WireEnvelope::from(&ping(&signer))).unwrap();
        envelope["nonce"] = json!("abc");
        assert!(decode_frame(&serde_json::to_vec(&envelope).unwrap()).is_err());

        // 16 hex characters only carry 8 bytes
        envelope["nonce"] = json!("0123456789abcdef");
        assert!(matches!(
            decode_frame(&serde_json::to_vec(&envelope).unwrap()),
            Err(ProtocolError::ProtocolViolation(_))
        ));
        envelope["nonce"] = json!("0123456789abcdef0123456789abcdef");
        assert!(decode_frame(&serde_json::to_vec(&envelope).unwrap()).is_ok());
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Protocol Message Model
//!
//! The closed set of message types exchanged between client, relay and
//! executor nodes, their payload shapes, and the request/response pairing
//! rules.
//!
//! ```text
//! MessageDraft { body, sender_id, timestamp, nonce }
//!   └─ SignatureCodec::sign(draft, signer)  → Message (immutable, signed)
//!         └─ wire::MessageCodec            → length-delimited JSON frame
//! ```
//!
//! ## Invariants
//!
//! - [`Body`] keeps the exact JSON document that was hashed. A receiver that
//!   does not understand some payload field still hashes (and a relay still
//!   forwards) the document untouched, so unknown fields never break a
//!   signature.
//! - Unknown payload fields are ignored when decoding; an unknown `type` is a
//!   [`ProtocolError::ProtocolViolation`].
//! - A [`Message`] is only produced by sealing a draft with a signature or by
//!   decoding one from the wire; its fields are read-only.

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::{ProtocolError, RejectionReason};
use crate::domain::execution::ExecutionResult;
use crate::domain::identity::Signature;

/// Default command timeout when a request does not carry one.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Random bytes in a generated nonce.
pub const NONCE_BYTES: usize = 16;

/// Minimum accepted nonce length in characters of the hex wire form, so a
/// peer's nonce carries at least [`NONCE_BYTES`] bytes.
pub const MIN_NONCE_LEN: usize = NONCE_BYTES * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Command,
    Response,
    Upload,
    UploadResult,
    Download,
    DownloadResult,
    Ping,
    Pong,
    CacheLookup,
    CacheHit,
    CacheMiss,
    CacheStoreExec,
    Error,
    AuthError,
}

impl MessageType {
    pub const ALL: [MessageType; 14] = [
        Self::Command,
        Self::Response,
        Self::Upload,
        Self::UploadResult,
        Self::Download,
        Self::DownloadResult,
        Self::Ping,
        Self::Pong,
        Self::CacheLookup,
        Self::CacheHit,
        Self::CacheMiss,
        Self::CacheStoreExec,
        Self::Error,
        Self::AuthError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "COMMAND",
            Self::Response => "RESPONSE",
            Self::Upload => "UPLOAD",
            Self::UploadResult => "UPLOAD_RESULT",
            Self::Download => "DOWNLOAD",
            Self::DownloadResult => "DOWNLOAD_RESULT",
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::CacheLookup => "CACHE_LOOKUP",
            Self::CacheHit => "CACHE_HIT",
            Self::CacheMiss => "CACHE_MISS",
            Self::CacheStoreExec => "CACHE_STORE_EXEC",
            Self::Error => "ERROR",
            Self::AuthError => "AUTH_ERROR",
        }
    }

    /// Success responses a request of this type may be answered with.
    ///
    /// Empty for response types. `ERROR` and `AUTH_ERROR` are implicitly
    /// allowed for every request, see [`MessageType::accepts_response`].
    pub fn expected_responses(self) -> &'static [MessageType] {
        match self {
            Self::Command | Self::CacheStoreExec => &[Self::Response],
            Self::Upload => &[Self::UploadResult],
            Self::Download => &[Self::DownloadResult],
            Self::Ping => &[Self::Pong],
            Self::CacheLookup => &[Self::CacheHit, Self::CacheMiss],
            Self::Response
            | Self::UploadResult
            | Self::DownloadResult
            | Self::Pong
            | Self::CacheHit
            | Self::CacheMiss
            | Self::Error
            | Self::AuthError => &[],
        }
    }

    pub fn is_request(self) -> bool {
        !self.expected_responses().is_empty()
    }

    pub fn accepts_response(self, response: MessageType) -> bool {
        self.is_request()
            && (self.expected_responses().contains(&response)
                || matches!(response, Self::Error | Self::AuthError))
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProtocolError::ProtocolViolation(format!("unknown message type '{}'", s)))
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_mode() -> String {
    "0644".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

/// Upload of a binary blob; `data` is base64 on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub remote_path: String,
    pub data: String,
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl UploadRequest {
    pub fn new(remote_path: impl Into<String>, data: &[u8], mode: Option<String>) -> Self {
        Self {
            remote_path: remote_path.into(),
            data: STANDARD.encode(data),
            mode: mode.unwrap_or_else(default_mode),
        }
    }

    pub fn decode_data(&self) -> Result<Vec<u8>, ProtocolError> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| ProtocolError::ProtocolViolation(format!("invalid base64 upload data: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub bytes_written: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub remote_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub message: String,
}

impl DownloadResult {
    pub fn found(data: &[u8]) -> Self {
        Self {
            found: true,
            data: Some(STANDARD.encode(data)),
            size: data.len() as u64,
            message: format!("Read {} bytes", data.len()),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            found: false,
            data: None,
            size: 0,
            message: message.into(),
        }
    }

    pub fn decode_data(&self) -> Result<Option<Vec<u8>>, ProtocolError> {
        self.data
            .as_deref()
            .map(|d| {
                STANDARD.decode(d).map_err(|e| {
                    ProtocolError::ProtocolViolation(format!("invalid base64 download data: {}", e))
                })
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongReply {
    pub node_id: String,
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLookupRequest {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHitReply {
    pub key: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMissReply {
    pub key: String,
}

/// Execute `command` and remember it remotely under `key`.
///
/// `explanation` travels with the request for the executor's logs; the
/// remote store keeps only `key -> command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStoreExecRequest {
    pub key: String,
    pub command: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Handler-level failure (bad path, key conflict, upstream down).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorReply {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Rejection of an inbound message before any handler ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthErrorReply {
    pub reason: RejectionReason,
    #[serde(default)]
    pub message: String,
}

/// Error codes carried by [`ErrorReply`].
pub mod error_codes {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const FILE_NOT_FOUND: &str = "FILE_NOT_FOUND";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const CACHE_KEY_CONFLICT: &str = "CACHE_KEY_CONFLICT";
    pub const UPSTREAM_UNAVAILABLE: &str = "UPSTREAM_UNAVAILABLE";
    pub const UPSTREAM_INVALID_RESPONSE: &str = "UPSTREAM_INVALID_RESPONSE";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Typed payload, one variant per [`MessageType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Command(CommandRequest),
    Response(ExecutionResult),
    Upload(UploadRequest),
    UploadResult(UploadResult),
    Download(DownloadRequest),
    DownloadResult(DownloadResult),
    Ping(PingRequest),
    Pong(PongReply),
    CacheLookup(CacheLookupRequest),
    CacheHit(CacheHitReply),
    CacheMiss(CacheMissReply),
    CacheStoreExec(CacheStoreExecRequest),
    Error(ErrorReply),
    AuthError(AuthErrorReply),
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Command(_) => MessageType::Command,
            Self::Response(_) => MessageType::Response,
            Self::Upload(_) => MessageType::Upload,
            Self::UploadResult(_) => MessageType::UploadResult,
            Self::Download(_) => MessageType::Download,
            Self::DownloadResult(_) => MessageType::DownloadResult,
            Self::Ping(_) => MessageType::Ping,
            Self::Pong(_) => MessageType::Pong,
            Self::CacheLookup(_) => MessageType::CacheLookup,
            Self::CacheHit(_) => MessageType::CacheHit,
            Self::CacheMiss(_) => MessageType::CacheMiss,
            Self::CacheStoreExec(_) => MessageType::CacheStoreExec,
            Self::Error(_) => MessageType::Error,
            Self::AuthError(_) => MessageType::AuthError,
        }
    }

    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Command(p) => serde_json::to_value(p),
            Self::Response(p) => serde_json::to_value(p),
            Self::Upload(p) => serde_json::to_value(p),
            Self::UploadResult(p) => serde_json::to_value(p),
            Self::Download(p) => serde_json::to_value(p),
            Self::DownloadResult(p) => serde_json::to_value(p),
            Self::Ping(p) => serde_json::to_value(p),
            Self::Pong(p) => serde_json::to_value(p),
            Self::CacheLookup(p) => serde_json::to_value(p),
            Self::CacheHit(p) => serde_json::to_value(p),
            Self::CacheMiss(p) => serde_json::to_value(p),
            Self::CacheStoreExec(p) => serde_json::to_value(p),
            Self::Error(p) => serde_json::to_value(p),
            Self::AuthError(p) => serde_json::to_value(p),
        }
    }

    pub fn from_document(message_type: MessageType, document: Value) -> Result<Self, serde_json::Error> {
        Ok(match message_type {
            MessageType::Command => Self::Command(serde_json::from_value(document)?),
            MessageType::Response => Self::Response(serde_json::from_value(document)?),
            MessageType::Upload => Self::Upload(serde_json::from_value(document)?),
            MessageType::UploadResult => Self::UploadResult(serde_json::from_value(document)?),
            MessageType::Download => Self::Download(serde_json::from_value(document)?),
            MessageType::DownloadResult => Self::DownloadResult(serde_json::from_value(document)?),
            MessageType::Ping => Self::Ping(serde_json::from_value(document)?),
            MessageType::Pong => Self::Pong(serde_json::from_value(document)?),
            MessageType::CacheLookup => Self::CacheLookup(serde_json::from_value(document)?),
            MessageType::CacheHit => Self::CacheHit(serde_json::from_value(document)?),
            MessageType::CacheMiss => Self::CacheMiss(serde_json::from_value(document)?),
            MessageType::CacheStoreExec => Self::CacheStoreExec(serde_json::from_value(document)?),
            MessageType::Error => Self::Error(serde_json::from_value(document)?),
            MessageType::AuthError => Self::AuthError(serde_json::from_value(document)?),
        })
    }
}

/// A typed payload plus the JSON document it was read from or written as.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    payload: Payload,
    document: Value,
}

impl Body {
    pub fn new(payload: Payload) -> Result<Self, ProtocolError> {
        let document = payload.to_document().map_err(|e| {
            ProtocolError::ProtocolViolation(format!("cannot encode {} payload: {}", payload.message_type(), e))
        })?;
        Ok(Self { payload, document })
    }

    /// Decode a received payload document. Unknown fields are kept in the
    /// document and ignored by the typed view.
    pub fn decode(message_type: MessageType, document: Value) -> Result<Self, ProtocolError> {
        if !document.is_object() {
            return Err(ProtocolError::ProtocolViolation(format!(
                "{} payload must be an object",
                message_type
            )));
        }
        let payload = Payload::from_document(message_type, document.clone()).map_err(|e| {
            ProtocolError::ProtocolViolation(format!("malformed {} payload: {}", message_type, e))
        })?;
        Ok(Self { payload, document })
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        let reply = ErrorReply::new(code, message);
        let document = serde_json::json!({ "code": reply.code, "message": reply.message });
        Self {
            payload: Payload::Error(reply),
            document,
        }
    }

    pub fn auth_error(reason: RejectionReason, message: impl Into<String>) -> Self {
        let reply = AuthErrorReply {
            reason,
            message: message.into(),
        };
        let document = serde_json::json!({ "reason": reason, "message": reply.message });
        Self {
            payload: Payload::AuthError(reply),
            document,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }
}

/// Fresh random single-use token; 16 random bytes, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Nonce {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Nonce {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields covered by a signature. Implemented by both drafts and sealed messages.
pub trait Signable {
    fn message_type(&self) -> MessageType;
    fn document(&self) -> &Value;
    fn sender_id(&self) -> &str;
    fn timestamp(&self) -> i64;
    fn nonce(&self) -> &Nonce;
}

/// An unsigned message under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    body: Body,
    sender_id: String,
    timestamp: i64,
    nonce: Nonce,
}

impl MessageDraft {
    /// Draft with a freshly generated nonce.
    pub fn new(body: Body, sender_id: impl Into<String>, timestamp: i64) -> Self {
        Self::with_nonce(body, sender_id, timestamp, Nonce::generate())
    }

    pub fn with_nonce(body: Body, sender_id: impl Into<String>, timestamp: i64, nonce: Nonce) -> Self {
        Self {
            body,
            sender_id: sender_id.into(),
            timestamp,
            nonce,
        }
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn seal(self, signature: Signature) -> Message {
        Message {
            body: self.body,
            sender_id: self.sender_id,
            timestamp: self.timestamp,
            nonce: self.nonce,
            signature,
        }
    }
}

impl Signable for MessageDraft {
    fn message_type(&self) -> MessageType {
        self.body.message_type()
    }
    fn document(&self) -> &Value {
        self.body.document()
    }
    fn sender_id(&self) -> &str {
        &self.sender_id
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn nonce(&self) -> &Nonce {
        &self.nonce
    }
}

/// A signed protocol message. Consumed once by the receiving session.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    body: Body,
    sender_id: String,
    timestamp: i64,
    nonce: Nonce,
    signature: Signature,
}

impl Message {
    /// Reassemble a message received from the wire. The signature is not
    /// checked here.
    pub fn from_parts(
        body: Body,
        sender_id: impl Into<String>,
        timestamp: i64,
        nonce: Nonce,
        signature: Signature,
    ) -> Self {
        Self {
            body,
            sender_id: sender_id.into(),
            timestamp,
            nonce,
            signature,
        }
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn payload(&self) -> &Payload {
        self.body.payload()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn into_body(self) -> Body {
        self.body
    }
}

impl Signable for Message {
    fn message_type(&self) -> MessageType {
        self.body.message_type()
    }
    fn document(&self) -> &Value {
        self.body.document()
    }
    fn sender_id(&self) -> &str {
        &self.sender_id
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn nonce(&self) -> &Nonce {
        &self.nonce
    }
}

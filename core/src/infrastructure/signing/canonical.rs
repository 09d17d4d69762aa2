// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Byte-stable canonical encoding of the signed fields.
//!
//! ```text
//! "sigrelay/v1"
//! len32 | type
//! payload_hash (SHA-256 of the canonical JSON payload, 32 bytes)
//! len32 | sender_id
//! timestamp (i64, big endian)
//! len32 | nonce
//! ```
//!
//! Canonical JSON is compact with object keys sorted by byte order at every
//! level, independent of how `serde_json` orders maps internally.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::message::Signable;

const DOMAIN_TAG: &[u8] = b"sigrelay/v1";

pub fn canonical_bytes(message: &impl Signable) -> Vec<u8> {
    let message_type = message.message_type().as_str().as_bytes();
    let sender_id = message.sender_id().as_bytes();
    let nonce = message.nonce().as_str().as_bytes();

    let mut out = Vec::with_capacity(
        DOMAIN_TAG.len() + 32 + 8 + 12 + message_type.len() + sender_id.len() + nonce.len(),
    );
    out.extend_from_slice(DOMAIN_TAG);
    put_field(&mut out, message_type);
    out.extend_from_slice(&payload_hash(message.document()));
    put_field(&mut out, sender_id);
    out.extend_from_slice(&message.timestamp().to_be_bytes());
    put_field(&mut out, nonce);
    out
}

pub fn payload_hash(document: &Value) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(document).as_bytes());
    hasher.finalize().into()
}

pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_json(value, &mut out);
    out
}

fn put_field(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(&(field.len() as u32).to_be_bytes());
    out.extend_from_slice(field);
}

fn write_json(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serializing a string cannot fail
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_json(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Key Files and Node Key Material
//!
//! Keys are stored as lowercase hex, one key per file:
//!
//! | File | Content |
//! |------|---------|
//! | `<id>_private.key` | Ed25519 secret key (32 bytes), mode 0600 |
//! | `<id>_public.key` | Ed25519 public key (32 bytes) |
//! | `shared_secret.key` | HMAC-SHA256 secret (32 bytes), mode 0600 |
//!
//! [`KeyMaterial::load`] turns a node's [`SigningConfig`] into its signer plus
//! a [`KeyRing`] of trusted peers. Key bytes never reach a log line.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ed25519_dalek::SigningKey;
use rand_core::{OsRng, RngCore};
use tracing::{debug, info};

use super::ed25519::{Ed25519Signer, Ed25519Verifier};
use super::hmac::{HmacSigner, HmacVerifier};
use crate::domain::error::KeyError;
use crate::domain::identity::{KeyRing, MessageSigner, SignatureVerifier, SigningScheme};
use crate::domain::node_config::SigningConfig;

const SHARED_SECRET_LEN: usize = 32;

/// Everything one node needs to sign and verify.
#[derive(Clone)]
pub struct KeyMaterial {
    pub signer: Arc<dyn MessageSigner>,
    pub known_peers: KeyRing,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("sender_id", &self.signer.sender_id())
            .field("scheme", &self.signer.scheme())
            .field("known_peers", &self.known_peers)
            .finish()
    }
}

impl KeyMaterial {
    pub fn new(signer: Arc<dyn MessageSigner>, known_peers: KeyRing) -> Self {
        Self { signer, known_peers }
    }

    /// Load this node's signing key and the keys of every trusted peer.
    pub fn load(node_id: &str, config: &SigningConfig) -> Result<Self, KeyError> {
        let signer: Arc<dyn MessageSigner> = match config.scheme {
            SigningScheme::Ed25519 => {
                let path = config.private_key_file(node_id);
                let secret = read_key_file(&path, 32)?;
                Arc::new(Ed25519Signer::from_secret_bytes(node_id, &secret)?)
            }
            SigningScheme::HmacSha256 => {
                let path = config.shared_secret_file();
                let secret = read_hex_file(&path)?;
                Arc::new(HmacSigner::new(node_id, secret)?)
            }
        };

        let mut known_peers = KeyRing::new();
        for peer in &config.trusted_peers {
            let path = config.peer_key_file(peer);
            let verifier: Arc<dyn SignatureVerifier> = match config.scheme {
                SigningScheme::Ed25519 => {
                    Arc::new(Ed25519Verifier::from_public_bytes(&read_key_file(&path, 32)?)?)
                }
                SigningScheme::HmacSha256 => Arc::new(HmacVerifier::new(read_hex_file(&path)?)?),
            };
            debug!(peer = %peer.id, path = %path.display(), "Loaded peer key");
            known_peers.insert(peer.id.clone(), verifier);
        }

        info!(
            sender_id = node_id,
            scheme = %config.scheme,
            peers = config.trusted_peers.len(),
            "Key material loaded"
        );
        Ok(Self { signer, known_peers })
    }

    /// Verifier for one extra peer outside `trusted_peers` (e.g. a relay's upstream).
    pub fn load_peer(config: &SigningConfig, peer_id: &str) -> Result<Arc<dyn SignatureVerifier>, KeyError> {
        let peer = crate::domain::node_config::TrustedPeer::new(peer_id);
        let path = config.peer_key_file(&peer);
        Ok(match config.scheme {
            SigningScheme::Ed25519 => {
                Arc::new(Ed25519Verifier::from_public_bytes(&read_key_file(&path, 32)?)?)
            }
            SigningScheme::HmacSha256 => Arc::new(HmacVerifier::new(read_hex_file(&path)?)?),
        })
    }
}

/// Paths written by [`generate_keypair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairPaths {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

/// Generate an Ed25519 keypair for `id` into `dir`.
pub fn generate_keypair(dir: &Path, id: &str, force: bool) -> Result<KeyPairPaths, KeyError> {
    let paths = KeyPairPaths {
        private_key: dir.join(format!("{}_private.key", id)),
        public_key: dir.join(format!("{}_public.key", id)),
    };
    if !force {
        for path in [&paths.private_key, &paths.public_key] {
            if path.exists() {
                return Err(KeyError::AlreadyExists(path.display().to_string()));
            }
        }
    }

    let key = SigningKey::generate(&mut OsRng);
    write_key_file(&paths.private_key, key.as_bytes(), true)?;
    write_key_file(&paths.public_key, key.verifying_key().as_bytes(), false)?;
    info!(id, dir = %dir.display(), "Generated Ed25519 keypair");
    Ok(paths)
}

/// Generate a random HMAC shared secret at `path`.
pub fn generate_shared_secret(path: &Path, force: bool) -> Result<PathBuf, KeyError> {
    if !force && path.exists() {
        return Err(KeyError::AlreadyExists(path.display().to_string()));
    }
    let mut secret = [0u8; SHARED_SECRET_LEN];
    OsRng.fill_bytes(&mut secret);
    write_key_file(path, &secret, true)?;
    info!(path = %path.display(), "Generated HMAC shared secret");
    Ok(path.to_path_buf())
}

pub fn read_hex_file(path: &Path) -> Result<Vec<u8>, KeyError> {
    let content = std::fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    hex::decode(content.trim()).map_err(|_| KeyError::InvalidEncoding(path.display().to_string()))
}

pub fn read_key_file(path: &Path, expected: usize) -> Result<Vec<u8>, KeyError> {
    let bytes = read_hex_file(path)?;
    if bytes.len() != expected {
        return Err(KeyError::InvalidLength {
            path: path.display().to_string(),
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

fn write_key_file(path: &Path, bytes: &[u8], private: bool) -> Result<(), KeyError> {
    let io_err = |source| KeyError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(if private { 0o600 } else { 0o644 });
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(path).map_err(io_err)?;
    file.write_all(hex::encode(bytes).as_bytes()).map_err(io_err)?;
    file.write_all(b"\n").map_err(io_err)?;

    // mode() only applies on creation
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(io_err)?;
    }
    Ok(())
}

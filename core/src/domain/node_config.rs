// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Defines the static configuration of a sigrelay node:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Node identity (sender_id) and role
// - Signing scheme and per-role key material paths
// - Replay window and clock skew tolerance
// - Semantic cache thresholds and embedding provider
// - Listener, relay upstream and remote peer addresses

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::identity::SigningScheme;
use crate::domain::message::DEFAULT_COMMAND_TIMEOUT_SECS;
use crate::domain::replay::{ReplayPolicy, DEFAULT_REPLAY_WINDOW_SECS};

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "NodeConfig";

pub type NodeConfig = NodeConfigManifest;

/// Top-level Kubernetes-style node configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "NodeConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: NodeConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Node configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfigSpec {
    #[serde(default)]
    pub node: NodeIdentity,

    #[serde(default)]
    pub signing: SigningConfig,

    #[serde(default)]
    pub replay: ReplayConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    /// Peer the client talks to (a relay or an executor)
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Upstream of a relay node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayConfig>,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Identity placed in `sender_id` of every message this node signs
    pub id: String,

    pub role: NodeRole,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            id: "client".to_string(),
            role: NodeRole::Client,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Client,
    Relay,
    Executor,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Relay => write!(f, "relay"),
            Self::Executor => write!(f, "executor"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    #[serde(default = "default_scheme")]
    pub scheme: SigningScheme,

    /// Directory holding `<id>_private.key` / `<id>_public.key` files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_dir: Option<String>,

    /// Overrides `<key_dir>/<node.id>_private.key`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,

    /// Overrides `<key_dir>/shared_secret.key` (hmac-sha256 only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_secret_path: Option<String>,

    /// Peers whose signatures this node accepts
    #[serde(default)]
    pub trusted_peers: Vec<TrustedPeer>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            key_dir: None,
            private_key_path: None,
            shared_secret_path: None,
            trusted_peers: vec![],
        }
    }
}

impl SigningConfig {
    pub fn key_dir(&self) -> PathBuf {
        match &self.key_dir {
            Some(dir) => PathBuf::from(dir),
            None => default_key_dir(),
        }
    }

    pub fn private_key_file(&self, node_id: &str) -> PathBuf {
        match &self.private_key_path {
            Some(path) => PathBuf::from(path),
            None => self.key_dir().join(format!("{}_private.key", node_id)),
        }
    }

    pub fn shared_secret_file(&self) -> PathBuf {
        match &self.shared_secret_path {
            Some(path) => PathBuf::from(path),
            None => self.key_dir().join("shared_secret.key"),
        }
    }

    pub fn peer_key_file(&self, peer: &TrustedPeer) -> PathBuf {
        match self.scheme {
            SigningScheme::Ed25519 => match &peer.public_key_path {
                Some(path) => PathBuf::from(path),
                None => self.key_dir().join(format!("{}_public.key", peer.id)),
            },
            SigningScheme::HmacSha256 => match &peer.shared_secret_path {
                Some(path) => PathBuf::from(path),
                None => self.shared_secret_file(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedPeer {
    /// Expected `sender_id`
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_secret_path: Option<String>,
}

impl TrustedPeer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            public_key_path: None,
            shared_secret_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// How long admitted nonces are remembered (seconds)
    #[serde(default = "default_replay_window")]
    pub window_secs: u64,

    /// Largest accepted |now - timestamp|; defaults to `window_secs`.
    /// Set explicitly when hops run on clocks with known drift.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_clock_skew_secs: Option<u64>,

    /// Interval of the background eviction sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            window_secs: default_replay_window(),
            max_clock_skew_secs: None,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl ReplayConfig {
    pub fn policy(&self) -> ReplayPolicy {
        let policy = ReplayPolicy::new(self.window_secs);
        match self.max_clock_skew_secs {
            Some(skew) => policy.with_max_skew(skew),
            None => policy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Similarity at or above which a cached command is used as-is
    #[serde(default = "default_exact_threshold")]
    pub exact_threshold: f64,

    /// Similarity at or above which a cached command needs validation
    #[serde(default = "default_near_threshold")]
    pub near_threshold: f64,

    /// Cache database directory; defaults to `~/.sigrelay/cache`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            exact_threshold: default_exact_threshold(),
            near_threshold: default_near_threshold(),
            path: None,
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => default_state_dir().join("cache"),
        }
    }
}

/// OpenAI-compatible embeddings endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            api_key_env: default_embedding_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-call deadline for request/response round trips
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl NetworkConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// host:port of the next hop
    #[serde(default = "default_remote_address")]
    pub address: String,

    /// `sender_id` the next hop signs with
    #[serde(default = "default_remote_id")]
    pub id: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            address: default_remote_address(),
            id: default_remote_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// host:port of the upstream hop
    pub upstream_address: String,

    /// `sender_id` of the upstream hop
    pub upstream_id: String,

    /// Idle upstream connections kept for reuse
    #[serde(default = "default_max_idle_upstream")]
    pub max_idle_connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Remote command store directory; in-memory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_store_path: Option<String>,

    #[serde(default = "default_command_timeout")]
    pub default_timeout_secs: u64,

    /// Upper bound applied to client-supplied timeouts
    #[serde(default = "default_max_command_timeout")]
    pub max_timeout_secs: u64,

    /// When set, uploads and downloads are confined to these directories
    #[serde(default)]
    pub allowed_roots: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command_store_path: None,
            default_timeout_secs: default_command_timeout(),
            max_timeout_secs: default_max_command_timeout(),
            allowed_roots: vec![],
        }
    }
}

fn default_scheme() -> SigningScheme {
    SigningScheme::Ed25519
}

fn default_replay_window() -> u64 {
    DEFAULT_REPLAY_WINDOW_SECS
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_cache_enabled() -> bool {
    true
}

fn default_exact_threshold() -> f64 {
    0.99
}

fn default_near_threshold() -> f64 {
    0.85
}

fn default_embedding_endpoint() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_embedding_model() -> String {
    "openai/text-embedding-3-small".to_string()
}

fn default_embedding_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_request_timeout() -> u64 {
    330
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_remote_address() -> String {
    "127.0.0.1:8765".to_string()
}

fn default_remote_id() -> String {
    "server".to_string()
}

fn default_max_idle_upstream() -> usize {
    4
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_max_command_timeout() -> u64 {
    3600
}

/// `~/.sigrelay`, or `./.sigrelay` when no home directory is known
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".sigrelay"))
        .unwrap_or_else(|| PathBuf::from(".sigrelay"))
}

pub fn default_key_dir() -> PathBuf {
    default_state_dir().join("keys")
}

impl Default for NodeConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "sigrelay-node".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: NodeConfigSpec::default(),
        }
    }
}

impl NodeConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SIGRELAY_CONFIG_PATH environment variable
    /// 2. ./sigrelay-config.yaml (working directory)
    /// 3. ~/.sigrelay/config.yaml (user home)
    /// 4. /etc/sigrelay/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SIGRELAY_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./sigrelay-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".sigrelay").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/sigrelay/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SIGRELAY_NODE_ID") {
            tracing::info!("Environment override: SIGRELAY_NODE_ID={}", val);
            self.spec.node.id = val;
        }

        if let Ok(val) = std::env::var("SIGRELAY_PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: SIGRELAY_PORT={}", port);
                    self.spec.network.port = port;
                }
                Err(_) => tracing::warn!("Invalid value for SIGRELAY_PORT: '{}'. Ignoring.", val),
            }
        }

        if let Ok(val) = std::env::var("SIGRELAY_REPLAY_WINDOW_SECS") {
            match val.parse::<u64>() {
                Ok(window) => {
                    tracing::info!("Environment override: SIGRELAY_REPLAY_WINDOW_SECS={}", window);
                    self.spec.replay.window_secs = window;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for SIGRELAY_REPLAY_WINDOW_SECS: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("SIGRELAY_REMOTE") {
            tracing::info!("Environment override: SIGRELAY_REMOTE={}", val);
            self.spec.remote.address = val;
        }

        if let Ok(val) = std::env::var("SIGRELAY_UPSTREAM") {
            match self.spec.relay.as_mut() {
                Some(relay) => {
                    tracing::info!("Environment override: SIGRELAY_UPSTREAM={}", val);
                    relay.upstream_address = val;
                }
                None => tracing::warn!("SIGRELAY_UPSTREAM set but spec.relay is not configured. Ignoring."),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.node.id.is_empty() {
            anyhow::bail!("spec.node.id cannot be empty");
        }

        for peer in &self.spec.signing.trusted_peers {
            if peer.id.is_empty() {
                anyhow::bail!("spec.signing.trusted_peers: peer id cannot be empty");
            }
            if peer.id == self.spec.node.id && self.spec.signing.scheme == SigningScheme::Ed25519 {
                anyhow::bail!(
                    "spec.signing.trusted_peers: node '{}' cannot trust its own identity",
                    peer.id
                );
            }
        }

        let replay = &self.spec.replay;
        if replay.window_secs == 0 {
            anyhow::bail!("spec.replay.window_secs must be greater than 0");
        }
        if replay.max_clock_skew_secs == Some(0) {
            anyhow::bail!("spec.replay.max_clock_skew_secs must be greater than 0");
        }
        if replay.sweep_interval_secs == 0 {
            anyhow::bail!("spec.replay.sweep_interval_secs must be greater than 0");
        }

        let cache = &self.spec.cache;
        if !(cache.exact_threshold > 0.0 && cache.exact_threshold <= 1.0) {
            anyhow::bail!(
                "spec.cache.exact_threshold must be in (0, 1], got {}",
                cache.exact_threshold
            );
        }
        if !(cache.near_threshold > 0.0 && cache.near_threshold < cache.exact_threshold) {
            anyhow::bail!(
                "spec.cache.near_threshold must be in (0, exact_threshold), got {}",
                cache.near_threshold
            );
        }

        if self.spec.network.request_timeout_secs == 0 {
            anyhow::bail!("spec.network.request_timeout_secs must be greater than 0");
        }

        match (&self.spec.node.role, &self.spec.relay) {
            (NodeRole::Relay, None) => anyhow::bail!("spec.relay is required for role 'relay'"),
            (NodeRole::Relay, Some(relay)) => {
                if relay.upstream_address.is_empty() || relay.upstream_id.is_empty() {
                    anyhow::bail!("spec.relay.upstream_address and upstream_id cannot be empty");
                }
            }
            _ => {}
        }

        if self.spec.node.role != NodeRole::Client && self.spec.signing.trusted_peers.is_empty() {
            anyhow::bail!(
                "spec.signing.trusted_peers cannot be empty for role '{}'",
                self.spec.node.role
            );
        }

        let executor = &self.spec.executor;
        if executor.default_timeout_secs == 0 || executor.default_timeout_secs > executor.max_timeout_secs {
            anyhow::bail!("spec.executor.default_timeout_secs must be in 1..=max_timeout_secs");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = NodeConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.node.role, NodeRole::Client);
        assert_eq!(manifest.spec.signing.scheme, SigningScheme::Ed25519);
        assert_eq!(manifest.spec.replay.window_secs, 300);
        assert_eq!(manifest.spec.cache.exact_threshold, 0.99);
        assert_eq!(manifest.spec.cache.near_threshold, 0.85);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_parsing_with_partial_spec() {
        let yaml = r#"
apiVersion: 100monkeys.ai/v1
kind: NodeConfig
metadata:
  name: edge-relay
spec:
  node:
    id: relay
    role: relay
  signing:
    scheme: hmac-sha256
    key_dir: /var/lib/sigrelay/keys
    trusted_peers:
      - id: client
  replay:
    window_secs: 120
    max_clock_skew_secs: 30
  relay:
    upstream_address: 10.0.0.5:8765
    upstream_id: server
"#;
        let manifest = NodeConfigManifest::from_yaml_str(yaml).unwrap();
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.spec.node.role, NodeRole::Relay);
        assert_eq!(manifest.spec.signing.scheme, SigningScheme::HmacSha256);
        assert_eq!(manifest.spec.network.port, 8765);

        let policy = manifest.spec.replay.policy();
        assert_eq!(policy.window_secs, 120);
        assert_eq!(policy.max_skew_secs, 30);

        let peer = &manifest.spec.signing.trusted_peers[0];
        assert_eq!(
            manifest.spec.signing.peer_key_file(peer),
            PathBuf::from("/var/lib/sigrelay/keys/shared_secret.key")
        );
        assert_eq!(
            manifest.spec.signing.private_key_file("relay"),
            PathBuf::from("/var/lib/sigrelay/keys/relay_private.key")
        );
    }

    #[test]
    fn test_peer_public_key_path_for_ed25519() {
        let signing = SigningConfig {
            key_dir: Some("/keys".to_string()),
            ..SigningConfig::default()
        };
        assert_eq!(
            signing.peer_key_file(&TrustedPeer::new("client")),
            PathBuf::from("/keys/client_public.key")
        );
    }

    #[test]
    fn test_validation() {
        let mut manifest = NodeConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.spec.node.id = "".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.node.id = "client".to_string();

        manifest.spec.cache.near_threshold = 0.995;
        assert!(manifest.validate().is_err());
        manifest.spec.cache.near_threshold = 0.85;

        manifest.spec.replay.window_secs = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.replay.window_secs = 300;

        manifest.spec.node.role = NodeRole::Relay;
        assert!(manifest.validate().is_err());
        manifest.spec.signing.trusted_peers.push(TrustedPeer::new("client"));
        manifest.spec.relay = Some(RelayConfig {
            upstream_address: "127.0.0.1:9000".to_string(),
            upstream_id: "server".to_string(),
            max_idle_connections: 2,
        });
        manifest.spec.node.id = "relay".to_string();
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip_keeps_relay_section() {
        let mut manifest = NodeConfigManifest::default();
        manifest.spec.relay = Some(RelayConfig {
            upstream_address: "127.0.0.1:9000".to_string(),
            upstream_id: "server".to_string(),
            max_idle_connections: 2,
        });
        let yaml = serde_yaml::to_string(&manifest).unwrap();
        let parsed = NodeConfigManifest::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec.relay.unwrap().upstream_id, "server");
    }
}

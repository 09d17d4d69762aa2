// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Wiring from a loaded [`NodeConfig`] to running protocol components.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use sigrelay_core::application::{
    ExecutorService, RelayService, RemoteSession, SessionShell, SigningContext, UpstreamPool,
};
use sigrelay_core::domain::command_store::RemoteCommandStore;
use sigrelay_core::domain::identity::KeyRing;
use sigrelay_core::domain::node_config::NodeConfig;
use sigrelay_core::domain::replay::{Clock, SystemClock};
use sigrelay_core::infrastructure::signing::KeyMaterial;
use sigrelay_core::infrastructure::{
    InMemoryCommandStore, LocalFileTransfer, ReplaySweeper, ShellExecutor, SledCommandStore,
};
use sigrelay_cortex::{
    EmbeddingProvider, HashEmbeddingClient, HttpEmbeddingClient, SimilarityThresholds, SledCacheRepository,
    StandardSemanticCache,
};

/// Key material for this node, with `extra_peers` added to the trusted set
/// when they are not already configured.
pub fn load_keys(config: &NodeConfig, extra_peers: &[&str]) -> Result<KeyMaterial> {
    let signing = &config.spec.signing;
    let mut material = KeyMaterial::load(&config.spec.node.id, signing)
        .with_context(|| format!("Failed to load keys for node '{}'", config.spec.node.id))?;
    for peer in extra_peers {
        if material.known_peers.verifier_for(peer).is_none() {
            let verifier = KeyMaterial::load_peer(signing, peer)
                .with_context(|| format!("Failed to load key for peer '{}'", peer))?;
            material.known_peers.insert(*peer, verifier);
        }
    }
    Ok(material)
}

pub fn signing_context(config: &NodeConfig, material: KeyMaterial) -> SigningContext {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    SigningContext::from_key_material(material, config.spec.replay.policy(), clock)
}

/// Start the periodic replay sweep for `context`'s guard.
pub fn start_sweeper(config: &NodeConfig, context: &SigningContext) -> CancellationToken {
    let sweeper = ReplaySweeper::new(
        context.gate.replay_guard().clone(),
        context.gate.clock().clone(),
        Duration::from_secs(config.spec.replay.sweep_interval_secs),
    );
    let token = sweeper.shutdown_token();
    sweeper.start();
    token
}

/// Open a client session to `spec.remote`.
pub async fn connect_remote(config: &NodeConfig) -> Result<RemoteSession> {
    let remote = &config.spec.remote;
    let material = load_keys(config, &[remote.id.as_str()])?;
    let context = signing_context(config, material);
    let network = &config.spec.network;
    RemoteSession::connect(
        &remote.address,
        Duration::from_secs(network.connect_timeout_secs),
        Duration::from_secs(network.request_timeout_secs),
        context,
    )
    .await
    .with_context(|| format!("Failed to connect to {} at {}", remote.id, remote.address))
}

pub fn executor_shell(config: &NodeConfig, context: SigningContext) -> Result<SessionShell> {
    let executor_config = &config.spec.executor;
    let store: Arc<dyn RemoteCommandStore> = match &executor_config.command_store_path {
        Some(path) => Arc::new(
            SledCommandStore::open(path).with_context(|| format!("Failed to open command store at {}", path))?,
        ),
        None => Arc::new(InMemoryCommandStore::new()),
    };
    let files = if executor_config.allowed_roots.is_empty() {
        LocalFileTransfer::new()
    } else {
        LocalFileTransfer::with_allowed_roots(executor_config.allowed_roots.iter().map(PathBuf::from).collect())
    };
    let service = ExecutorService::new(
        config.spec.node.id.clone(),
        Arc::new(ShellExecutor::new()),
        Arc::new(files),
        store,
    )
    .with_timeouts(
        Duration::from_secs(executor_config.default_timeout_secs),
        Duration::from_secs(executor_config.max_timeout_secs),
    );
    Ok(SessionShell::new(context, Arc::new(service)))
}

/// Relay shell: downstream peers from `trusted_peers`, upstream from `spec.relay`.
pub fn relay_shell(config: &NodeConfig, downstream: SigningContext) -> Result<SessionShell> {
    let relay = config
        .spec
        .relay
        .as_ref()
        .context("spec.relay is required to run a relay")?;
    let upstream_key = KeyMaterial::load_peer(&config.spec.signing, &relay.upstream_id)
        .with_context(|| format!("Failed to load key for upstream '{}'", relay.upstream_id))?;
    let upstream_material = KeyMaterial::new(
        downstream.signer.clone(),
        KeyRing::new().with_peer(relay.upstream_id.clone(), upstream_key),
    );
    let upstream_context = signing_context(config, upstream_material);
    let network = &config.spec.network;
    let pool = UpstreamPool::new(
        relay.upstream_address.clone(),
        upstream_context,
        Duration::from_secs(network.connect_timeout_secs),
        Duration::from_secs(network.request_timeout_secs),
        relay.max_idle_connections,
    );
    let service = RelayService::new(downstream.clone(), Arc::new(pool));
    Ok(SessionShell::new(downstream, Arc::new(service)))
}

/// Embedding provider from `spec.cache.embedding`; falls back to offline
/// hash embeddings when the API key is not set.
pub fn embedding_provider(config: &NodeConfig) -> Arc<dyn EmbeddingProvider> {
    let embedding = &config.spec.cache.embedding;
    match HttpEmbeddingClient::from_env(&embedding.endpoint, &embedding.model, &embedding.api_key_env) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!(error = %e, "Embedding API unavailable, using offline hash embeddings");
            Arc::new(HashEmbeddingClient::default())
        }
    }
}

pub fn semantic_cache(config: &NodeConfig) -> Result<StandardSemanticCache> {
    let cache = &config.spec.cache;
    let path = cache.path();
    let repository = SledCacheRepository::open(&path)
        .with_context(|| format!("Failed to open cache at {}", path.display()))?;
    let thresholds = SimilarityThresholds::new(cache.exact_threshold, cache.near_threshold)?;
    Ok(StandardSemanticCache::new(embedding_provider(config), Arc::new(repository)).with_thresholds(thresholds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigrelay_core::domain::identity::MessageSigner;
    use sigrelay_core::domain::node_config::{NodeRole, RelayConfig, TrustedPeer};
    use sigrelay_core::infrastructure::signing::generate_keypair;
    use sigrelay_cortex::SemanticCache;

    fn relay_config(key_dir: &std::path::Path) -> NodeConfig {
        for id in ["client", "relay", "server"] {
            generate_keypair(key_dir, id, false).unwrap();
        }
        let mut config = NodeConfig::default();
        config.spec.node.id = "relay".into();
        config.spec.node.role = NodeRole::Relay;
        config.spec.signing.key_dir = Some(key_dir.display().to_string());
        config.spec.signing.trusted_peers = vec![TrustedPeer::new("client")];
        config.spec.relay = Some(RelayConfig {
            upstream_address: "127.0.0.1:1".into(),
            upstream_id: "server".into(),
            max_idle_connections: 2,
        });
        config
    }

    #[test]
    fn test_load_keys_adds_extra_peers() {
        let dir = tempfile::tempdir().unwrap();
        let config = relay_config(dir.path());

        let material = load_keys(&config, &[]).unwrap();
        assert!(material.known_peers.verifier_for("client").is_some());
        assert!(material.known_peers.verifier_for("server").is_none());

        let material = load_keys(&config, &["server", "client"]).unwrap();
        assert!(material.known_peers.verifier_for("server").is_some());
        assert_eq!(material.signer.sender_id(), "relay");
    }

    #[test]
    fn test_load_keys_fails_for_missing_peer_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = relay_config(dir.path());
        assert!(load_keys(&config, &["stranger"]).is_err());
    }

    #[tokio::test]
    async fn test_relay_shell_requires_relay_section() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = relay_config(dir.path());
        let context = signing_context(&config, load_keys(&config, &[]).unwrap());
        assert!(relay_shell(&config, context.clone()).is_ok());

        config.spec.relay = None;
        assert!(relay_shell(&config, context).is_err());
    }

    #[tokio::test]
    async fn test_semantic_cache_falls_back_to_offline_embeddings() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NodeConfig::default();
        config.spec.cache.path = Some(dir.path().join("cache").display().to_string());
        config.spec.cache.embedding.api_key_env = "SIGRELAY_TEST_UNSET_EMBEDDING_KEY".into();

        let cache = semantic_cache(&config).unwrap();
        let id = cache.store("list files", "ls", "lists files").await.unwrap();
        assert!(matches!(
            cache.lookup("list files").await.unwrap(),
            sigrelay_cortex::LookupOutcome::Hit { id: hit, .. } if hit == id
        ));
    }
}

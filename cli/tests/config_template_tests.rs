use sigrelay_core::domain::identity::SigningScheme;
use sigrelay_core::domain::node_config::{NodeConfig, NodeRole};

#[test]
fn test_minimal_template_is_valid_client_config() {
    let config = NodeConfig::from_yaml_str(include_str!("../templates/config-minimal.yaml")).unwrap();
    config.validate().unwrap();
    assert_eq!(config.spec.node.role, NodeRole::Client);
    assert_eq!(config.spec.remote.id, "relay");
    assert_eq!(config.spec.replay.window_secs, 300);
}

#[test]
fn test_annotated_template_is_valid_relay_config() {
    let config = NodeConfig::from_yaml_str(include_str!("../templates/config-with-examples.yaml")).unwrap();
    config.validate().unwrap();
    assert_eq!(config.spec.node.role, NodeRole::Relay);
    assert_eq!(config.spec.signing.scheme, SigningScheme::Ed25519);
    let relay = config.spec.relay.as_ref().unwrap();
    assert_eq!(relay.upstream_id, "server");
    assert_eq!(relay.max_idle_connections, 4);
    assert_eq!(config.spec.cache.exact_threshold, 0.99);
    assert_eq!(config.spec.cache.near_threshold, 0.85);
}

use crate::config::loader::parse_config;
use crate::config::model::*;
use crate::node::Protocol;
use uuid::Uuid;

fn create_test_node(host: &str, port: u16, weight: u32) -> NodeConfig {
    NodeConfig {
        host: host.to_string(),
        port,
        protocol: Protocol::Tcp,
        tls: false,
        weight,
        id: None,
    }
}

fn create_test_config() -> Config {
    Config {
        nodes: vec![
            create_test_node("10.0.0.1", 8080, 10),
            create_test_node("10.0.0.2", 8080, 5),
        ],
        settings: GlobalSettings::default(),
    }
}

#[test]
fn test_config_validation_success() {
    let config = create_test_config();
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_empty_nodes() {
    let mut config = create_test_config();
    config.nodes.clear();

    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("No nodes configured"));
}

#[test]
fn test_config_validation_empty_host() {
    let mut config = create_test_config();
    config.nodes[1].host = "  ".to_string();

    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("empty host"));
}

#[test]
fn test_config_validation_zero_port() {
    let mut config = create_test_config();
    config.nodes[0].port = 0;

    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("invalid port"));
}

#[test]
fn test_config_validation_duplicate_id() {
    let mut config = create_test_config();
    let id = Uuid::new_v4();
    config.nodes[0].id = Some(id);
    config.nodes[1].id = Some(id);

    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("duplicate id"));
}

#[test]
fn test_config_validation_settings() {
    let mut config = create_test_config();
    config.settings.refresh_interval_ms = 0;
    assert!(config.validate().is_err());

    let mut config = create_test_config();
    config.settings.probe_timeout_ms = 0;
    assert!(config.validate().is_err());

    let mut config = create_test_config();
    config.settings.probe_timeout_ms = 120_000;
    assert!(config.validate().is_err());

    let mut config = create_test_config();
    config.settings.http_probe_path = "health".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_parse_config_with_defaults() {
    let config = parse_config(
        r#"
        [[nodes]]
        host = "10.0.0.1"
        port = 9000
        "#,
    )
    .unwrap();

    assert_eq!(config.nodes.len(), 1);
    let node = &config.nodes[0];
    assert_eq!(node.weight, 1);
    assert_eq!(node.protocol, Protocol::Tcp);
    assert!(!node.tls);
    assert!(node.id.is_none());

    assert_eq!(config.settings.strategy, LoadBalanceStrategy::RoundRobin);
    assert_eq!(config.settings.refresh_interval_ms, 500);
    assert_eq!(config.settings.probe_timeout_ms, 1000);
    assert_eq!(config.settings.http_probe_path, "/");
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_config_full() {
    let config = parse_config(
        r#"
        [settings]
        strategy = "least_connections"
        refresh_interval_ms = 250
        probe_timeout_ms = 100
        http_probe_path = "/healthz"

        [[nodes]]
        host = "api-1.internal"
        port = 443
        protocol = "http"
        tls = true
        weight = 20
        id = "6f1c1ea2-1b8e-4d5c-9b0f-1f7a2f5b9a10"

        [[nodes]]
        host = "api-2.internal"
        port = 8080
        weight = 0
        "#,
    )
    .unwrap();

    assert!(config.validate().is_ok());
    assert_eq!(config.settings.strategy, LoadBalanceStrategy::LeastConnections);
    assert_eq!(config.settings.refresh_interval().as_millis(), 250);
    assert_eq!(config.settings.probe_timeout().as_millis(), 100);

    let nodes = config.build_nodes();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].host(), "api-1.internal");
    assert_eq!(nodes[0].protocol(), Protocol::Http);
    assert!(nodes[0].use_tls());
    assert_eq!(
        nodes[0].id().to_string(),
        "6f1c1ea2-1b8e-4d5c-9b0f-1f7a2f5b9a10"
    );
    assert_eq!(nodes[1].weight(), 0);
}

#[test]
fn test_build_nodes_generates_unique_ids() {
    let config = create_test_config();
    let nodes = config.build_nodes();
    assert_ne!(nodes[0].id(), nodes[1].id());
}

#[test]
fn test_parse_config_unknown_strategy() {
    let result = parse_config(
        r#"
        [settings]
        strategy = "smart_ai"

        [[nodes]]
        host = "10.0.0.1"
        port = 9000
        "#,
    );
    assert!(result.is_err());
}

use crate::node::{Node, NodeId, Protocol};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub settings: GlobalSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GlobalSettings {
    #[serde(default)]
    pub strategy: LoadBalanceStrategy,
    /// 健康检查刷新间隔（毫秒）
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_ms: u64,
    /// 单个节点探测的超时时间（毫秒）
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    /// HTTP探测请求的路径
    #[serde(default = "default_http_probe_path")]
    pub http_probe_path: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            strategy: LoadBalanceStrategy::default(),
            refresh_interval_ms: default_refresh_interval(),
            probe_timeout_ms: default_probe_timeout(),
            http_probe_path: default_http_probe_path(),
        }
    }
}

impl GlobalSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// 单个节点的配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub tls: bool,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// 不填写时自动生成
    #[serde(default)]
    pub id: Option<Uuid>,
}

impl NodeConfig {
    pub fn to_node(&self) -> Node {
        let id = self.id.map(NodeId::from_uuid).unwrap_or_default();
        Node::with_id(id, self.host.clone(), self.port, self.weight)
            .with_protocol(self.protocol)
            .with_tls(self.tls)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// 按权重排序后的顺序轮询
    #[default]
    RoundRobin,
    /// 按权重随机
    WeightedRandom,
    /// 选择当前在途请求最少的节点
    LeastConnections,
    /// 均匀随机
    Random,
    /// 总是选择权重最高的健康节点
    Failover,
}

// Default value functions
fn default_weight() -> u32 {
    1
}

fn default_refresh_interval() -> u64 {
    500
}

fn default_probe_timeout() -> u64 {
    1000
}

fn default_http_probe_path() -> String {
    "/".to_string()
}

const MAX_PROBE_TIMEOUT_MS: u64 = 60_000;

impl Config {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            anyhow::bail!("No nodes configured, at least one node is required");
        }

        let mut seen_ids = HashSet::new();
        for (index, node) in self.nodes.iter().enumerate() {
            self.validate_node_config(index, node)?;

            if let Some(id) = node.id {
                if !seen_ids.insert(id) {
                    anyhow::bail!("Node #{} ({}:{}) has duplicate id '{}'", index, node.host, node.port, id);
                }
            }
        }

        self.validate_settings()
    }

    fn validate_node_config(&self, index: usize, node: &NodeConfig) -> Result<()> {
        if node.host.trim().is_empty() {
            anyhow::bail!("Node #{} has empty host", index);
        }

        if node.port == 0 {
            anyhow::bail!("Node #{} ({}) has invalid port: cannot be 0", index, node.host);
        }

        Ok(())
    }

    fn validate_settings(&self) -> Result<()> {
        let settings = &self.settings;

        if settings.refresh_interval_ms == 0 {
            anyhow::bail!("Invalid refresh_interval_ms: cannot be 0");
        }

        if settings.probe_timeout_ms == 0 {
            anyhow::bail!("Invalid probe_timeout_ms: cannot be 0");
        }

        if settings.probe_timeout_ms > MAX_PROBE_TIMEOUT_MS {
            anyhow::bail!(
                "Invalid probe_timeout_ms: {} exceeds maximum of {}",
                settings.probe_timeout_ms,
                MAX_PROBE_TIMEOUT_MS
            );
        }

        if !settings.http_probe_path.starts_with('/') {
            anyhow::bail!(
                "Invalid http_probe_path '{}': must start with '/'",
                settings.http_probe_path
            );
        }

        Ok(())
    }

    /// 把节点配置转换为节点，保持配置中的顺序
    pub fn build_nodes(&self) -> Vec<Node> {
        self.nodes.iter().map(NodeConfig::to_node).collect()
    }
}

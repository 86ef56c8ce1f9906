use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// 节点唯一标识
///
/// 在同一个节点池的生命周期内保持不变且唯一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// 生成新的随机标识
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 节点使用的协议
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// 纯TCP，探测时只建立连接
    #[default]
    Tcp,
    /// HTTP，探测时发送GET请求
    Http,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Http => write!(f, "http"),
        }
    }
}

/// 后端节点
///
/// 纯数据对象，创建后不会被修改。节点是否可达不记录在节点上，
/// 而是由 Distributor 的健康集合维护。相等性只由 `id` 决定。
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    id: NodeId,
    host: String,
    port: u16,
    protocol: Protocol,
    tls: bool,
    weight: u32,
}

impl Node {
    pub fn new(host: impl Into<String>, port: u16, weight: u32) -> Self {
        Self::with_id(NodeId::new(), host, port, weight)
    }

    pub fn with_id(id: NodeId, host: impl Into<String>, port: u16, weight: u32) -> Self {
        Self {
            id,
            host: host.into(),
            port,
            protocol: Protocol::default(),
            tls: false,
            weight,
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn use_tls(&self) -> bool {
        self.tls
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// `host:port` 形式的地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_equality_uses_id_only() {
        let id = NodeId::new();
        let a = Node::with_id(id, "10.0.0.1", 80, 1);
        let b = Node::with_id(id, "10.0.0.2", 81, 7).with_protocol(Protocol::Http);
        assert_eq!(a, b);

        let c = Node::with_id(NodeId::new(), "10.0.0.1", 80, 1);
        assert_ne!(a, c);
    }

    #[test]
    fn test_node_builder_and_address() {
        let node = Node::new("backend.local", 8443, 5)
            .with_protocol(Protocol::Http)
            .with_tls(true);

        assert_eq!(node.address(), "backend.local:8443");
        assert_eq!(node.protocol(), Protocol::Http);
        assert!(node.use_tls());
        assert_eq!(node.weight(), 5);
        assert_eq!(node.to_string(), "http://backend.local:8443");
    }

    #[test]
    fn test_protocol_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            protocol: Protocol,
        }

        let w: Wrapper = toml::from_str("protocol = \"http\"").unwrap();
        assert_eq!(w.protocol, Protocol::Http);
    }
}

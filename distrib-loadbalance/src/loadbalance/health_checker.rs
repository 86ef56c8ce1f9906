use super::error::ProbeError;
use async_trait::async_trait;
use distrib_core::{GlobalSettings, Node, NodeId, Protocol};
use parking_lot::RwLock;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::debug;

/// 节点可达性探测
///
/// 探测结果只通过返回值告知刷新循环，实现不能修改节点本身。
/// `Ok(false)` 和 `Err(_)` 都会让节点被移出健康集合。
#[async_trait]
pub trait NodeHealthCheck: Send + Sync {
    async fn connect(&self, node: &Node, protocol: Protocol, tls: bool)
        -> Result<bool, ProbeError>;
}

/// TCP连接探测，能建立连接即认为可达
#[derive(Debug, Clone, Default)]
pub struct TcpHealthCheck;

impl TcpHealthCheck {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NodeHealthCheck for TcpHealthCheck {
    async fn connect(
        &self,
        node: &Node,
        _protocol: Protocol,
        _tls: bool,
    ) -> Result<bool, ProbeError> {
        let start_time = Instant::now();
        let stream = TcpStream::connect((node.host(), node.port())).await?;
        drop(stream);

        debug!(
            "TCP probe to {} succeeded in {}ms",
            node.address(),
            start_time.elapsed().as_millis()
        );
        Ok(true)
    }
}

/// HTTP探测，对 `path` 发送GET请求，2xx 视为可达
#[derive(Debug, Clone)]
pub struct HttpHealthCheck {
    client: Client,
    path: String,
}

impl HttpHealthCheck {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder().timeout(timeout).no_proxy().build()?;
        Ok(Self {
            client,
            path: path.into(),
        })
    }

    fn probe_url(&self, node: &Node, tls: bool) -> String {
        let scheme = if tls { "https" } else { "http" };
        format!("{}://{}{}", scheme, node.address(), self.path)
    }
}

#[async_trait]
impl NodeHealthCheck for HttpHealthCheck {
    async fn connect(
        &self,
        node: &Node,
        _protocol: Protocol,
        tls: bool,
    ) -> Result<bool, ProbeError> {
        let start_time = Instant::now();
        let url = self.probe_url(node, tls);
        debug!("Sending HTTP probe to {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        debug!(
            "Received probe response from {} with status: {} ({}ms)",
            node.address(),
            status,
            start_time.elapsed().as_millis()
        );

        if status.is_success() {
            Ok(true)
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}

/// 按节点协议分派的探测：`Http` 走HTTP探测，`Tcp` 走TCP探测
#[derive(Debug, Clone)]
pub struct ProtocolHealthCheck {
    tcp: TcpHealthCheck,
    http: HttpHealthCheck,
}

impl ProtocolHealthCheck {
    pub fn new(http_probe_path: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        Ok(Self {
            tcp: TcpHealthCheck::new(),
            http: HttpHealthCheck::new(http_probe_path, timeout)?,
        })
    }

    pub fn from_settings(settings: &GlobalSettings) -> Result<Self, ProbeError> {
        Self::new(settings.http_probe_path.clone(), settings.probe_timeout())
    }
}

#[async_trait]
impl NodeHealthCheck for ProtocolHealthCheck {
    async fn connect(
        &self,
        node: &Node,
        protocol: Protocol,
        tls: bool,
    ) -> Result<bool, ProbeError> {
        match protocol {
            Protocol::Tcp => self.tcp.connect(node, protocol, tls).await,
            Protocol::Http => self.http.connect(node, protocol, tls).await,
        }
    }
}

/// 手动控制的探测结果
///
/// 不做任何网络访问，节点默认可达，可以按节点覆盖结果。
/// 适用于不需要主动探测的静态部署，也用于测试。
#[derive(Debug)]
pub struct ManualHealthCheck {
    overrides: RwLock<HashMap<NodeId, bool>>,
    default_reachable: AtomicBool,
    probes: AtomicUsize,
}

impl ManualHealthCheck {
    pub fn new() -> Self {
        Self {
            overrides: RwLock::new(HashMap::new()),
            default_reachable: AtomicBool::new(true),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn set_reachable(&self, id: NodeId, reachable: bool) {
        self.overrides.write().insert(id, reachable);
    }

    /// 清空覆盖并设置所有节点的结果
    pub fn set_all_reachable(&self, reachable: bool) {
        self.overrides.write().clear();
        self.default_reachable.store(reachable, Ordering::SeqCst);
    }

    /// 已执行的探测次数
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl Default for ManualHealthCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHealthCheck for ManualHealthCheck {
    async fn connect(
        &self,
        node: &Node,
        _protocol: Protocol,
        _tls: bool,
    ) -> Result<bool, ProbeError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let reachable = self
            .overrides
            .read()
            .get(&node.id())
            .copied()
            .unwrap_or_else(|| self.default_reachable.load(Ordering::SeqCst));
        Ok(reachable)
    }
}

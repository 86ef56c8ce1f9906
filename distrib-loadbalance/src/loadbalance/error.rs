use distrib_core::NodeId;
use std::time::Duration;
use thiserror::Error;

/// 负载均衡错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadBalanceError {
    /// 节点池为空，或一次完整的健康检查后没有任何可达节点。属于配置级别的致命错误
    #[error("Must be at least one reachable node in the pool")]
    EmptyPool,
    /// 选择时健康集合为空，调用方可以稍后重试
    #[error("No healthy node available (strategy: {strategy})")]
    NoHealthyNode { strategy: &'static str },
    #[error("Duplicate node id in pool: {0}")]
    DuplicateNode(NodeId),
    #[error("Node selection failed: {0}")]
    Strategy(String),
    /// 刷新间隔和探测超时必须大于0
    #[error("Invalid distributor settings: {0}")]
    InvalidSettings(String),
    /// 刷新任务需要在tokio运行时中创建
    #[error("No tokio runtime available for the refresh task: {0}")]
    Runtime(String),
}

impl LoadBalanceError {
    /// 是否为进程级别的致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EmptyPool | Self::DuplicateNode(_) | Self::InvalidSettings(_) | Self::Runtime(_)
        )
    }
}

/// 单个节点探测失败的原因，只在刷新循环内部处理
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("connect failed: {0}")]
    Connect(#[from] std::io::Error),
    #[error("HTTP probe failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP probe returned status {0}")]
    Status(u16),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

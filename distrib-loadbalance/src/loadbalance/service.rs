use super::distributor::{Distributor, DistributorSettings, DistributorState, NodeStat};
use super::error::LoadBalanceError;
use super::health_checker::{NodeHealthCheck, ProtocolHealthCheck};
use super::selector::build_strategy;
use anyhow::Result;
use distrib_core::{Config, Node};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// 负载均衡服务
///
/// 持有当前的 Distributor，并负责重建时的交接：先创建新实例，替换后再停止旧实例，
/// 保证任意时刻只有一个刷新任务在运行。
pub struct LoadBalanceService {
    current: RwLock<Arc<Distributor>>,
}

impl LoadBalanceService {
    pub fn new(distributor: Distributor) -> Self {
        Self {
            current: RwLock::new(Arc::new(distributor)),
        }
    }

    /// 根据配置创建服务
    pub fn from_config(config: &Config, health_check: Arc<dyn NodeHealthCheck>) -> Result<Self> {
        // 验证配置
        config.validate()?;

        let distributor = Distributor::new(
            config.build_nodes(),
            build_strategy(config.settings.strategy),
            health_check,
            DistributorSettings::from(&config.settings),
        )?;

        Ok(Self::new(distributor))
    }

    /// 使用按协议分派的默认健康检查创建服务
    pub fn from_config_with_default_checks(config: &Config) -> Result<Self> {
        let health_check = Arc::new(ProtocolHealthCheck::from_settings(&config.settings)?);
        Self::from_config(config, health_check)
    }

    /// 当前使用的 Distributor
    pub fn distributor(&self) -> Arc<Distributor> {
        self.current.read().clone()
    }

    pub fn pick(&self) -> Result<Node, LoadBalanceError> {
        self.distributor().pick()
    }

    pub fn release(&self, node: &Node) {
        self.distributor().release(node);
    }

    pub fn node_stats(&self) -> Vec<NodeStat> {
        self.distributor().node_stats()
    }

    pub fn health_summary(&self) -> HealthSummary {
        let distributor = self.distributor();
        let healthy_nodes = distributor.ok_nodes().len();
        let total_nodes = distributor.pool().len();

        HealthSummary {
            healthy_nodes,
            total_nodes,
            health_ratio: if total_nodes > 0 {
                healthy_nodes as f64 / total_nodes as f64
            } else {
                0.0
            },
            state: distributor.state(),
        }
    }

    /// 用新的节点列表替换当前节点池
    ///
    /// 新实例创建失败时保留当前实例不变。
    pub fn replace_nodes(&self, nodes: Vec<Node>) -> Result<(), LoadBalanceError> {
        let replacement = Arc::new(self.distributor().rebuild_with(nodes)?);
        let previous = std::mem::replace(&mut *self.current.write(), replacement);
        previous.stop();

        info!(
            "Replaced node pool: {} -> {} nodes",
            previous.pool().len(),
            self.distributor().pool().len()
        );
        Ok(())
    }

    pub fn stop(&self) {
        self.distributor().stop();
    }
}

/// 节点池健康状态汇总
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthSummary {
    pub healthy_nodes: usize,
    pub total_nodes: usize,
    pub health_ratio: f64,
    pub state: DistributorState,
}

impl HealthSummary {
    pub fn is_healthy(&self) -> bool {
        self.healthy_nodes > 0 && self.state != DistributorState::Failed
    }

    pub fn is_fully_healthy(&self) -> bool {
        self.total_nodes > 0 && self.healthy_nodes == self.total_nodes
    }
}

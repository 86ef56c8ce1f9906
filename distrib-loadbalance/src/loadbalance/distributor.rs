use super::error::{LoadBalanceError, ProbeError};
use super::health_checker::NodeHealthCheck;
use super::selector::SelectionStrategy;
use distrib_core::{GlobalSettings, Node, NodeId};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Distributor 的运行参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributorSettings {
    /// 两次健康检查之间的间隔
    pub refresh_interval: Duration,
    /// 单个节点探测的超时时间，超时视为不可达
    pub probe_timeout: Duration,
}

impl Default for DistributorSettings {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl From<&GlobalSettings> for DistributorSettings {
    fn from(settings: &GlobalSettings) -> Self {
        Self {
            refresh_interval: settings.refresh_interval(),
            probe_timeout: settings.probe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributorState {
    /// 定时健康检查正在运行
    Running,
    /// 已调用 `stop()`，不再探测，仍可使用最后一次的健康集合选择节点
    Stopped,
    /// 某次健康检查后没有任何可达节点，刷新已终止
    Failed,
}

/// 节点状态快照，仅用于观测
#[derive(Debug, Clone, Serialize)]
pub struct NodeStat {
    pub node: Node,
    pub healthy: bool,
    pub used_for_routing: bool,
}

/// 刷新任务与 Distributor 共享的状态
struct PoolState {
    pool: Arc<[Node]>,
    ok_nodes: RwLock<HashMap<NodeId, Node>>,
    health_check: Arc<dyn NodeHealthCheck>,
    probe_timeout: Duration,
    state: watch::Sender<DistributorState>,
    /// 同一时刻只允许一次健康检查写入健康集合
    sweep_lock: Mutex<()>,
}

impl PoolState {
    /// 按池顺序探测每个节点并更新健康集合
    async fn sweep(&self) -> Result<(), LoadBalanceError> {
        let _guard = self.sweep_lock.lock().await;
        debug!("Starting health check sweep for {} nodes", self.pool.len());

        for node in self.pool.iter() {
            let reachable = match self.probe(node).await {
                Ok(reachable) => reachable,
                Err(e) => {
                    debug!("Probe failed for node {}: {}", node.address(), e);
                    false
                }
            };

            if reachable {
                let mut ok_nodes = self.ok_nodes.write();
                if !ok_nodes.contains_key(&node.id()) {
                    info!("Node is reachable again: {}", node.address());
                    ok_nodes.insert(node.id(), node.clone());
                }
            } else {
                warn!("Node is unreachable: {}:{}", node.host(), node.port());
                self.ok_nodes.write().remove(&node.id());
            }
        }

        let healthy = self.ok_nodes.read().len();
        if healthy == 0 {
            return Err(LoadBalanceError::EmptyPool);
        }

        debug!(
            "Completed health check sweep: {}/{} nodes healthy",
            healthy,
            self.pool.len()
        );
        Ok(())
    }

    async fn probe(&self, node: &Node) -> Result<bool, ProbeError> {
        let probe = self
            .health_check
            .connect(node, node.protocol(), node.use_tls());

        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.probe_timeout)),
        }
    }

    fn mark_failed(&self) {
        self.state.send_replace(DistributorState::Failed);
    }
}

/// 客户端负载均衡器
///
/// 持有按权重降序排列的不可变节点池、并发更新的健康集合，以及一个定时刷新任务。
/// 创建时乐观地认为所有节点可达，第一次刷新在一个 `refresh_interval` 之后执行。
///
/// 节点池创建后不会再改变。拓扑变化时通过 [`Distributor::rebuild_with`] 创建新实例，
/// 旧实例需要由调用方 [`Distributor::stop`]，否则会有两个刷新任务同时运行；
/// 旧实例被 drop 时也会停止刷新。
pub struct Distributor {
    shared: Arc<PoolState>,
    strategy: Arc<dyn SelectionStrategy>,
    settings: DistributorSettings,
    cancel: CancellationToken,
}

impl Distributor {
    /// 创建新的 Distributor 并启动定时刷新
    ///
    /// 必须在tokio运行时中调用。
    pub fn new(
        pool: Vec<Node>,
        strategy: Arc<dyn SelectionStrategy>,
        health_check: Arc<dyn NodeHealthCheck>,
        settings: DistributorSettings,
    ) -> Result<Self, LoadBalanceError> {
        if pool.is_empty() {
            return Err(LoadBalanceError::EmptyPool);
        }

        let mut seen = HashSet::with_capacity(pool.len());
        for node in &pool {
            if !seen.insert(node.id()) {
                return Err(LoadBalanceError::DuplicateNode(node.id()));
            }
        }

        if settings.refresh_interval.is_zero() {
            return Err(LoadBalanceError::InvalidSettings(
                "refresh_interval must be greater than 0".to_string(),
            ));
        }
        if settings.probe_timeout.is_zero() {
            return Err(LoadBalanceError::InvalidSettings(
                "probe_timeout must be greater than 0".to_string(),
            ));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LoadBalanceError::Runtime(e.to_string()))?;

        // 稳定排序，相同权重保持原有顺序
        let mut pool = pool;
        pool.sort_by(|a, b| b.weight().cmp(&a.weight()));
        let pool: Arc<[Node]> = pool.into();

        // 第一次健康检查之前假定所有节点可达
        let ok_nodes = pool
            .iter()
            .map(|node| (node.id(), node.clone()))
            .collect::<HashMap<_, _>>();

        let (state, _) = watch::channel(DistributorState::Running);
        let shared = Arc::new(PoolState {
            pool,
            ok_nodes: RwLock::new(ok_nodes),
            health_check,
            probe_timeout: settings.probe_timeout,
            state,
            sweep_lock: Mutex::new(()),
        });

        let cancel = CancellationToken::new();
        runtime.spawn(run_refresh_loop(
            shared.clone(),
            settings.refresh_interval,
            cancel.clone(),
        ));

        info!(
            "Distributor started with {} nodes, strategy: {}, refresh interval: {:?}",
            shared.pool.len(),
            strategy.name(),
            settings.refresh_interval
        );

        Ok(Self {
            shared,
            strategy,
            settings,
            cancel,
        })
    }

    /// 选择下一个节点
    ///
    /// 只在内存中的健康集合上做决定，不会进行网络I/O。
    /// 健康集合为空时返回 [`LoadBalanceError::NoHealthyNode`]。
    pub fn pick(&self) -> Result<Node, LoadBalanceError> {
        let ok_nodes = self.shared.ok_nodes.read();
        self.strategy.next_node(&self.shared.pool, &ok_nodes)
    }

    /// 请求结束后通知策略（最少连接策略依赖它）
    pub fn release(&self, node: &Node) {
        self.strategy.release(node);
    }

    /// 按id查找节点，只在健康集合中查找
    ///
    /// 在池中但当前不健康的节点返回 `None`
    pub fn get_node_by_id(&self, id: &NodeId) -> Option<Node> {
        self.shared.ok_nodes.read().get(id).cloned()
    }

    /// 按权重降序排列的完整节点池
    pub fn pool(&self) -> &[Node] {
        &self.shared.pool
    }

    /// 当前健康集合的快照
    pub fn ok_nodes(&self) -> HashMap<NodeId, Node> {
        self.shared.ok_nodes.read().clone()
    }

    /// 各节点状态，按池顺序
    ///
    /// 没有任何健康节点满足 `ok_to_pick` 时，健康的备用节点也会参与选择，
    /// 此时它们的 `used_for_routing` 为 `true`。
    pub fn node_stats(&self) -> Vec<NodeStat> {
        let ok_nodes = self.shared.ok_nodes.read();
        let standby_in_use = !ok_nodes.values().any(|node| self.strategy.ok_to_pick(node));

        self.shared
            .pool
            .iter()
            .map(|node| {
                let healthy = ok_nodes.contains_key(&node.id());
                NodeStat {
                    node: node.clone(),
                    healthy,
                    used_for_routing: self.strategy.ok_to_pick(node)
                        || (healthy && standby_in_use),
                }
            })
            .collect()
    }

    /// 使用相同的节点列表重建
    pub fn rebuild(&self) -> Result<Distributor, LoadBalanceError> {
        self.rebuild_with(self.shared.pool.to_vec())
    }

    /// 使用新的节点列表重建
    ///
    /// 返回的新实例共享策略和健康检查，拥有独立的健康集合和刷新任务。
    /// 不会停止当前实例，调用方负责对被替换的实例调用 [`Distributor::stop`]。
    pub fn rebuild_with(&self, pool: Vec<Node>) -> Result<Distributor, LoadBalanceError> {
        Distributor::new(
            pool,
            self.strategy.clone(),
            self.shared.health_check.clone(),
            self.settings,
        )
    }

    /// 立即执行一次完整的健康检查
    ///
    /// 检查后没有可达节点时返回 [`LoadBalanceError::EmptyPool`]，并停止定时刷新。
    pub async fn refresh_now(&self) -> Result<(), LoadBalanceError> {
        let result = self.shared.sweep().await;
        if let Err(e) = &result {
            error!("Node pool refresh failed: {}", e);
            self.cancel.cancel();
            self.shared.mark_failed();
        }
        result
    }

    /// 停止定时刷新，可以重复调用
    ///
    /// 正在进行的健康检查会继续完成，如果它清空了健康集合，状态仍会变为 `Failed`。
    /// 停止后 `pick()` 仍然基于最后的健康集合工作。
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.shared.state.send_if_modified(|state| {
            if *state == DistributorState::Running {
                *state = DistributorState::Stopped;
                true
            } else {
                false
            }
        });
        info!("Distributor stopped");
    }

    pub fn state(&self) -> DistributorState {
        *self.shared.state.borrow()
    }

    /// 订阅状态变化，用于在进程级别处理 [`DistributorState::Failed`]
    pub fn subscribe_state(&self) -> watch::Receiver<DistributorState> {
        self.shared.state.subscribe()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn settings(&self) -> DistributorSettings {
        self.settings
    }
}

impl Drop for Distributor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Distributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distributor")
            .field("pool", &self.shared.pool)
            .field("healthy", &self.shared.ok_nodes.read().len())
            .field("strategy", &self.strategy.name())
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish()
    }
}

async fn run_refresh_loop(
    shared: Arc<PoolState>,
    refresh_interval: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + refresh_interval, refresh_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Refresh loop cancelled");
                break;
            }
            _ = interval.tick() => {}
        }

        // 已经开始的检查不会被取消打断，即使期间被停止也要上报失败
        if let Err(e) = shared.sweep().await {
            error!("Node pool refresh failed: {}", e);
            shared.mark_failed();
            cancel.cancel();
            break;
        }
    }
}

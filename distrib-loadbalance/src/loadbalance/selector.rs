use super::error::LoadBalanceError;
use distrib_core::{LoadBalanceStrategy, Node, NodeId};
use parking_lot::Mutex;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 节点选择策略
///
/// 给定完整的节点池（已按权重降序排列）和当前健康集合，返回下一个要使用的节点。
/// 实现内部的游标、计数器等状态必须能承受并发的 `next_node` 调用。
pub trait SelectionStrategy: Send + Sync {
    /// 策略名称，用于日志和错误信息
    fn name(&self) -> &'static str;

    /// 选择下一个节点
    ///
    /// 只会返回 `healthy` 中存在的节点；`healthy` 为空时返回
    /// [`LoadBalanceError::NoHealthyNode`]。
    fn next_node(
        &self,
        pool: &[Node],
        healthy: &HashMap<NodeId, Node>,
    ) -> Result<Node, LoadBalanceError>;

    /// 节点在该策略下是否有资格被选中，仅用于状态上报，不能有副作用
    fn ok_to_pick(&self, node: &Node) -> bool {
        node.weight() > 0
    }

    /// 通知策略一次请求已经结束
    fn release(&self, _node: &Node) {}
}

/// 根据配置创建策略实例
pub fn build_strategy(strategy: LoadBalanceStrategy) -> Arc<dyn SelectionStrategy> {
    match strategy {
        LoadBalanceStrategy::RoundRobin => Arc::new(RoundRobinStrategy::new()),
        LoadBalanceStrategy::WeightedRandom => Arc::new(WeightedRandomStrategy::new()),
        LoadBalanceStrategy::LeastConnections => Arc::new(LeastConnectionsStrategy::new()),
        LoadBalanceStrategy::Random => Arc::new(RandomStrategy::new()),
        LoadBalanceStrategy::Failover => Arc::new(FailoverStrategy::new()),
    }
}

/// 按池顺序收集可选节点
///
/// 权重为0的节点只有在所有健康节点权重都为0时才可选
fn eligible_nodes<'a>(pool: &'a [Node], healthy: &HashMap<NodeId, Node>) -> Vec<&'a Node> {
    let healthy_nodes: Vec<&Node> = pool
        .iter()
        .filter(|node| healthy.contains_key(&node.id()))
        .collect();

    if healthy_nodes.iter().any(|node| node.weight() > 0) {
        healthy_nodes
            .into_iter()
            .filter(|node| node.weight() > 0)
            .collect()
    } else {
        healthy_nodes
    }
}

fn candidates<'a>(
    strategy: &dyn SelectionStrategy,
    pool: &'a [Node],
    healthy: &HashMap<NodeId, Node>,
) -> Result<Vec<&'a Node>, LoadBalanceError> {
    let eligible = eligible_nodes(pool, healthy);
    if eligible.is_empty() {
        return Err(LoadBalanceError::NoHealthyNode {
            strategy: strategy.name(),
        });
    }
    Ok(eligible)
}

/// 轮询
///
/// 在可选节点之间按池顺序循环，池顺序即权重降序
#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    counter: AtomicUsize,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for RoundRobinStrategy {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn next_node(
        &self,
        pool: &[Node],
        healthy: &HashMap<NodeId, Node>,
    ) -> Result<Node, LoadBalanceError> {
        let eligible = candidates(self, pool, healthy)?;
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % eligible.len();
        Ok(eligible[index].clone())
    }
}

/// 按权重随机
#[derive(Debug, Default)]
pub struct WeightedRandomStrategy;

impl WeightedRandomStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for WeightedRandomStrategy {
    fn name(&self) -> &'static str {
        "weighted_random"
    }

    fn next_node(
        &self,
        pool: &[Node],
        healthy: &HashMap<NodeId, Node>,
    ) -> Result<Node, LoadBalanceError> {
        let eligible = candidates(self, pool, healthy)?;
        let mut rng = rand::rng();

        // 只剩权重为0的节点时退化为均匀随机
        if eligible.iter().all(|node| node.weight() == 0) {
            let index = rng.random_range(0..eligible.len());
            return Ok(eligible[index].clone());
        }

        // 按u64累加，多个大权重节点之和不会溢出
        let weights: Vec<u64> = eligible.iter().map(|node| u64::from(node.weight())).collect();
        let dist = WeightedIndex::new(&weights)
            .map_err(|e| LoadBalanceError::Strategy(e.to_string()))?;
        Ok(eligible[dist.sample(&mut rng)].clone())
    }
}

/// 最少连接
///
/// 选择在途请求最少的节点（相同则取池中靠前者）并计数加一，
/// 请求结束后需要调用 [`SelectionStrategy::release`]。
#[derive(Debug, Default)]
pub struct LeastConnectionsStrategy {
    in_flight: Mutex<HashMap<NodeId, usize>>,
}

impl LeastConnectionsStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// 节点当前的在途请求数
    pub fn in_flight(&self, node: &Node) -> usize {
        self.in_flight.lock().get(&node.id()).copied().unwrap_or(0)
    }
}

impl SelectionStrategy for LeastConnectionsStrategy {
    fn name(&self) -> &'static str {
        "least_connections"
    }

    fn next_node(
        &self,
        pool: &[Node],
        healthy: &HashMap<NodeId, Node>,
    ) -> Result<Node, LoadBalanceError> {
        let eligible = candidates(self, pool, healthy)?;

        let mut in_flight = self.in_flight.lock();
        let mut best = eligible[0];
        let mut best_count = in_flight.get(&best.id()).copied().unwrap_or(0);
        for node in eligible.iter().copied().skip(1) {
            let count = in_flight.get(&node.id()).copied().unwrap_or(0);
            if count < best_count {
                best = node;
                best_count = count;
            }
        }

        *in_flight.entry(best.id()).or_insert(0) += 1;
        Ok(best.clone())
    }

    fn release(&self, node: &Node) {
        let mut in_flight = self.in_flight.lock();
        if let Some(count) = in_flight.get_mut(&node.id()) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                in_flight.remove(&node.id());
            }
        }
    }
}

/// 均匀随机
#[derive(Debug, Default)]
pub struct RandomStrategy;

impl RandomStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for RandomStrategy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn next_node(
        &self,
        pool: &[Node],
        healthy: &HashMap<NodeId, Node>,
    ) -> Result<Node, LoadBalanceError> {
        let eligible = candidates(self, pool, healthy)?;
        let index = rand::rng().random_range(0..eligible.len());
        Ok(eligible[index].clone())
    }
}

/// 故障转移：总是选择池中第一个可选的健康节点
#[derive(Debug, Default)]
pub struct FailoverStrategy;

impl FailoverStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for FailoverStrategy {
    fn name(&self) -> &'static str {
        "failover"
    }

    fn next_node(
        &self,
        pool: &[Node],
        healthy: &HashMap<NodeId, Node>,
    ) -> Result<Node, LoadBalanceError> {
        let eligible = candidates(self, pool, healthy)?;
        tracing::trace!("Failover selected {}", eligible[0].address());
        Ok(eligible[0].clone())
    }
}

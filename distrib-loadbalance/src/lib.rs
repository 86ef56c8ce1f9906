//! Distrib Load Balance Library
//!
//! This library provides client-side load balancing for a pool of backend nodes including:
//! - Node selection strategies
//! - Node health checking
//! - The `Distributor`, which keeps the healthy set fresh in the background
//! - Pool replacement through `LoadBalanceService`

pub mod loadbalance;

// Re-export commonly used types
pub use loadbalance::{
    build_strategy, Distributor, DistributorSettings, DistributorState, FailoverStrategy,
    HealthSummary, HttpHealthCheck, LeastConnectionsStrategy, LoadBalanceError,
    LoadBalanceService, ManualHealthCheck, NodeHealthCheck, NodeStat, ProbeError,
    ProtocolHealthCheck, RandomStrategy, RoundRobinStrategy, SelectionStrategy, TcpHealthCheck,
    WeightedRandomStrategy,
};

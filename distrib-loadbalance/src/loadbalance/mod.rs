pub mod distributor;
pub mod error;
pub mod health_checker;
pub mod selector;
pub mod service;


pub use distributor::{
    Distributor, DistributorSettings, DistributorState, NodeStat, DEFAULT_PROBE_TIMEOUT,
    DEFAULT_REFRESH_INTERVAL,
};
pub use error::{LoadBalanceError, ProbeError};
pub use health_checker::{
    HttpHealthCheck, ManualHealthCheck, NodeHealthCheck, ProtocolHealthCheck, TcpHealthCheck,
};
pub use selector::{
    build_strategy, FailoverStrategy, LeastConnectionsStrategy, RandomStrategy,
    RoundRobinStrategy, SelectionStrategy, WeightedRandomStrategy,
};
pub use service::{HealthSummary, LoadBalanceService};

//! Distrib Core Library
//!
//! This library provides core functionality for the Distrib load balancer including:
//! - Node data model
//! - Configuration management

pub mod config;
pub mod node;

// Re-export commonly used types
pub use config::model::{Config, GlobalSettings, LoadBalanceStrategy, NodeConfig};
pub use node::{Node, NodeId, Protocol};

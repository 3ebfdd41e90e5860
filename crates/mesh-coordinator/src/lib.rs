//! mesh-coordinator: end-to-end workflow orchestration
//!
//! Drives one workflow execution through three phases (discovery, graph
//! execution, tool settlement), assembles the final envelope, and
//! maintains rolling health and performance metrics.

pub mod coordinator;
pub mod health;
pub mod metrics;

pub use coordinator::{WorkflowCoordinator, WorkflowPhase};
pub use health::{BridgeHealth, OverallStatus, ProtocolHealth, SystemHealthStatus};
pub use metrics::{MetricsAccumulator, RollingMetrics};

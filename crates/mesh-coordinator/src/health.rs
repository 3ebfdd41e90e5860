//! System health aggregation
//!
//! Health is assembled from independent boolean checks per protocol and
//! per bridge; no check depends on another.

use crate::metrics::RollingMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall system status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Per-protocol health booleans
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProtocolHealth {
    /// At least one agent is online
    pub adp: bool,
    /// The graph engine exposes a configuration object
    pub wgp: bool,
    /// TIP's own health check reports healthy
    pub tip: bool,
}

impl ProtocolHealth {
    fn healthy_count(&self) -> usize {
        [self.adp, self.wgp, self.tip]
            .iter()
            .filter(|&&healthy| healthy)
            .count()
    }
}

/// Per-bridge health booleans
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BridgeHealth {
    pub discovery: bool,
    pub tools: bool,
}

/// JSON-serializable health snapshot for dashboard consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealthStatus {
    pub status: OverallStatus,
    pub protocols: ProtocolHealth,
    pub bridges: BridgeHealth,
    pub metrics: RollingMetrics,
    pub checked_at: DateTime<Utc>,
}

impl SystemHealthStatus {
    /// Fold independent checks into the overall status.
    ///
    /// `healthy` requires all three protocols and both bridges;
    /// `degraded` requires at least two healthy protocols.
    pub fn assemble(
        protocols: ProtocolHealth,
        bridges: BridgeHealth,
        metrics: RollingMetrics,
    ) -> Self {
        let healthy_protocols = protocols.healthy_count();

        let status = if healthy_protocols == 3 && bridges.discovery && bridges.tools {
            OverallStatus::Healthy
        } else if healthy_protocols >= 2 {
            OverallStatus::Degraded
        } else {
            OverallStatus::Unhealthy
        };

        Self {
            status,
            protocols,
            bridges,
            metrics,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridges_up() -> BridgeHealth {
        BridgeHealth {
            discovery: true,
            tools: true,
        }
    }

    #[test]
    fn test_all_healthy() {
        let status = SystemHealthStatus::assemble(
            ProtocolHealth {
                adp: true,
                wgp: true,
                tip: true,
            },
            bridges_up(),
            RollingMetrics::default(),
        );
        assert_eq!(status.status, OverallStatus::Healthy);
    }

    #[test]
    fn test_one_protocol_down_is_degraded() {
        let status = SystemHealthStatus::assemble(
            ProtocolHealth {
                adp: true,
                wgp: true,
                tip: false,
            },
            bridges_up(),
            RollingMetrics::default(),
        );
        assert_eq!(status.status, OverallStatus::Degraded);
    }

    #[test]
    fn test_bridge_down_blocks_healthy() {
        let status = SystemHealthStatus::assemble(
            ProtocolHealth {
                adp: true,
                wgp: true,
                tip: true,
            },
            BridgeHealth {
                discovery: true,
                tools: false,
            },
            RollingMetrics::default(),
        );
        // Protocols are fine, so the system degrades rather than failing.
        assert_eq!(status.status, OverallStatus::Degraded);
    }

    #[test]
    fn test_two_protocols_down_is_unhealthy() {
        let status = SystemHealthStatus::assemble(
            ProtocolHealth {
                adp: false,
                wgp: true,
                tip: false,
            },
            bridges_up(),
            RollingMetrics::default(),
        );
        assert_eq!(status.status, OverallStatus::Unhealthy);
    }
}

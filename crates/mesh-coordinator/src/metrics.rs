//! Workflow metrics accumulator
//!
//! One explicit accumulator owned by the coordinator, updated only at
//! phase boundaries. Records are written once per workflow run and never
//! updated afterwards; the table is bounded with oldest-first eviction.

use mesh_core::WorkflowMetricsRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Rolling summary over the retained metrics window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollingMetrics {
    pub total_workflows: usize,
    pub successful_workflows: usize,
    pub success_rate: f64,
    pub avg_execution_time_ms: f64,
    pub total_handoffs: usize,
    pub total_tools_executed: usize,
}

#[derive(Default)]
struct MetricsTable {
    order: VecDeque<String>,
    by_id: HashMap<String, WorkflowMetricsRecord>,
}

/// Bounded in-memory table of per-workflow records
pub struct MetricsAccumulator {
    capacity: usize,
    table: RwLock<MetricsTable>,
}

impl MetricsAccumulator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            table: RwLock::new(MetricsTable::default()),
        }
    }

    /// Record one completed workflow run
    pub async fn record(&self, record: WorkflowMetricsRecord) {
        let mut table = self.table.write().await;

        if !table.by_id.contains_key(&record.workflow_id) {
            table.order.push_back(record.workflow_id.clone());
        }
        table.by_id.insert(record.workflow_id.clone(), record);

        while table.order.len() > self.capacity {
            if let Some(evicted) = table.order.pop_front() {
                table.by_id.remove(&evicted);
            }
        }
    }

    /// Fetch the record for a workflow, if still retained
    pub async fn get(&self, workflow_id: &str) -> Option<WorkflowMetricsRecord> {
        self.table.read().await.by_id.get(workflow_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.order.is_empty()
    }

    /// Summarize the retained window
    pub async fn rolling(&self) -> RollingMetrics {
        let table = self.table.read().await;
        let total = table.by_id.len();
        if total == 0 {
            return RollingMetrics::default();
        }

        let successful = table.by_id.values().filter(|r| r.success).count();
        let duration_sum: u64 = table
            .by_id
            .values()
            .map(|r| r.total_execution_time_ms)
            .sum();
        let handoffs: usize = table.by_id.values().map(|r| r.handoffs).sum();
        let tools: usize = table.by_id.values().map(|r| r.tools_executed.len()).sum();

        RollingMetrics {
            total_workflows: total,
            successful_workflows: successful,
            success_rate: successful as f64 / total as f64,
            avg_execution_time_ms: duration_sum as f64 / total as f64,
            total_handoffs: handoffs,
            total_tools_executed: tools,
        }
    }
}

//! Workflow coordinator - three-phase execution over the protocol bridges
//!
//! Per workflow the state machine is
//! `Discovery -> GraphExecution -> ToolSettlement -> {Completed | Failed}`.
//! There is no paused or cancelled state at this layer; a failed phase
//! moves the workflow straight to Failed and skips the remaining phases.

use crate::health::{BridgeHealth, ProtocolHealth, SystemHealthStatus};
use crate::metrics::MetricsAccumulator;
use mesh_core::{
    AdpClient, DiscoveryRequirements, Error, MeshConfig, Notification, NotificationBus,
    PhaseTimings, Protocol, Result, TipClient, WgpClient, WorkflowExecutionResult,
    WorkflowMetadata, WorkflowMetricsRecord,
};
use mesh_discovery::{DiscoveryBridge, HandoffAnalytics};
use mesh_tools::ToolBridge;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Coordinator-level workflow phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Discovery,
    GraphExecution,
    ToolSettlement,
    Completed,
    Failed,
}

/// Orchestrator bridging ADP discovery, WGP graph execution and TIP tools
pub struct WorkflowCoordinator {
    config: MeshConfig,
    adp: Arc<dyn AdpClient>,
    wgp: Arc<dyn WgpClient>,
    tip: Arc<dyn TipClient>,
    discovery: Arc<DiscoveryBridge>,
    tools: Arc<ToolBridge>,
    metrics: MetricsAccumulator,
    bus: NotificationBus,
    shutdown: watch::Sender<bool>,
    refresh_task: RwLock<Option<JoinHandle<()>>>,
    initialized: AtomicBool,
}

impl WorkflowCoordinator {
    pub fn new(
        config: MeshConfig,
        adp: Arc<dyn AdpClient>,
        wgp: Arc<dyn WgpClient>,
        tip: Arc<dyn TipClient>,
    ) -> Self {
        let bus = NotificationBus::default();
        let discovery = Arc::new(DiscoveryBridge::new(
            adp.clone(),
            config.discovery.clone(),
            bus.clone(),
        ));
        let tools = Arc::new(ToolBridge::new(
            tip.clone(),
            config.tools.clone(),
            bus.clone(),
        ));
        let metrics = MetricsAccumulator::new(config.coordinator.metrics_capacity);
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            adp,
            wgp,
            tip,
            discovery,
            tools,
            metrics,
            bus,
            shutdown,
            refresh_task: RwLock::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// Initialize both bridges and verify the graph engine is reachable.
    ///
    /// This is the one operation allowed to fail fast: a half-initialized
    /// coordinator cannot safely serve traffic, so a failure tears down the
    /// partially-initialized bridges before returning.
    pub async fn initialize(&self) -> Result<()> {
        self.discovery.initialize().await;
        let handle = tokio::spawn(
            self.discovery
                .clone()
                .run_refresh_loop(self.shutdown.subscribe()),
        );
        *self.refresh_task.write().await = Some(handle);

        self.tools.initialize().await;

        if self.wgp.get_config().await.is_none() {
            warn!("Graph engine exposed no configuration; aborting initialization");
            self.teardown().await;
            return Err(Error::protocol(
                "workflow graph engine reported no configuration",
            ));
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!("Workflow coordinator initialized");
        Ok(())
    }

    /// Stop the refresh loop and clear bridge state
    pub async fn shutdown(&self) {
        self.teardown().await;
        info!("Workflow coordinator shut down");
    }

    async fn teardown(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.refresh_task.write().await.take() {
            handle.abort();
        }
        self.discovery.teardown().await;
        self.tools.teardown().await;
        self.initialized.store(false, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Drive one workflow end to end.
    ///
    /// Always returns a well-formed envelope; a failed phase yields
    /// `success = false` with the underlying error text embedded, never an
    /// error across this boundary.
    pub async fn execute_workflow(
        &self,
        message: &str,
        session_id: &str,
        user_id: Option<&str>,
    ) -> WorkflowExecutionResult {
        let workflow_id = Uuid::new_v4().to_string();
        let start = Instant::now();
        let mut timings = PhaseTimings::default();
        let mut protocols: HashSet<Protocol> = HashSet::new();

        // Discovery phase: warm the capability path and note which agents
        // are available. Failure here is non-fatal.
        if self.config.coordinator.intelligent_routing {
            debug!(
                workflow_id = %workflow_id,
                phase = ?WorkflowPhase::Discovery,
                "Warming discovery path"
            );
            let phase_start = Instant::now();
            let requirements = DiscoveryRequirements::new()
                .with_min_reliability(self.config.discovery.min_reliability)
                .with_max_load(self.config.discovery.max_load);
            let candidates = self
                .discovery
                .discover_agents_for_workflow(&requirements)
                .await;
            timings.discovery_ms = phase_start.elapsed().as_millis() as u64;
            protocols.insert(Protocol::Adp);
            debug!(
                "{} candidate agents available for session {}",
                candidates.len(),
                session_id
            );
        }

        // Graph execution phase: the dominant-cost phase.
        debug!(
            workflow_id = %workflow_id,
            phase = ?WorkflowPhase::GraphExecution,
            "Invoking graph engine"
        );
        let phase_start = Instant::now();
        let invocation = self.wgp.invoke(message, session_id, user_id).await;
        timings.graph_ms = phase_start.elapsed().as_millis() as u64;
        protocols.insert(Protocol::Wgp);

        let invocation = match invocation {
            Ok(invocation) => invocation,
            Err(e) => {
                return self
                    .settle_failure(workflow_id, session_id, e.to_string(), start, timings, protocols)
                    .await;
            }
        };

        // Tool settlement phase: account for tools the graph engine already
        // invoked; nothing is re-executed here.
        debug!(
            workflow_id = %workflow_id,
            phase = ?WorkflowPhase::ToolSettlement,
            "Settling tool usage"
        );
        let phase_start = Instant::now();
        let tools_executed = invocation.metadata.tools_invoked.clone();
        if !tools_executed.is_empty() {
            protocols.insert(Protocol::Tip);
        }
        let handoffs = self.discovery.handoff_count(session_id).await;
        timings.tool_ms = phase_start.elapsed().as_millis() as u64;

        let total_ms = start.elapsed().as_millis() as u64;
        let record = WorkflowMetricsRecord {
            workflow_id: workflow_id.clone(),
            session_id: session_id.to_string(),
            success: true,
            total_execution_time_ms: total_ms,
            protocols_used: protocols.clone(),
            tools_executed: tools_executed.clone(),
            handoffs,
            phase_timing_ms: timings,
        };
        self.metrics.record(record.clone()).await;
        self.bus.emit(Notification::WorkflowCompleted(record));

        info!(
            workflow_id = %workflow_id,
            phase = ?WorkflowPhase::Completed,
            duration_ms = total_ms,
            "Workflow completed"
        );

        WorkflowExecutionResult {
            success: true,
            response: invocation.response,
            metadata: WorkflowMetadata {
                workflow_id,
                session_id: session_id.to_string(),
                total_execution_time_ms: total_ms,
                agent_path: invocation.metadata.agent_path,
                protocols_used: protocols,
                tools_executed,
                handoffs,
                phase_timing_ms: timings,
            },
        }
    }

    /// Record a failed run, preserving whatever phase timings were
    /// collected; unreached phases stay at zero.
    async fn settle_failure(
        &self,
        workflow_id: String,
        session_id: &str,
        error: String,
        start: Instant,
        timings: PhaseTimings,
        protocols: HashSet<Protocol>,
    ) -> WorkflowExecutionResult {
        let total_ms = start.elapsed().as_millis() as u64;
        let handoffs = self.discovery.handoff_count(session_id).await;

        let record = WorkflowMetricsRecord {
            workflow_id: workflow_id.clone(),
            session_id: session_id.to_string(),
            success: false,
            total_execution_time_ms: total_ms,
            protocols_used: protocols.clone(),
            tools_executed: Vec::new(),
            handoffs,
            phase_timing_ms: timings,
        };
        self.metrics.record(record.clone()).await;
        self.bus.emit(Notification::WorkflowFailed(record));

        warn!(
            workflow_id = %workflow_id,
            phase = ?WorkflowPhase::Failed,
            "Workflow failed: {}",
            error
        );

        WorkflowExecutionResult {
            success: false,
            response: format!("Workflow execution failed: {}", error),
            metadata: WorkflowMetadata {
                workflow_id,
                session_id: session_id.to_string(),
                total_execution_time_ms: total_ms,
                agent_path: Vec::new(),
                protocols_used: protocols,
                tools_executed: Vec::new(),
                handoffs,
                phase_timing_ms: timings,
            },
        }
    }

    /// Aggregate independent protocol and bridge checks
    pub async fn system_health(&self) -> SystemHealthStatus {
        let adp = self
            .adp
            .list_agents()
            .await
            .map(|agents| !agents.is_empty())
            .unwrap_or(false);
        let wgp = self.wgp.get_config().await.is_some();
        let tip = self
            .tip
            .health_check()
            .await
            .map(|h| h.is_healthy())
            .unwrap_or(false);

        SystemHealthStatus::assemble(
            ProtocolHealth { adp, wgp, tip },
            BridgeHealth {
                discovery: self.discovery.is_initialized(),
                tools: self.tools.is_initialized(),
            },
            self.metrics.rolling().await,
        )
    }

    /// Per-session handoff analytics
    pub async fn handoff_analytics(&self, session_id: &str) -> HandoffAnalytics {
        self.discovery.handoff_analytics(session_id).await
    }

    /// Retained metrics record for a workflow
    pub async fn metrics_record(&self, workflow_id: &str) -> Option<WorkflowMetricsRecord> {
        self.metrics.get(workflow_id).await
    }

    /// Subscribe to lifecycle notifications
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.bus.subscribe()
    }

    /// Discovery bridge handle, for graph engine callbacks
    pub fn discovery(&self) -> &Arc<DiscoveryBridge> {
        &self.discovery
    }

    /// Tool bridge handle, for graph engine callbacks
    pub fn tools(&self) -> &Arc<ToolBridge> {
        &self.tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mesh_core::{
        AdpEvent, AgentProfile, AgentStatus, CapabilityMatch, CapabilityQuery, ExecutionContext,
        GraphInvocation, GraphMetadata, ResourceDescriptor, TipHealth, ToolDefinition,
    };
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    struct MockAdp {
        agents: Vec<AgentProfile>,
    }

    #[async_trait]
    impl AdpClient for MockAdp {
        async fn list_agents(&self) -> Result<Vec<AgentProfile>> {
            Ok(self.agents.clone())
        }

        async fn query_capability(&self, _query: CapabilityQuery) -> Result<Vec<CapabilityMatch>> {
            Ok(Vec::new())
        }

        async fn update_agent_status(
            &self,
            _agent_id: &str,
            _status: AgentStatus,
            _meta: Value,
        ) -> Result<()> {
            Ok(())
        }

        fn subscribe(&self) -> mpsc::Receiver<AdpEvent> {
            let (_tx, rx) = mpsc::channel(1);
            rx
        }
    }

    struct MockWgp {
        config: Option<Value>,
        fail: bool,
        tools_invoked: Vec<String>,
    }

    #[async_trait]
    impl WgpClient for MockWgp {
        async fn get_config(&self) -> Option<Value> {
            self.config.clone()
        }

        async fn invoke(
            &self,
            message: &str,
            _session_id: &str,
            _user_id: Option<&str>,
        ) -> Result<GraphInvocation> {
            if self.fail {
                return Err(Error::protocol("graph engine crashed"));
            }
            Ok(GraphInvocation {
                response: format!("processed: {}", message),
                metadata: GraphMetadata {
                    agent_path: vec!["planner".to_string(), "writer".to_string()],
                    tools_invoked: self.tools_invoked.clone(),
                },
            })
        }
    }

    struct MockTip {
        healthy: bool,
    }

    #[async_trait]
    impl TipClient for MockTip {
        async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
            Ok(vec![ToolDefinition {
                name: "echo".to_string(),
                description: String::new(),
                input_schema: json!({}),
                metadata: None,
            }])
        }

        async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>> {
            Ok(Vec::new())
        }

        async fn call_tool(
            &self,
            name: &str,
            _args: Value,
            _ctx: &ExecutionContext,
        ) -> Result<Value> {
            Ok(json!({ "tool": name }))
        }

        async fn read_resource(&self, uri: &str) -> Result<Value> {
            Ok(json!({ "uri": uri }))
        }

        async fn health_check(&self) -> Result<TipHealth> {
            if self.healthy {
                Ok(TipHealth::healthy())
            } else {
                Ok(TipHealth {
                    status: "unhealthy".to_string(),
                })
            }
        }
    }

    fn make_coordinator(wgp: MockWgp, tip_healthy: bool) -> WorkflowCoordinator {
        let adp = MockAdp {
            agents: vec![AgentProfile::new("a")
                .with_capability("transcribe", 0.9)
                .with_success_rate(0.9)],
        };
        WorkflowCoordinator::new(
            MeshConfig::default(),
            Arc::new(adp),
            Arc::new(wgp),
            Arc::new(MockTip {
                healthy: tip_healthy,
            }),
        )
    }

    fn healthy_wgp() -> MockWgp {
        MockWgp {
            config: Some(json!({"graph": "default"})),
            fail: false,
            tools_invoked: vec!["echo".to_string()],
        }
    }

    #[tokio::test]
    async fn test_happy_path_workflow() {
        let coordinator = make_coordinator(healthy_wgp(), true);
        coordinator.initialize().await.unwrap();

        let result = coordinator
            .execute_workflow("hello", "s1", Some("u1"))
            .await;

        assert!(result.success);
        assert_eq!(result.response, "processed: hello");
        assert_eq!(result.metadata.agent_path, vec!["planner", "writer"]);
        assert_eq!(result.metadata.tools_executed, vec!["echo"]);
        assert!(result.metadata.protocols_used.contains(&Protocol::Adp));
        assert!(result.metadata.protocols_used.contains(&Protocol::Wgp));
        assert!(result.metadata.protocols_used.contains(&Protocol::Tip));

        let record = coordinator
            .metrics_record(&result.metadata.workflow_id)
            .await
            .unwrap();
        assert!(record.success);

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_graph_failure_preserves_collected_timings() {
        let coordinator = make_coordinator(
            MockWgp {
                config: Some(json!({})),
                fail: true,
                tools_invoked: Vec::new(),
            },
            true,
        );
        coordinator.initialize().await.unwrap();

        let result = coordinator.execute_workflow("hello", "s1", None).await;

        assert!(!result.success);
        assert!(result.response.contains("graph engine crashed"));

        let record = coordinator
            .metrics_record(&result.metadata.workflow_id)
            .await
            .unwrap();
        assert!(!record.success);
        // Tool settlement was never reached.
        assert_eq!(record.phase_timing_ms.tool_ms, 0);
        assert!(record.tools_executed.is_empty());

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_initialize_fails_fast_without_graph_config() {
        let coordinator = make_coordinator(
            MockWgp {
                config: None,
                fail: false,
                tools_invoked: Vec::new(),
            },
            true,
        );

        let err = coordinator.initialize().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        // Partially-initialized bridges were torn down.
        assert!(!coordinator.is_initialized());
        assert!(!coordinator.discovery().is_initialized());
        assert!(!coordinator.tools().is_initialized());
    }

    #[tokio::test]
    async fn test_routing_disabled_skips_discovery_phase() {
        let mut config = MeshConfig::default();
        config.coordinator.intelligent_routing = false;
        let adp = MockAdp { agents: Vec::new() };
        let coordinator = WorkflowCoordinator::new(
            config,
            Arc::new(adp),
            Arc::new(healthy_wgp()),
            Arc::new(MockTip { healthy: true }),
        );
        coordinator.initialize().await.unwrap();

        let result = coordinator.execute_workflow("hello", "s1", None).await;

        assert!(result.success);
        assert_eq!(result.metadata.phase_timing_ms.discovery_ms, 0);
        assert!(!result.metadata.protocols_used.contains(&Protocol::Adp));

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_system_health_degrades_with_tip_down() {
        let coordinator = make_coordinator(healthy_wgp(), false);
        coordinator.initialize().await.unwrap();

        let health = coordinator.system_health().await;
        assert!(health.protocols.adp);
        assert!(health.protocols.wgp);
        assert!(!health.protocols.tip);
        assert_eq!(health.status, crate::health::OverallStatus::Degraded);

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_workflow_notifications_emitted() {
        let coordinator = make_coordinator(healthy_wgp(), true);
        coordinator.initialize().await.unwrap();
        let mut rx = coordinator.subscribe();

        coordinator.execute_workflow("hello", "s1", None).await;

        let completed = loop {
            match rx.recv().await.unwrap() {
                Notification::WorkflowCompleted(record) => break record,
                _ => continue,
            }
        };
        assert!(completed.success);

        coordinator.shutdown().await;
    }
}

//! End-to-end coordination tests against in-process protocol engines

use async_trait::async_trait;
use mesh_core::{
    AdpClient, AdpEvent, AgentProfile, AgentStatus, CapabilityMatch, CapabilityQuery, Error,
    ExecutionContext, GraphInvocation, GraphMetadata, HandoffRecord, MeshConfig, Notification,
    ResourceDescriptor, Result, TipHealth, ToolDefinition, WgpClient,
};
use mesh_coordinator::{OverallStatus, WorkflowCoordinator};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

struct FakeAdp {
    agents: Vec<AgentProfile>,
}

impl FakeAdp {
    fn fleet() -> Self {
        Self {
            agents: vec![
                AgentProfile::new("transcriber-1")
                    .with_capability("transcribe", 0.92)
                    .with_load(15.0)
                    .with_success_rate(0.97),
                AgentProfile::new("transcriber-2")
                    .with_capability("transcribe", 0.85)
                    .with_load(60.0)
                    .with_success_rate(0.9),
                AgentProfile::new("summarizer-1")
                    .with_capability("summarize", 0.88)
                    .with_load(30.0)
                    .with_success_rate(0.93),
            ],
        }
    }
}

#[async_trait]
impl AdpClient for FakeAdp {
    async fn list_agents(&self) -> Result<Vec<AgentProfile>> {
        Ok(self.agents.clone())
    }

    async fn query_capability(&self, query: CapabilityQuery) -> Result<Vec<CapabilityMatch>> {
        Ok(self
            .agents
            .iter()
            .filter(|a| a.has_capability(&query.capability))
            .filter(|a| a.avg_reliability() >= query.min_reliability)
            .take(query.limit)
            .map(|a| CapabilityMatch {
                profile: a.clone(),
                score: a.avg_reliability(),
            })
            .collect())
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
        let (_tx, rx) = mpsc::channel(8);
        rx
    }
}

struct FakeWgp;

#[async_trait]
impl WgpClient for FakeWgp {
    async fn get_config(&self) -> Option<Value> {
        Some(json!({ "graph": "conversation", "nodes": 4 }))
    }

    async fn invoke(
        &self,
        message: &str,
        session_id: &str,
        _user_id: Option<&str>,
    ) -> Result<GraphInvocation> {
        if message.is_empty() {
            return Err(Error::protocol("empty message"));
        }
        Ok(GraphInvocation {
            response: format!("[{}] {}", session_id, message.to_uppercase()),
            metadata: GraphMetadata {
                agent_path: vec!["transcriber-1".to_string(), "summarizer-1".to_string()],
                tools_invoked: vec!["transcode".to_string()],
            },
        })
    }
}

struct FakeTip;

#[async_trait]
impl mesh_core::TipClient for FakeTip {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        Ok(vec![ToolDefinition {
            name: "transcode".to_string(),
            description: "Transcode media".to_string(),
            input_schema: json!({ "type": "object" }),
            metadata: None,
        }])
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>> {
        Ok(vec![ResourceDescriptor {
            uri: "mem://transcripts/1".to_string(),
            name: "transcript".to_string(),
            mime_type: Some("text/plain".to_string()),
        }])
    }

    async fn call_tool(&self, name: &str, args: Value, _ctx: &ExecutionContext) -> Result<Value> {
        Ok(json!({ "tool": name, "args": args }))
    }

    async fn read_resource(&self, uri: &str) -> Result<Value> {
        Ok(json!({ "uri": uri, "body": "transcript text" }))
    }

    async fn health_check(&self) -> Result<TipHealth> {
        Ok(TipHealth::healthy())
    }
}

fn make_coordinator() -> WorkflowCoordinator {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mesh_coordinator=debug")
        .try_init();
    WorkflowCoordinator::new(
        MeshConfig::default(),
        Arc::new(FakeAdp::fleet()),
        Arc::new(FakeWgp),
        Arc::new(FakeTip),
    )
}

#[tokio::test]
async fn full_workflow_roundtrip() {
    let coordinator = make_coordinator();
    coordinator.initialize().await.unwrap();
    assert!(coordinator.is_initialized());

    let result = coordinator
        .execute_workflow("transcribe this call", "session-42", Some("user-7"))
        .await;

    assert!(result.success);
    assert_eq!(result.response, "[session-42] TRANSCRIBE THIS CALL");
    assert_eq!(
        result.metadata.agent_path,
        vec!["transcriber-1", "summarizer-1"]
    );
    assert_eq!(result.metadata.tools_executed, vec!["transcode"]);
    assert_eq!(result.metadata.phase_timing_ms.tool_ms, 0);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn failed_graph_run_returns_envelope_and_record() {
    let coordinator = make_coordinator();
    coordinator.initialize().await.unwrap();

    // FakeWgp rejects empty messages.
    let result = coordinator.execute_workflow("", "session-42", None).await;

    assert!(!result.success);
    assert!(result.response.contains("empty message"));

    let record = coordinator
        .metrics_record(&result.metadata.workflow_id)
        .await
        .unwrap();
    assert!(!record.success);
    assert_eq!(record.phase_timing_ms.tool_ms, 0);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn handoffs_flow_into_analytics_and_results() {
    let coordinator = make_coordinator();
    coordinator.initialize().await.unwrap();

    let decision = coordinator
        .discovery()
        .optimize_handoff("transcriber-1", "session-42", "summarize")
        .await;
    assert_eq!(decision.target_agent, "summarizer-1");

    coordinator
        .discovery()
        .record_handoff(
            "session-42",
            HandoffRecord::new(
                "transcriber-1",
                decision.target_agent.clone(),
                decision.reasoning.clone(),
                "summarize",
            ),
        )
        .await;

    let analytics = coordinator.handoff_analytics("session-42").await;
    assert_eq!(analytics.total_handoffs, 1);
    assert_eq!(analytics.unique_agents, 1);
    assert_eq!(
        analytics.most_used_capabilities[0],
        ("summarize".to_string(), 1)
    );

    let result = coordinator
        .execute_workflow("continue", "session-42", None)
        .await;
    assert_eq!(result.metadata.handoffs, 1);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn tool_bridge_reachable_through_coordinator() {
    let coordinator = make_coordinator();
    coordinator.initialize().await.unwrap();

    let ctx = ExecutionContext::new("session-42");
    let tool_result = coordinator
        .tools()
        .execute_tool("transcode", json!({ "input": "a.wav" }), &ctx)
        .await;
    assert!(tool_result.success);

    let first = coordinator
        .tools()
        .access_resource("mem://transcripts/1", &ctx)
        .await;
    let second = coordinator
        .tools()
        .access_resource("mem://transcripts/1", &ctx)
        .await;
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.content, second.content);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn health_reports_all_green() {
    let coordinator = make_coordinator();
    coordinator.initialize().await.unwrap();

    let health = coordinator.system_health().await;
    assert_eq!(health.status, OverallStatus::Healthy);
    assert!(health.protocols.adp && health.protocols.wgp && health.protocols.tip);
    assert!(health.bridges.discovery && health.bridges.tools);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn lifecycle_notifications_observed() {
    let coordinator = make_coordinator();
    coordinator.initialize().await.unwrap();
    let mut rx = coordinator.subscribe();

    let ctx = ExecutionContext::new("session-42");
    coordinator
        .tools()
        .execute_tool("transcode", json!({}), &ctx)
        .await;
    coordinator
        .execute_workflow("transcribe", "session-42", None)
        .await;

    let mut saw_tool = false;
    let mut saw_workflow = false;
    while let Ok(notification) = rx.try_recv() {
        match notification {
            Notification::ToolExecuted { tool_name, .. } => {
                assert_eq!(tool_name, "transcode");
                saw_tool = true;
            }
            Notification::WorkflowCompleted(record) => {
                assert!(record.success);
                saw_workflow = true;
            }
            _ => {}
        }
    }
    assert!(saw_tool && saw_workflow);

    coordinator.shutdown().await;
}

//! Common types shared across the mesh bridges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// The three protocol domains the coordination layer bridges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Agent Discovery Protocol
    Adp,
    /// Workflow Graph Protocol
    Wgp,
    /// Tool Invocation Protocol
    Tip,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Adp => write!(f, "adp"),
            Protocol::Wgp => write!(f, "wgp"),
            Protocol::Tip => write!(f, "tip"),
        }
    }
}

/// A named skill an agent advertises, with an associated reliability score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    /// Reliability in [0, 1]
    pub reliability: f64,
}

impl Capability {
    pub fn new(name: impl Into<String>, reliability: f64) -> Self {
        Self {
            name: name.into(),
            reliability,
        }
    }
}

/// Rolling performance counters reported by ADP for an agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Success rate in [0, 1]
    pub success_rate: f64,
    #[serde(default)]
    pub total_executions: u64,
}

/// Read-only cached copy of an agent as advertised by ADP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: String,
    pub capabilities: Vec<Capability>,
    /// Current load in [0, 100]
    pub load: f64,
    #[serde(default)]
    pub metrics: PerformanceMetrics,
    pub last_seen: DateTime<Utc>,
}

impl AgentProfile {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            capabilities: Vec::new(),
            load: 0.0,
            metrics: PerformanceMetrics::default(),
            last_seen: Utc::now(),
        }
    }

    /// Builder: add an advertised capability
    pub fn with_capability(mut self, name: &str, reliability: f64) -> Self {
        self.capabilities.push(Capability::new(name, reliability));
        self
    }

    /// Builder: set current load
    pub fn with_load(mut self, load: f64) -> Self {
        self.load = load;
        self
    }

    /// Builder: set success rate
    pub fn with_success_rate(mut self, rate: f64) -> Self {
        self.metrics.success_rate = rate;
        self
    }

    /// Check if the agent advertises a capability by name
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.name == name)
    }

    /// Mean reliability across advertised capabilities.
    ///
    /// An agent with no advertised capabilities reports 1.0 so that
    /// reliability filters only reject on evidence.
    pub fn avg_reliability(&self) -> f64 {
        if self.capabilities.is_empty() {
            return 1.0;
        }
        let sum: f64 = self.capabilities.iter().map(|c| c.reliability).sum();
        sum / self.capabilities.len() as f64
    }
}

/// Delegation of in-progress work from one agent to another.
///
/// Immutable once created; appended to a bounded per-session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub from_agent: String,
    pub to_agent: String,
    pub reason: String,
    pub capability: String,
    pub timestamp: DateTime<Utc>,
}

impl HandoffRecord {
    pub fn new(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        reason: impl Into<String>,
        capability: impl Into<String>,
    ) -> Self {
        Self {
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            reason: reason.into(),
            capability: capability.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Optional advisory metadata attached to a tool definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMetadata {
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub reliability: Option<f64>,
}

/// Tool definition as exposed by TIP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub metadata: Option<ToolMetadata>,
}

/// Readable resource descriptor as exposed by TIP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Per-call execution metadata on a tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionMetadata {
    pub tool_name: String,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub tokens_used: Option<u64>,
    #[serde(default)]
    pub cost: Option<f64>,
}

/// Result of a tool call through the tool bridge.
///
/// Created per call and never mutated after return. Failure is always
/// expressed in the result shape, never as an error across the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub success: bool,
    pub result: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    pub metadata: ToolExecutionMetadata,
}

impl ToolExecutionResult {
    pub fn success(tool_name: impl Into<String>, result: serde_json::Value, exec_ms: u64) -> Self {
        Self {
            success: true,
            result,
            error: None,
            metadata: ToolExecutionMetadata {
                tool_name: tool_name.into(),
                execution_time_ms: exec_ms,
                tokens_used: None,
                cost: None,
            },
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>, exec_ms: u64) -> Self {
        Self {
            success: false,
            result: serde_json::Value::Null,
            error: Some(error.into()),
            metadata: ToolExecutionMetadata {
                tool_name: tool_name.into(),
                execution_time_ms: exec_ms,
                tokens_used: None,
                cost: None,
            },
        }
    }
}

/// Result of a resource read through the tool bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAccessResult {
    pub success: bool,
    pub uri: String,
    pub content: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    pub access_time_ms: u64,
    pub from_cache: bool,
}

impl ResourceAccessResult {
    pub fn hit(uri: impl Into<String>, content: serde_json::Value, access_ms: u64) -> Self {
        Self {
            success: true,
            uri: uri.into(),
            content,
            error: None,
            access_time_ms: access_ms,
            from_cache: true,
        }
    }

    pub fn fetched(uri: impl Into<String>, content: serde_json::Value, access_ms: u64) -> Self {
        Self {
            success: true,
            uri: uri.into(),
            content,
            error: None,
            access_time_ms: access_ms,
            from_cache: false,
        }
    }

    pub fn failure(uri: impl Into<String>, error: impl Into<String>, access_ms: u64) -> Self {
        Self {
            success: false,
            uri: uri.into(),
            content: serde_json::Value::Null,
            error: Some(error.into()),
            access_time_ms: access_ms,
            from_cache: false,
        }
    }
}

/// Abstract requirement a workflow places on agent discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryRequirements {
    /// Required capability names (empty means "any")
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Agents to exclude, applied post-cache at query time
    #[serde(default)]
    pub exclude_agents: HashSet<String>,
    /// Reliability floor in [0, 1]
    #[serde(default)]
    pub min_reliability: f64,
    /// Load ceiling in [0, 100]
    #[serde(default = "default_max_load")]
    pub max_load: f64,
}

fn default_max_load() -> f64 {
    100.0
}

impl Default for DiscoveryRequirements {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryRequirements {
    pub fn new() -> Self {
        Self {
            capabilities: Vec::new(),
            exclude_agents: HashSet::new(),
            min_reliability: 0.0,
            max_load: default_max_load(),
        }
    }

    /// Builder: require a capability
    pub fn with_capability(mut self, name: &str) -> Self {
        self.capabilities.push(name.to_string());
        self
    }

    /// Builder: exclude an agent
    pub fn excluding(mut self, agent_id: &str) -> Self {
        self.exclude_agents.insert(agent_id.to_string());
        self
    }

    /// Builder: set the reliability floor
    pub fn with_min_reliability(mut self, floor: f64) -> Self {
        self.min_reliability = floor;
        self
    }

    /// Builder: set the load ceiling
    pub fn with_max_load(mut self, ceiling: f64) -> Self {
        self.max_load = ceiling;
        self
    }
}

/// Outcome of a handoff target selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffDecision {
    pub target_agent: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// Context threaded through tool and resource calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub workflow_id: String,
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ExecutionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            workflow_id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// A ranked capability match returned by ADP's capability query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityMatch {
    pub profile: AgentProfile,
    /// Base match score assigned by ADP
    pub score: f64,
}

/// Query against ADP's capability-matching endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityQuery {
    pub capability: String,
    pub min_reliability: f64,
    pub limit: usize,
}

/// Agent status reported back to ADP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Online,
    Busy,
    Offline,
}

/// Health snapshot reported by TIP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipHealth {
    pub status: String,
}

impl TipHealth {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Metadata attached to a graph engine invocation result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphMetadata {
    /// Agents visited during graph execution, in order
    #[serde(default)]
    pub agent_path: Vec<String>,
    /// Tools the graph engine invoked during execution
    #[serde(default)]
    pub tools_invoked: Vec<String>,
}

/// Result of one graph engine invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphInvocation {
    pub response: String,
    #[serde(default)]
    pub metadata: GraphMetadata,
}

/// Wall-clock timing per coordinator phase, in milliseconds
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub discovery_ms: u64,
    pub graph_ms: u64,
    pub tool_ms: u64,
}

/// One completed workflow run, recorded once and never updated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetricsRecord {
    pub workflow_id: String,
    pub session_id: String,
    pub success: bool,
    pub total_execution_time_ms: u64,
    pub protocols_used: HashSet<Protocol>,
    pub tools_executed: Vec<String>,
    pub handoffs: usize,
    pub phase_timing_ms: PhaseTimings,
}

/// Metadata block on the workflow execution envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub workflow_id: String,
    pub session_id: String,
    pub total_execution_time_ms: u64,
    pub agent_path: Vec<String>,
    pub protocols_used: HashSet<Protocol>,
    pub tools_executed: Vec<String>,
    pub handoffs: usize,
    pub phase_timing_ms: PhaseTimings,
}

/// JSON-serializable envelope returned for every workflow execution.
///
/// A failed workflow still produces this shape with `success = false` and a
/// human-readable message; failures never propagate to the caller as errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionResult {
    pub success: bool,
    pub response: String,
    pub metadata: WorkflowMetadata,
}

//! Interfaces to the external protocol engines
//!
//! The coordination layer consumes, and never reimplements, the three
//! protocol engines. Each engine is reached through one of these traits so
//! the bridges can be driven against real transports or in-process fakes.

use crate::error::Result;
use crate::types::{
    AgentProfile, AgentStatus, CapabilityMatch, CapabilityQuery, ExecutionContext,
    GraphInvocation, ResourceDescriptor, TipHealth, ToolDefinition,
};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Topology notification emitted by ADP's subscription channel
#[derive(Debug, Clone)]
pub enum AdpEvent {
    AgentRegistered(AgentProfile),
    AgentUnregistered { agent_id: String },
    TopologyChanged,
}

/// Agent Discovery Protocol client
#[async_trait]
pub trait AdpClient: Send + Sync {
    /// Enumerate all known agents with their advertised capabilities
    async fn list_agents(&self) -> Result<Vec<AgentProfile>>;

    /// Query the capability-matching endpoint for ranked candidates
    async fn query_capability(&self, query: CapabilityQuery) -> Result<Vec<CapabilityMatch>>;

    /// Report an agent status change back to ADP
    async fn update_agent_status(
        &self,
        agent_id: &str,
        status: AgentStatus,
        meta: Value,
    ) -> Result<()>;

    /// Subscribe to topology notifications.
    ///
    /// Events arrive on an owned channel; consumers pull rather than
    /// registering callbacks, keeping shutdown explicit.
    fn subscribe(&self) -> mpsc::Receiver<AdpEvent>;
}

/// Workflow Graph Protocol client
#[async_trait]
pub trait WgpClient: Send + Sync {
    /// Fetch the engine configuration; `None` doubles as the health probe
    async fn get_config(&self) -> Option<Value>;

    /// Drive one graph execution for a user message within a session
    async fn invoke(
        &self,
        message: &str,
        session_id: &str,
        user_id: Option<&str>,
    ) -> Result<GraphInvocation>;
}

/// Tool Invocation Protocol client
#[async_trait]
pub trait TipClient: Send + Sync {
    /// List callable tool definitions
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>>;

    /// List readable resource descriptors
    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>>;

    /// Execute a tool call; the bridge wraps this in timeout and retry
    async fn call_tool(&self, name: &str, args: Value, ctx: &ExecutionContext) -> Result<Value>;

    /// Read a resource by URI
    async fn read_resource(&self, uri: &str) -> Result<Value>;

    /// Protocol-level health probe
    async fn health_check(&self) -> Result<TipHealth>;
}

//! Configuration for the mesh coordination layer
//!
//! Supports loading from JSON/YAML files or environment variables. Every
//! knob is optional and falls back to the defaults noted in the field docs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Top-level configuration shared by the bridges and the coordinator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub tools: ToolConfig,

    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

impl MeshConfig {
    /// Load configuration from a JSON or YAML file (by extension)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config: Self = if path
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false)
        {
            serde_yaml::from_str(&content).with_context(|| "Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).with_context(|| "Failed to parse JSON config")?
        };

        config.discovery.fallback_agent = resolve_env_var(&config.discovery.fallback_agent);
        info!("Loaded mesh config from {}", path.display());
        Ok(config)
    }

    /// Load from default paths, falling back to environment overrides
    pub fn load_default() -> Result<Self> {
        let paths = ["/etc/mesh/mesh.json", "/etc/mesh/mesh.yaml", "mesh.json"];

        for path in paths {
            if Path::new(path).exists() {
                return Self::load(path);
            }
        }

        info!("No mesh config file found, using defaults with env overrides");
        Ok(Self::from_env())
    }

    /// Build configuration from defaults plus `MESH_*` environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse::<usize>("MESH_MAX_CONCURRENT_TOOLS") {
            config.tools.max_concurrent = v;
        }
        if let Some(v) = env_parse::<u64>("MESH_TOOL_TIMEOUT_MS") {
            config.tools.tool_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u64>("MESH_RESOURCE_TIMEOUT_MS") {
            config.tools.resource_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u32>("MESH_RETRY_ATTEMPTS") {
            config.tools.retry_attempts = v;
        }
        if let Some(v) = env_parse::<u64>("MESH_CACHE_TTL_SECS") {
            config.tools.catalog_ttl_secs = v;
            config.tools.resource_ttl_secs = v;
        }
        if let Some(v) = env_parse::<f64>("MESH_MIN_RELIABILITY") {
            config.discovery.min_reliability = v;
        }
        if let Some(v) = env_parse::<f64>("MESH_MAX_LOAD") {
            config.discovery.max_load = v;
        }
        if let Some(v) = env_parse::<bool>("MESH_AUTO_DISCOVERY") {
            config.discovery.auto_discovery = v;
        }
        if let Some(v) = env_parse::<bool>("MESH_HANDOFF_OPTIMIZATION") {
            config.discovery.handoff_optimization = v;
        }

        config
    }

    /// Create a builder for programmatic configuration
    pub fn builder() -> MeshConfigBuilder {
        MeshConfigBuilder::default()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Resolve environment variable references like ${VAR_NAME}
fn resolve_env_var(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

/// Builder for MeshConfig
#[derive(Default)]
pub struct MeshConfigBuilder {
    config: MeshConfig,
}

impl MeshConfigBuilder {
    pub fn discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.config.discovery = discovery;
        self
    }

    pub fn tools(mut self, tools: ToolConfig) -> Self {
        self.config.tools = tools;
        self
    }

    pub fn coordinator(mut self, coordinator: CoordinatorConfig) -> Self {
        self.config.coordinator = coordinator;
        self
    }

    pub fn max_concurrent_tools(mut self, max: usize) -> Self {
        self.config.tools.max_concurrent = max;
        self
    }

    pub fn tool_timeout_ms(mut self, ms: u64) -> Self {
        self.config.tools.tool_timeout_ms = ms;
        self
    }

    pub fn intelligent_routing(mut self, enabled: bool) -> Self {
        self.config.coordinator.intelligent_routing = enabled;
        self
    }

    pub fn build(self) -> MeshConfig {
        self.config
    }
}

/// Configuration for the agent discovery bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Query ADP live on each discovery (default: true); when disabled,
    /// discovery serves from the capability cache index
    #[serde(default = "default_true")]
    pub auto_discovery: bool,

    /// Apply the secondary scoring pass when selecting handoff targets
    #[serde(default = "default_true")]
    pub handoff_optimization: bool,

    /// Default reliability floor in [0, 1]
    #[serde(default = "default_min_reliability")]
    pub min_reliability: f64,

    /// Default load ceiling in [0, 100]
    #[serde(default = "default_max_load")]
    pub max_load: f64,

    /// Capability cache full-rebuild interval in seconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Agent returned at low confidence when no capability match exists
    #[serde(default = "default_fallback_agent")]
    pub fallback_agent: String,

    /// Handoff history entries kept per session, oldest evicted first
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Candidates requested from ADP's capability-matching endpoint
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,

    /// Scoring weights for the handoff optimization pass
    #[serde(default)]
    pub handoff_weights: HandoffWeights,
}

fn default_true() -> bool {
    true
}

fn default_min_reliability() -> f64 {
    0.7
}

fn default_max_load() -> f64 {
    80.0
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_fallback_agent() -> String {
    "default-agent".to_string()
}

fn default_history_capacity() -> usize {
    50
}

fn default_candidate_limit() -> usize {
    5
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            auto_discovery: true,
            handoff_optimization: true,
            min_reliability: default_min_reliability(),
            max_load: default_max_load(),
            refresh_interval_secs: default_refresh_interval(),
            fallback_agent: default_fallback_agent(),
            history_capacity: default_history_capacity(),
            candidate_limit: default_candidate_limit(),
            handoff_weights: HandoffWeights::default(),
        }
    }
}

impl DiscoveryConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Empirically chosen handoff scoring constants.
///
/// Exact values affect ranking quality, not correctness, so they stay
/// configurable rather than hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffWeights {
    /// Bonus for candidates absent from the last 3 session handoffs
    #[serde(default = "default_recency_bonus")]
    pub recency_bonus: f64,

    /// Divisor applied to (100 - load) for the load bonus
    #[serde(default = "default_load_divisor")]
    pub load_divisor: f64,

    /// Factor applied to the candidate's success rate
    #[serde(default = "default_performance_factor")]
    pub performance_factor: f64,
}

fn default_recency_bonus() -> f64 {
    0.1
}

fn default_load_divisor() -> f64 {
    1000.0
}

fn default_performance_factor() -> f64 {
    0.1
}

impl Default for HandoffWeights {
    fn default() -> Self {
        Self {
            recency_bonus: default_recency_bonus(),
            load_divisor: default_load_divisor(),
            performance_factor: default_performance_factor(),
        }
    }
}

/// Configuration for the tool/resource bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Maximum in-flight tool executions; excess calls are rejected
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Tool call deadline in milliseconds
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_ms: u64,

    /// Resource read deadline in milliseconds
    #[serde(default = "default_resource_timeout")]
    pub resource_timeout_ms: u64,

    /// Retries after the first attempt
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Linear backoff unit; attempt N sleeps N * this before retrying
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Tool catalog TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub catalog_ttl_secs: u64,

    /// Resource cache TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub resource_ttl_secs: u64,

    /// Serve catalog and resource reads from cache when populated
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Maximum cached catalog/resource entries
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_max_concurrent() -> usize {
    10
}

fn default_tool_timeout() -> u64 {
    30_000
}

fn default_resource_timeout() -> u64 {
    10_000
}

fn default_retry_attempts() -> u32 {
    1
}

fn default_retry_backoff() -> u64 {
    1000
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

fn default_cache_capacity() -> usize {
    1000
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            tool_timeout_ms: default_tool_timeout(),
            resource_timeout_ms: default_resource_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            catalog_ttl_secs: default_cache_ttl(),
            resource_ttl_secs: default_cache_ttl(),
            cache_enabled: true,
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl ToolConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn resource_timeout(&self) -> Duration {
        Duration::from_millis(self.resource_timeout_ms)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    pub fn resource_ttl(&self) -> Duration {
        Duration::from_secs(self.resource_ttl_secs)
    }
}

/// Configuration for the workflow coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Warm the discovery path before graph execution
    #[serde(default = "default_true")]
    pub intelligent_routing: bool,

    /// Workflow metrics records retained, oldest evicted first
    #[serde(default = "default_metrics_capacity")]
    pub metrics_capacity: usize,
}

fn default_metrics_capacity() -> usize {
    256
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            intelligent_routing: true,
            metrics_capacity: default_metrics_capacity(),
        }
    }
}

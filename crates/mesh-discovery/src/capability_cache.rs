//! Capability cache - maps capability names to the agents offering them
//!
//! The cache is owned exclusively by the discovery bridge. Refresh is a
//! full rebuild: clear, re-enumerate all agents, and group by each
//! advertised capability name. Exclusion lists are never baked in; callers
//! apply them post-cache at query time.

use mesh_core::AgentProfile;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CapabilityCacheStats {
    pub rebuilds: u64,
    pub lookups: u64,
    pub misses: u64,
}

/// Capability name → agent index behind a single lock
pub struct CapabilityCache {
    index: RwLock<HashMap<String, Vec<AgentProfile>>>,
    stats: RwLock<CapabilityCacheStats>,
    rebuilt_at: RwLock<Option<Instant>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
            stats: RwLock::new(CapabilityCacheStats::default()),
            rebuilt_at: RwLock::new(None),
        }
    }

    /// Replace the entire index with a fresh grouping of the given agents
    pub async fn rebuild(&self, agents: &[AgentProfile]) {
        let mut index: HashMap<String, Vec<AgentProfile>> = HashMap::new();

        for agent in agents {
            for capability in &agent.capabilities {
                index
                    .entry(capability.name.clone())
                    .or_default()
                    .push(agent.clone());
            }
        }

        let capability_count = index.len();
        *self.index.write().await = index;
        *self.rebuilt_at.write().await = Some(Instant::now());

        let mut stats = self.stats.write().await;
        stats.rebuilds += 1;

        debug!(
            "Capability cache rebuilt: {} agents across {} capabilities",
            agents.len(),
            capability_count
        );
    }

    /// Agents advertising the given capability
    pub async fn agents_for(&self, capability: &str) -> Vec<AgentProfile> {
        let index = self.index.read().await;
        let mut stats = self.stats.write().await;
        stats.lookups += 1;

        match index.get(capability) {
            Some(agents) => agents.clone(),
            None => {
                stats.misses += 1;
                Vec::new()
            }
        }
    }

    /// All distinct agents currently indexed
    pub async fn all_agents(&self) -> Vec<AgentProfile> {
        let index = self.index.read().await;
        let mut seen: HashSet<String> = HashSet::new();
        let mut agents = Vec::new();

        for entry in index.values() {
            for agent in entry {
                if seen.insert(agent.agent_id.clone()) {
                    agents.push(agent.clone());
                }
            }
        }

        agents
    }

    /// Number of distinct capabilities indexed
    pub async fn capability_count(&self) -> usize {
        self.index.read().await.len()
    }

    /// Number of distinct agents indexed
    pub async fn agent_count(&self) -> usize {
        self.all_agents().await.len()
    }

    /// Whether the cache has outlived the given staleness window
    pub async fn is_stale(&self, window: Duration) -> bool {
        match *self.rebuilt_at.read().await {
            Some(at) => at.elapsed() > window,
            None => true,
        }
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.index.write().await.clear();
        *self.rebuilt_at.write().await = None;
    }

    pub async fn stats(&self) -> CapabilityCacheStats {
        self.stats.read().await.clone()
    }
}

impl Default for CapabilityCache {
    fn default() -> Self {
        Self::new()
    }
}

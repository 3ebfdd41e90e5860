//! Agent discovery bridge - requirement resolution and handoff selection
//!
//! Translates a workflow's abstract requirements (capabilities, exclusions,
//! reliability floor, load ceiling) into a ranked list of concrete agents,
//! and picks a single handoff target when a running workflow delegates.

use crate::capability_cache::CapabilityCache;
use mesh_core::{
    AdpClient, AdpEvent, AgentProfile, CapabilityQuery, DiscoveryConfig, DiscoveryRequirements,
    HandoffDecision, HandoffRecord, Notification, NotificationBus,
};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

/// Reliability floor used when querying handoff candidates
const HANDOFF_RELIABILITY_FLOOR: f64 = 0.7;
/// Confidence for a direct capability match
const DIRECT_MATCH_CONFIDENCE: f64 = 0.7;
/// Confidence when falling back to the default agent
const FALLBACK_CONFIDENCE: f64 = 0.3;
/// Handoff history entries inspected by the anti-ping-pong check
const RECENT_WINDOW: usize = 3;

/// Composite ranking weights for discovery
const WEIGHT_RELIABILITY: f64 = 0.4;
const WEIGHT_LOAD: f64 = 0.3;
const WEIGHT_SUCCESS: f64 = 0.3;

/// Bridge statistics
#[derive(Debug, Clone)]
pub struct DiscoveryStats {
    pub cached_agents: usize,
    pub cached_capabilities: usize,
    pub sessions_tracked: usize,
    pub total_handoffs: usize,
}

/// Per-session handoff analytics
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HandoffAnalytics {
    pub total_handoffs: usize,
    pub unique_agents: usize,
    /// Capability names by handoff count, descending
    pub most_used_capabilities: Vec<(String, usize)>,
}

/// Agent discovery bridge over ADP
pub struct DiscoveryBridge {
    adp: Arc<dyn AdpClient>,
    config: DiscoveryConfig,
    cache: Arc<CapabilityCache>,
    history: RwLock<HashMap<String, VecDeque<HandoffRecord>>>,
    bus: NotificationBus,
    initialized: AtomicBool,
}

impl DiscoveryBridge {
    pub fn new(adp: Arc<dyn AdpClient>, config: DiscoveryConfig, bus: NotificationBus) -> Self {
        Self {
            adp,
            config,
            cache: Arc::new(CapabilityCache::new()),
            history: RwLock::new(HashMap::new()),
            bus,
            initialized: AtomicBool::new(false),
        }
    }

    /// Prime the capability cache and mark the bridge ready.
    ///
    /// An unreachable ADP is not fatal here; discovery degrades to empty
    /// candidate lists until the refresh loop repopulates the cache.
    pub async fn initialize(&self) {
        self.refresh().await;
        self.initialized.store(true, AtomicOrdering::SeqCst);
        info!(
            "Discovery bridge initialized ({} agents cached)",
            self.cache.agent_count().await
        );
    }

    /// Tear down bridge state after a failed coordinator initialization
    pub async fn teardown(&self) {
        self.cache.clear().await;
        self.history.write().await.clear();
        self.initialized.store(false, AtomicOrdering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(AtomicOrdering::SeqCst)
    }

    /// Resolve a workflow requirement into a ranked agent list.
    ///
    /// Filters apply in order: exclusion, reliability floor, load ceiling,
    /// then the capability filter when one is present. ADP being
    /// unreachable yields an empty list, not an error.
    pub async fn discover_agents_for_workflow(
        &self,
        requirements: &DiscoveryRequirements,
    ) -> Vec<AgentProfile> {
        let agents = if self.config.auto_discovery {
            match self.adp.list_agents().await {
                Ok(agents) => agents,
                Err(e) => {
                    warn!("ADP listing failed, no agents available: {}", e);
                    return Vec::new();
                }
            }
        } else {
            self.cache.all_agents().await
        };

        let mut matched: Vec<AgentProfile> = agents
            .into_iter()
            .filter(|a| !requirements.exclude_agents.contains(&a.agent_id))
            .filter(|a| a.avg_reliability() >= requirements.min_reliability)
            .filter(|a| a.load <= requirements.max_load)
            .filter(|a| {
                requirements.capabilities.is_empty()
                    || requirements
                        .capabilities
                        .iter()
                        .any(|c| a.has_capability(c))
            })
            .collect();

        matched.sort_by(|a, b| {
            composite_score(b)
                .partial_cmp(&composite_score(a))
                .unwrap_or(Ordering::Equal)
        });

        debug!(
            "Discovery resolved {} agents for {} required capabilities",
            matched.len(),
            requirements.capabilities.len()
        );

        matched
    }

    /// Pick a handoff target for a session that needs to delegate.
    ///
    /// Always returns a decision; when no candidate matches, the configured
    /// fallback agent is returned at low confidence.
    pub async fn optimize_handoff(
        &self,
        from_agent: &str,
        session_id: &str,
        target_capability: &str,
    ) -> HandoffDecision {
        if !self.config.handoff_optimization {
            return self.direct_handoff(target_capability).await;
        }

        let query = CapabilityQuery {
            capability: target_capability.to_string(),
            min_reliability: HANDOFF_RELIABILITY_FLOOR,
            limit: self.config.candidate_limit,
        };

        let candidates = match self.adp.query_capability(query).await {
            Ok(matches) if !matches.is_empty() => matches,
            Ok(_) => {
                return self.fallback_decision(target_capability);
            }
            Err(e) => {
                warn!("Capability query failed for '{}': {}", target_capability, e);
                return self.fallback_decision(target_capability);
            }
        };

        let recent = self.recent_targets(session_id).await;
        let weights = &self.config.handoff_weights;

        // Secondary scoring pass over ADP's base match scores
        let candidate_count = candidates.len();
        let scored = candidates.into_iter().map(|m| {
            let mut score = m.score;
            if !recent.contains(&m.profile.agent_id) {
                score += weights.recency_bonus;
            }
            score += (100.0 - m.profile.load) / weights.load_divisor;
            score += m.profile.metrics.success_rate * weights.performance_factor;
            (m, score)
        });

        let (best, best_score) =
            match scored.max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal)) {
                Some(pair) => pair,
                None => return self.fallback_decision(target_capability),
            };

        debug!(
            "Handoff from {} resolved to {} (adjusted score {:.3})",
            from_agent, best.profile.agent_id, best_score
        );

        HandoffDecision {
            target_agent: best.profile.agent_id,
            confidence: best_score.min(1.0),
            reasoning: format!(
                "optimization pass applied over {} candidates for '{}' (adjusted score {:.3})",
                candidate_count, target_capability, best_score
            ),
        }
    }

    /// Direct top-match selection used when optimization is disabled
    async fn direct_handoff(&self, target_capability: &str) -> HandoffDecision {
        let query = CapabilityQuery {
            capability: target_capability.to_string(),
            min_reliability: 0.0,
            limit: 1,
        };

        match self.adp.query_capability(query).await {
            Ok(matches) if !matches.is_empty() => HandoffDecision {
                target_agent: matches[0].profile.agent_id.clone(),
                confidence: DIRECT_MATCH_CONFIDENCE,
                reasoning: format!("direct capability match for '{}'", target_capability),
            },
            _ => self.fallback_decision(target_capability),
        }
    }

    fn fallback_decision(&self, target_capability: &str) -> HandoffDecision {
        HandoffDecision {
            target_agent: self.config.fallback_agent.clone(),
            confidence: FALLBACK_CONFIDENCE,
            reasoning: format!(
                "no capability match for '{}'; falling back to {}",
                target_capability, self.config.fallback_agent
            ),
        }
    }

    /// Target agents of the most recent session handoffs
    async fn recent_targets(&self, session_id: &str) -> Vec<String> {
        let history = self.history.read().await;
        match history.get(session_id) {
            Some(records) => records
                .iter()
                .rev()
                .take(RECENT_WINDOW)
                .map(|r| r.to_agent.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Append an executed handoff to the session history.
    ///
    /// History is append-only and bounded; eviction is strictly
    /// oldest-first.
    pub async fn record_handoff(&self, session_id: &str, record: HandoffRecord) {
        {
            let mut history = self.history.write().await;
            let records = history.entry(session_id.to_string()).or_default();
            records.push_back(record.clone());
            while records.len() > self.config.history_capacity {
                records.pop_front();
            }
        }

        info!(
            "Handoff recorded: {} -> {} ({})",
            record.from_agent, record.to_agent, record.capability
        );
        self.bus.emit(Notification::HandoffRecorded(record));
    }

    /// Number of handoffs recorded for a session
    pub async fn handoff_count(&self, session_id: &str) -> usize {
        let history = self.history.read().await;
        history.get(session_id).map(|r| r.len()).unwrap_or(0)
    }

    /// Aggregate handoff analytics for a session
    pub async fn handoff_analytics(&self, session_id: &str) -> HandoffAnalytics {
        let history = self.history.read().await;
        let records = match history.get(session_id) {
            Some(records) => records,
            None => {
                return HandoffAnalytics {
                    total_handoffs: 0,
                    unique_agents: 0,
                    most_used_capabilities: Vec::new(),
                }
            }
        };

        let mut agents: HashMap<&str, usize> = HashMap::new();
        let mut capabilities: HashMap<String, usize> = HashMap::new();
        for record in records {
            *agents.entry(record.to_agent.as_str()).or_default() += 1;
            *capabilities.entry(record.capability.clone()).or_default() += 1;
        }

        let mut most_used: Vec<(String, usize)> = capabilities.into_iter().collect();
        most_used.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        HandoffAnalytics {
            total_handoffs: records.len(),
            unique_agents: agents.len(),
            most_used_capabilities: most_used,
        }
    }

    /// Re-enumerate agents from ADP and rebuild the capability index
    pub async fn refresh(&self) {
        match self.adp.list_agents().await {
            Ok(agents) => {
                self.cache.rebuild(&agents).await;
            }
            Err(e) => {
                warn!("Capability cache refresh failed: {}", e);
            }
        }
    }

    async fn handle_event(&self, event: AdpEvent) {
        match event {
            AdpEvent::AgentRegistered(profile) => {
                debug!("Agent registered: {}", profile.agent_id);
                self.bus.emit(Notification::AgentDiscovered(profile));
            }
            AdpEvent::AgentUnregistered { agent_id } => {
                debug!("Agent unregistered: {}", agent_id);
                self.bus.emit(Notification::AgentLost { agent_id });
            }
            AdpEvent::TopologyChanged => {
                let agent_count = self.cache.agent_count().await;
                self.bus.emit(Notification::TopologyChanged { agent_count });
            }
        }
        // Every topology notification triggers a full rebuild.
        self.refresh().await;
    }

    /// Pull ADP topology events and rebuild on a fixed interval safety net.
    ///
    /// Runs until the shutdown signal fires. A closed subscription channel
    /// disables the event branch but keeps the interval refresh alive.
    pub async fn run_refresh_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut events = self.adp.subscribe();
        let mut subscription_open = true;
        let mut tick = tokio::time::interval(self.config.refresh_interval());
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.refresh().await;
                }
                maybe = events.recv(), if subscription_open => {
                    match maybe {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            warn!("ADP subscription channel closed; interval refresh continues");
                            subscription_open = false;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("Discovery refresh loop shutting down");
                    break;
                }
            }
        }
    }

    /// Shared capability cache handle
    pub fn cache(&self) -> &Arc<CapabilityCache> {
        &self.cache
    }

    pub async fn stats(&self) -> DiscoveryStats {
        let history = self.history.read().await;
        let total_handoffs = history.values().map(|r| r.len()).sum();

        DiscoveryStats {
            cached_agents: self.cache.agent_count().await,
            cached_capabilities: self.cache.capability_count().await,
            sessions_tracked: history.len(),
            total_handoffs,
        }
    }
}

/// Descending sort key: reliability, headroom, and success rate
fn composite_score(agent: &AgentProfile) -> f64 {
    WEIGHT_RELIABILITY * agent.avg_reliability()
        + WEIGHT_LOAD * (1.0 - agent.load / 100.0)
        + WEIGHT_SUCCESS * agent.metrics.success_rate
}

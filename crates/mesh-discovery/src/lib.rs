//! mesh-discovery: capability cache and agent discovery bridge
//!
//! Translates a workflow's abstract requirements into ranked concrete
//! agents, and selects handoff targets using per-session history.

pub mod bridge;
pub mod capability_cache;

pub use bridge::{DiscoveryBridge, DiscoveryStats, HandoffAnalytics};
pub use capability_cache::{CapabilityCache, CapabilityCacheStats};

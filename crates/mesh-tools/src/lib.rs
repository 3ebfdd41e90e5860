//! mesh-tools: tool and resource bridge over TIP
//!
//! Executes tool calls and resource reads on behalf of workflow graph
//! nodes, under bounded concurrency, with timeout, retry, and response
//! caching. Failures never cross the bridge boundary as errors; every
//! call settles into a result object.

pub mod bridge;
pub mod catalog;

pub use bridge::ToolBridge;
pub use catalog::{CatalogCacheStats, ResourceCache, ToolCatalogCache};

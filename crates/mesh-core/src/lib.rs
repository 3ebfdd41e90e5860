//! Core types and utilities for the mesh coordination layer
//!
//! # Modules
//!
//! - `config`: Configuration management
//! - `error`: Error types and Result alias
//! - `events`: Lifecycle notifications and the broadcast bus
//! - `traits`: Interfaces to the external protocol engines (ADP/WGP/TIP)
//! - `types`: Common types shared across the bridges

pub mod config;
pub mod error;
pub mod events;
pub mod traits;
pub mod types;

// Re-exports
pub use config::{CoordinatorConfig, DiscoveryConfig, HandoffWeights, MeshConfig, ToolConfig};
pub use error::{Error, Result};
pub use events::{Notification, NotificationBus};
pub use traits::{AdpClient, AdpEvent, TipClient, WgpClient};
pub use types::*;

//! Node plumbing for `pointsd`: configuration and the snapshot loop

pub mod config;
pub mod snapshots;

pub use config::{IdentityConfig, NodeConfig, ServerConfig, StorageConfig};

//! Multi-session manager with capacity limits and idle eviction
//!
//! This module is organized into logical submodules:
//! - `core`: Core struct, constructors, and the idle sweep task
//! - `registry`: Session lookup, creation, and disposal
//! - `stats`: Aggregate statistics and session listing

// Module declarations
mod core;
mod registry;
mod stats;

// Re-export public API
pub use self::core::SessionManager;
pub use stats::ManagerStats;

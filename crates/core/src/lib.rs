//! Shared domain types for the bioreactor platform.
//!
//! Everything the hub, node, transport, and runtime crates agree on lives
//! here: experiment identifiers and statuses, the resource policy applied
//! to each execution, and the common error taxonomy.

pub mod config;
pub mod error;
pub mod types;

//! MCP surface over the door subsystem.
//!
//! This module is organized into the following submodules:
//!
//! - `types`: Serializable response types for MCP tools
//! - `schema`: JSON Schema helpers for unsigned fields
//! - `commands`: MCP tool implementations

pub mod commands;
pub(crate) mod schema;
pub mod types;

pub use commands::McpDoorCommands;

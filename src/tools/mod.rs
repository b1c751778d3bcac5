//! MCP tool implementations for the SMAX server.
//!
//! This module contains the input types for MCP tools that expose
//! SMAX operations.

mod inputs;

pub use inputs::*;

//! Data models for the SMAX REST API.
//!
//! This module contains query parameters, bulk payloads, request outcomes
//! and typed views of the SMAX response envelopes.

mod bulk;
mod entity;
mod query;
mod response;

pub use bulk::*;
pub use entity::*;
pub use query::*;
pub use response::*;

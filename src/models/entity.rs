//! Entity models for SMAX query responses.
//!
//! SMAX wraps every read in the same envelope:
//! `{"entities": [...], "meta": {...}}`. Each entity carries its type, a
//! flat property map, and optionally expanded related properties.

use serde::Deserialize;
use serde_json::{Map, Value};

/// A single SMAX record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entity {
    /// Entity type name (e.g., `Request`, `Person`).
    #[serde(default)]
    pub entity_type: String,

    /// Field values selected by the layout.
    #[serde(default)]
    pub properties: Map<String, Value>,

    /// Expanded fields of referenced records, keyed by reference field name.
    #[serde(default)]
    pub related_properties: Map<String, Value>,
}

impl Entity {
    /// Returns the record id, which SMAX sends as either a string or a number.
    pub fn id(&self) -> Option<String> {
        self.property_text("Id")
    }

    /// Returns the display label if it was part of the layout.
    pub fn display_label(&self) -> Option<String> {
        self.property_text("DisplayLabel")
    }

    /// Returns a property rendered as plain text.
    ///
    /// Strings are returned unquoted; null and missing properties yield `None`.
    pub fn property_text(&self, name: &str) -> Option<String> {
        match self.properties.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Status block returned with queries and bulk calls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryMeta {
    /// `OK` or `FAILED`.
    #[serde(default)]
    pub completion_status: Option<String>,

    /// Total matching records, present when `meta=totalCount` was requested.
    #[serde(default)]
    pub total_count: Option<u64>,

    /// Failure details, if any.
    #[serde(default, rename = "errorDetails")]
    pub error_details: Option<super::ErrorDetails>,
}

/// Envelope of `/ems/{type}`, `/ems/{type}/{id}` and association queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityQueryResponse {
    /// Matching records.
    #[serde(default)]
    pub entities: Vec<Entity>,

    /// Query status.
    #[serde(default)]
    pub meta: Option<QueryMeta>,
}

impl EntityQueryResponse {
    /// Returns the total count if the server reported one.
    pub fn total_count(&self) -> Option<u64> {
        self.meta.as_ref().and_then(|m| m.total_count)
    }
}

//! Tool input parameter structs for MCP tools.
//!
//! This module defines the input types for each MCP tool, with
//! JSON Schema derivation for MCP tool discovery.
//!
//! # Input Sanitization
//!
//! All input structs implement `sanitize()` which trims whitespace
//! from string fields. This should be called before processing input.

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

use crate::models::QueryParams;

/// Helper function to trim an optional string.
fn trim_option(s: &Option<String>) -> Option<String> {
    s.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Optional query refinements shared by the read tools.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct QueryOptions {
    /// SMAX filter expression, e.g. "Status = 'RequestStatusReady'".
    #[serde(default)]
    pub filter: Option<String>,

    /// Grouping expression, e.g. "Status".
    #[serde(default)]
    pub group: Option<String>,

    /// Sort expression, e.g. "Id desc".
    #[serde(default)]
    pub order: Option<String>,

    /// Maximum number of records to return.
    #[serde(default)]
    pub size: Option<u32>,

    /// Number of records to skip.
    #[serde(default)]
    pub skip: Option<u32>,

    /// Metadata selector, e.g. "totalCount".
    #[serde(default)]
    pub meta: Option<String>,
}

impl QueryOptions {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            filter: trim_option(&self.filter),
            group: trim_option(&self.group),
            order: trim_option(&self.order),
            size: self.size,
            skip: self.skip,
            meta: trim_option(&self.meta),
        }
    }

    /// Converts the options into client query parameters.
    pub fn to_params(&self) -> QueryParams {
        QueryParams {
            layout: None,
            filter: self.filter.clone(),
            group: self.group.clone(),
            order: self.order.clone(),
            size: self.size,
            skip: self.skip,
            meta: self.meta.clone(),
        }
    }
}

/// Input parameters for the query_entities tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryEntitiesInput {
    /// Entity type to query, e.g. "Request", "Incident", "Person".
    pub entity_type: String,

    /// Comma-separated fields to return, e.g. "Id,DisplayLabel,Status".
    #[serde(default)]
    pub layout: Option<String>,

    /// Optional filter, grouping, sorting and paging.
    #[serde(flatten)]
    pub options: QueryOptions,
}

impl QueryEntitiesInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            entity_type: self.entity_type.trim().to_string(),
            layout: trim_option(&self.layout),
            options: self.options.sanitize(),
        }
    }

    /// Builds the query parameters for this input.
    pub fn to_params(&self) -> QueryParams {
        let mut params = self.options.to_params();
        params.layout = self.layout.clone();
        params
    }
}

/// Input parameters for the get_entity tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetEntityInput {
    /// Entity type, e.g. "Incident".
    pub entity_type: String,

    /// Record id.
    pub id: String,

    /// Comma-separated fields to return, e.g. "Id,DisplayLabel".
    pub layout: String,
}

impl GetEntityInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            entity_type: self.entity_type.trim().to_string(),
            id: self.id.trim().to_string(),
            layout: self.layout.trim().to_string(),
        }
    }
}

/// Input parameters for the get_related_records tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetRelatedRecordsInput {
    /// Entity type of the source record, e.g. "Request".
    pub entity_type: String,

    /// Id of the source record.
    pub id: String,

    /// Association name, e.g. "RequestedByPerson".
    pub association: String,

    /// Comma-separated fields of the related records to return.
    pub layout: String,

    /// Optional filter, grouping, sorting and paging.
    #[serde(flatten)]
    pub options: QueryOptions,
}

impl GetRelatedRecordsInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            entity_type: self.entity_type.trim().to_string(),
            id: self.id.trim().to_string(),
            association: self.association.trim().to_string(),
            layout: self.layout.trim().to_string(),
            options: self.options.sanitize(),
        }
    }
}

/// Input parameters for the get_aggregated_data tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetAggregatedDataInput {
    /// Entity type to aggregate, e.g. "Request".
    pub entity_type: String,

    /// Aggregation layout, e.g. "Count(Id)".
    pub layout: String,

    /// Optional filter, grouping, sorting and paging.
    #[serde(flatten)]
    pub options: QueryOptions,
}

impl GetAggregatedDataInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            entity_type: self.entity_type.trim().to_string(),
            layout: self.layout.trim().to_string(),
            options: self.options.sanitize(),
        }
    }
}

// ============================================================================
// Write operation input structs
// ============================================================================

/// Input parameters for the bulk_operation tool.
///
/// At least one of entities and relationships must be non-empty.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BulkOperationInput {
    /// "CREATE", "UPDATE" or "DELETE".
    pub operation: String,

    /// Entities, e.g. [{"entity_type": "Request", "properties": {"Id": "1", "Priority": "HighPriority"}}].
    #[serde(default)]
    pub entities: Option<Vec<Value>>,

    /// Relationships, e.g. [{"name": "RequestsOfService", "firstEndpoint": {"Request": "1"}, "secondEndpoint": {"Service": "2"}}].
    #[serde(default)]
    pub relationships: Option<Vec<Value>>,
}

impl BulkOperationInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            operation: self.operation.trim().to_string(),
            entities: self.entities,
            relationships: self.relationships,
        }
    }
}

/// Input parameters for the create_entity and update_entity tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EntitiesInput {
    /// Entities in SMAX format, e.g. [{"entity_type": "Request", "properties": {"DisplayLabel": "Printer down"}}].
    pub entities: Vec<Value>,
}

/// Input parameters for the create_relation and delete_relation tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RelationshipsInput {
    /// Relationships in SMAX format.
    pub relationships: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_trim_option_drops_blank() {
        assert_eq!(trim_option(&Some("  ".to_string())), None);
        assert_eq!(trim_option(&Some(" a ".to_string())), Some("a".to_string()));
        assert_eq!(trim_option(&None), None);
    }

    #[test]
    fn test_query_entities_input_flattens_options() {
        let input: QueryEntitiesInput = serde_json::from_value(json!({
            "entity_type": " Request ",
            "layout": "Id,DisplayLabel",
            "filter": " ",
            "size": 10
        }))
        .unwrap();

        let params = input.sanitize().to_params();
        assert_eq!(
            params,
            QueryParams::new().with_layout("Id,DisplayLabel").with_size(10)
        );
    }

    #[test]
    fn test_related_records_input_sanitize() {
        let input: GetRelatedRecordsInput = serde_json::from_value(json!({
            "entity_type": "Request",
            "id": " 42 ",
            "association": " RequestedByPerson",
            "layout": "Id",
            "order": "Id desc "
        }))
        .unwrap();

        let input = input.sanitize();
        assert_eq!(input.id, "42");
        assert_eq!(input.association, "RequestedByPerson");
        assert_eq!(input.options.order.as_deref(), Some("Id desc"));
    }

    #[test]
    fn test_bulk_input_optional_lists() {
        let input: BulkOperationInput =
            serde_json::from_value(json!({"operation": " create "})).unwrap();
        let input = input.sanitize();
        assert_eq!(input.operation, "create");
        assert!(input.entities.is_none());
        assert!(input.relationships.is_none());
    }
}

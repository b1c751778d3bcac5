//! Bulk mutation payloads and results for the `/ems/bulk` endpoint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SmaxError;

/// Operation tag of a bulk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BulkOperation {
    /// Create entities or relationships.
    Create,
    /// Update entities.
    Update,
    /// Delete entities or relationships.
    Delete,
}

impl BulkOperation {
    /// Returns the wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOperation::Create => "CREATE",
            BulkOperation::Update => "UPDATE",
            BulkOperation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BulkOperation {
    type Err = SmaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(BulkOperation::Create),
            "UPDATE" => Ok(BulkOperation::Update),
            "DELETE" => Ok(BulkOperation::Delete),
            other => Err(SmaxError::validation(format!(
                "operation must be CREATE, UPDATE or DELETE, got {:?}",
                other
            ))),
        }
    }
}

/// Body of a POST to `/ems/bulk`.
///
/// Build it with [`BulkRequest::new`], which enforces that at least one of
/// `entities` and `relationships` is present and non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkRequest {
    /// The operation applied to every item.
    pub operation: BulkOperation,

    /// Entities to create, update or delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Value>>,

    /// Relationships to create or delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Value>>,
}

impl BulkRequest {
    /// Builds a bulk request. Empty lists are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `SmaxError::Validation` when neither entities nor
    /// relationships are provided.
    pub fn new(
        operation: BulkOperation,
        entities: Option<Vec<Value>>,
        relationships: Option<Vec<Value>>,
    ) -> Result<Self, SmaxError> {
        let entities = entities.filter(|items| !items.is_empty());
        let relationships = relationships.filter(|items| !items.is_empty());

        if entities.is_none() && relationships.is_none() {
            return Err(SmaxError::validation(
                "either entities or relationships must be provided",
            ));
        }

        Ok(Self {
            operation,
            entities,
            relationships,
        })
    }
}

/// Response of a bulk call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    /// Per-entity results, in request order.
    #[serde(default)]
    pub entity_result_list: Vec<BulkItemResult>,

    /// Per-relationship results, in request order.
    #[serde(default)]
    pub relationship_result_list: Vec<BulkItemResult>,

    /// Overall status of the call.
    #[serde(default)]
    pub meta: Option<super::QueryMeta>,
}

impl BulkResponse {
    /// Iterates over every item result, entities first.
    pub fn items(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.entity_result_list
            .iter()
            .chain(self.relationship_result_list.iter())
    }

    /// Number of items that did not complete with status `OK`.
    pub fn failure_count(&self) -> usize {
        self.items().filter(|item| !item.is_ok()).count()
    }
}

/// Outcome for a single entity or relationship in a bulk call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkItemResult {
    /// The entity as stored (entity results only).
    #[serde(default)]
    pub entity: Option<super::Entity>,

    /// The relationship as stored (relationship results only).
    #[serde(default)]
    pub relationship: Option<Value>,

    /// `OK` or `FAILED`.
    #[serde(default)]
    pub completion_status: Option<String>,

    /// Failure details reported by SMAX.
    #[serde(default, rename = "errorDetails")]
    pub error_details: Option<ErrorDetails>,
}

impl BulkItemResult {
    /// Returns true if SMAX reported the item as completed.
    pub fn is_ok(&self) -> bool {
        self.completion_status.as_deref() == Some("OK")
    }
}

/// Error block attached to failed items and failed queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: Option<String>,

    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_create_body_with_entities_only() {
        let request =
            BulkRequest::new(BulkOperation::Create, Some(vec![json!({"Id": "1"})]), None).unwrap();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"operation": "CREATE", "entities": [{"Id": "1"}]})
        );
    }

    #[test]
    fn test_delete_body_with_relationships_only() {
        let rel = json!({"name": "RequestsOfService", "firstEndpoint": {"Request": "1"}});
        let request =
            BulkRequest::new(BulkOperation::Delete, None, Some(vec![rel.clone()])).unwrap();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"operation": "DELETE", "relationships": [rel]})
        );
    }

    #[test]
    fn test_missing_payload_is_rejected() {
        let err = BulkRequest::new(BulkOperation::Update, None, None).unwrap_err();
        assert!(matches!(err, SmaxError::Validation(_)));
    }

    #[test]
    fn test_empty_lists_count_as_absent() {
        assert!(BulkRequest::new(BulkOperation::Create, Some(vec![]), Some(vec![])).is_err());

        let request =
            BulkRequest::new(BulkOperation::Create, Some(vec![]), Some(vec![json!({})])).unwrap();
        assert!(request.entities.is_none());
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!("create".parse::<BulkOperation>().unwrap(), BulkOperation::Create);
        assert_eq!(" DELETE ".parse::<BulkOperation>().unwrap(), BulkOperation::Delete);
        assert!("UPSERT".parse::<BulkOperation>().is_err());
        assert_eq!(BulkOperation::Update.to_string(), "UPDATE");
    }

    #[test]
    fn test_bulk_response_counts_failures() {
        let response: BulkResponse = serde_json::from_value(json!({
            "entity_result_list": [
                {"entity": {"entity_type": "Request", "properties": {"Id": "10"}}, "completion_status": "OK"},
                {"completion_status": "FAILED", "errorDetails": {"code": "400", "message": "bad field"}}
            ],
            "meta": {"completion_status": "FAILED"}
        }))
        .unwrap();

        assert_eq!(response.items().count(), 2);
        assert_eq!(response.failure_count(), 1);
        let failed = &response.entity_result_list[1];
        assert_eq!(
            failed.error_details.as_ref().unwrap().message.as_deref(),
            Some("bad field")
        );
    }
}

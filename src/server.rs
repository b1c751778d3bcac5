//! MCP server implementation for SMAX.
//!
//! This module defines the `SmaxServer` struct that implements the MCP
//! `ServerHandler` trait, exposing SMAX query and bulk operations as tools.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};
use serde_json::Value;

use crate::error::SmaxError;
use crate::models::{
    ApiResponse, BulkOperation, BulkRequest, BulkResponse, EntityQueryResponse, ServerDiagnostic,
};
use crate::smax_client::SmaxClient;
use crate::tools::{
    BulkOperationInput, EntitiesInput, GetAggregatedDataInput, GetEntityInput,
    GetRelatedRecordsInput, QueryEntitiesInput, RelationshipsInput,
};

/// The SMAX MCP server.
///
/// This server exposes SMAX operations as MCP tools.
#[derive(Clone)]
pub struct SmaxServer {
    /// SMAX client for API operations.
    smax_client: SmaxClient,
    /// Tool router for MCP tool dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SmaxServer {
    /// Creates a new server instance.
    ///
    /// # Arguments
    ///
    /// * `smax_client` - The SMAX client for API operations
    pub fn new(smax_client: SmaxClient) -> Self {
        Self {
            smax_client,
            tool_router: Self::tool_router(),
        }
    }

    /// A simple ping tool to verify the server is running.
    #[tool(description = "Test connectivity to the SMAX MCP server. Returns 'pong' if the server is running correctly.")]
    fn ping(&self) -> String {
        tracing::debug!("ping tool called");
        "pong".to_string()
    }

    /// Query records of one entity type.
    #[tool(description = "Query SMAX records of one entity type (e.g. Request, Incident, Person). Supports layout (fields), filter, group, order, size, skip and meta.")]
    async fn query_entities(
        &self,
        Parameters(input): Parameters<QueryEntitiesInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(?input, "query_entities tool called");

        self.ensure_session().await?;

        let result = self
            .smax_client
            .query_entities(&input.entity_type, input.to_params())
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return Err(self
                    .describe_error(&format!("Failed to query {}", input.entity_type), &e)
                    .await)
            }
        };

        let data = into_tool_data(response)?;
        Ok(format_entity_list(&input.entity_type, &data))
    }

    /// Get one record by id.
    #[tool(description = "Get a single SMAX record by entity type and id. Layout is a comma-separated list of fields, e.g. 'Id,DisplayLabel,Status'.")]
    async fn get_entity(
        &self,
        Parameters(input): Parameters<GetEntityInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(entity_type = %input.entity_type, id = %input.id, "get_entity tool called");

        self.ensure_session().await?;

        let result = self
            .smax_client
            .get_entity(&input.entity_type, &input.id, &input.layout)
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return Err(self
                    .describe_error(
                        &format!("Failed to get {} {}", input.entity_type, input.id),
                        &e,
                    )
                    .await)
            }
        };

        let data = into_tool_data(response)?;
        Ok(format_entity_list(&input.entity_type, &data))
    }

    /// Get the records linked to one record.
    #[tool(description = "Get SMAX records related to one record through an association, e.g. entity_type 'Request', association 'RequestedByPerson'.")]
    async fn get_related_records(
        &self,
        Parameters(input): Parameters<GetRelatedRecordsInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(?input, "get_related_records tool called");

        self.ensure_session().await?;

        let result = self
            .smax_client
            .get_related_records(
                &input.entity_type,
                &input.id,
                &input.association,
                &input.layout,
                input.options.to_params(),
            )
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return Err(self
                    .describe_error(
                        &format!(
                            "Failed to get {} of {} {}",
                            input.association, input.entity_type, input.id
                        ),
                        &e,
                    )
                    .await)
            }
        };

        let data = into_tool_data(response)?;
        Ok(format_entity_list(&input.association, &data))
    }

    /// Run an aggregation query.
    #[tool(description = "Run an aggregation query over a SMAX entity type, e.g. layout 'Count(Id)' grouped by 'Status'.")]
    async fn get_aggregated_data(
        &self,
        Parameters(input): Parameters<GetAggregatedDataInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(?input, "get_aggregated_data tool called");

        self.ensure_session().await?;

        let result = self
            .smax_client
            .get_aggregated_data(&input.entity_type, &input.layout, input.options.to_params())
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return Err(self
                    .describe_error(
                        &format!("Failed to aggregate {}", input.entity_type),
                        &e,
                    )
                    .await)
            }
        };

        let data = into_tool_data(response)?;
        Ok(format_aggregation(&input.entity_type, &data))
    }

    // ========================================================================
    // Write tools
    // ========================================================================

    /// Apply one bulk operation.
    #[tool(description = "Run a SMAX bulk operation. operation is CREATE, UPDATE or DELETE; provide entities and/or relationships (at least one).")]
    async fn bulk_operation(
        &self,
        Parameters(input): Parameters<BulkOperationInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(operation = %input.operation, "bulk_operation tool called");

        let operation: BulkOperation = match input.operation.parse() {
            Ok(operation) => operation,
            Err(e) => return Err(self.describe_error("Invalid bulk operation", &e).await),
        };

        self.run_bulk(operation, input.entities, input.relationships)
            .await
    }

    /// Create entities.
    #[tool(description = "Create SMAX entities, e.g. [{\"entity_type\": \"Request\", \"properties\": {\"DisplayLabel\": \"Printer down\", \"RequestedByPerson\": \"10016\"}}].")]
    async fn create_entity(
        &self,
        Parameters(input): Parameters<EntitiesInput>,
    ) -> Result<String, String> {
        tracing::debug!(count = input.entities.len(), "create_entity tool called");
        self.run_bulk(BulkOperation::Create, Some(input.entities), None)
            .await
    }

    /// Update entities.
    #[tool(description = "Update SMAX entities. Each entity needs entity_type and properties including Id.")]
    async fn update_entity(
        &self,
        Parameters(input): Parameters<EntitiesInput>,
    ) -> Result<String, String> {
        tracing::debug!(count = input.entities.len(), "update_entity tool called");
        self.run_bulk(BulkOperation::Update, Some(input.entities), None)
            .await
    }

    /// Create relationships.
    #[tool(description = "Create SMAX relationships between records.")]
    async fn create_relation(
        &self,
        Parameters(input): Parameters<RelationshipsInput>,
    ) -> Result<String, String> {
        tracing::debug!(count = input.relationships.len(), "create_relation tool called");
        self.run_bulk(BulkOperation::Create, None, Some(input.relationships))
            .await
    }

    /// Delete relationships.
    #[tool(description = "Delete SMAX relationships between records.")]
    async fn delete_relation(
        &self,
        Parameters(input): Parameters<RelationshipsInput>,
    ) -> Result<String, String> {
        tracing::debug!(count = input.relationships.len(), "delete_relation tool called");
        self.run_bulk(BulkOperation::Delete, None, Some(input.relationships))
            .await
    }

    async fn run_bulk(
        &self,
        operation: BulkOperation,
        entities: Option<Vec<Value>>,
        relationships: Option<Vec<Value>>,
    ) -> Result<String, String> {
        let request = match BulkRequest::new(operation, entities, relationships) {
            Ok(request) => request,
            Err(e) => {
                return Err(self
                    .describe_error(&format!("Bulk {} failed", operation), &e)
                    .await)
            }
        };

        self.ensure_session().await?;

        let result = self.smax_client.bulk(&request).await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return Err(self
                    .describe_error(&format!("Bulk {} failed", operation), &e)
                    .await)
            }
        };

        let data = into_tool_data(response)?;
        Ok(format_bulk_result(operation, &data))
    }

    /// Logs in if no session exists yet, e.g. after a failed login at startup.
    async fn ensure_session(&self) -> Result<(), String> {
        if self.smax_client.is_authenticated().await {
            return Ok(());
        }

        tracing::info!(tenant_id = %self.smax_client.tenant_id(), "No SMAX session, logging in");
        match self.smax_client.authenticate().await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.describe_error("Failed to log in to SMAX", &e).await),
        }
    }

    /// Logs a client error and turns it into a redacted tool error message.
    async fn describe_error(&self, context: &str, error: &SmaxError) -> String {
        let sanitized = self.smax_client.sanitize(&error.to_string()).await;
        tracing::error!(error = %sanitized, "{}", context);
        format!("{}: {}", context, sanitized)
    }
}

#[tool_handler]
impl ServerHandler for SmaxServer {
    /// Returns server information for the MCP initialize handshake.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "This server provides access to a SMAX tenant. \
                 Use query_entities to search records, get_entity for a single record, \
                 get_related_records to follow associations and get_aggregated_data for counts. \
                 Change data with create_entity, update_entity, create_relation, \
                 delete_relation or bulk_operation. Start with 'ping' to verify connectivity."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Response formatting helpers
// ============================================================================

/// Maximum length for a single rendered property value.
const MAX_VALUE_LENGTH: usize = 300;

/// Maximum length for raw JSON output.
const MAX_JSON_LENGTH: usize = 8000;

/// Truncates a string if it exceeds the maximum length in characters.
///
/// If truncated, appends "... [truncated]" to indicate the content was cut.
fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let keep = max_length.saturating_sub(15);
    let mut cut: String = text.chars().take(keep).collect();
    if let Some(space_pos) = cut.rfind(char::is_whitespace) {
        cut.truncate(space_pos);
    }
    format!("{}... [truncated]", cut)
}

/// Converts a non-data outcome into a tool error.
fn into_tool_data(response: ApiResponse) -> Result<Value, String> {
    match response {
        ApiResponse::Data(value) => Ok(value),
        ApiResponse::ServerError(diagnostic) => Err(format_diagnostic(&diagnostic)),
        ApiResponse::Transport(failure) => {
            Err(format!("Could not reach SMAX: {}", failure.message))
        }
    }
}

/// Formats a server diagnostic for the tool caller.
fn format_diagnostic(diagnostic: &ServerDiagnostic) -> String {
    let mut output = format!("SMAX returned HTTP {}", diagnostic.status_code);
    if let Some(category) = diagnostic.category {
        output.push_str(&format!(" ({})", category));
    }
    output.push_str(&format!(" for {} {}", diagnostic.method, diagnostic.url));
    if !diagnostic.response_body.trim().is_empty() {
        output.push_str(&format!(
            "\nResponse: {}",
            truncate_text(diagnostic.response_body.trim(), MAX_VALUE_LENGTH)
        ));
    }
    output
}

/// Renders a JSON value as pretty text, truncated.
fn format_json(value: &Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    truncate_text(&pretty, MAX_JSON_LENGTH)
}

/// Formats a query response as human-readable text.
///
/// Falls back to raw JSON when the body is not an entity envelope.
fn format_entity_list(label: &str, data: &Value) -> String {
    let response: EntityQueryResponse = match serde_json::from_value(data.clone()) {
        Ok(response) => response,
        Err(_) => return format_json(data),
    };

    if response.entities.is_empty() {
        return format!("No {} records found matching the criteria.", label);
    }

    let mut output = format!("Found {} {} record(s)", response.entities.len(), label);
    if let Some(total) = response.total_count() {
        output.push_str(&format!(" of {} total", total));
    }
    output.push_str(":\n\n");

    for entity in &response.entities {
        let id = entity.id().unwrap_or_else(|| "?".to_string());
        match entity.display_label() {
            Some(display) => output.push_str(&format!("#{} - {}\n", id, display)),
            None => output.push_str(&format!("#{} ({})\n", id, entity.entity_type)),
        }

        for (name, value) in &entity.properties {
            if name == "Id" || name == "DisplayLabel" || value.is_null() {
                continue;
            }
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            output.push_str(&format!(
                "   {}: {}\n",
                name,
                truncate_text(&rendered, MAX_VALUE_LENGTH)
            ));
        }

        output.push('\n');
    }

    output
}

/// Formats an aggregation response.
fn format_aggregation(entity_type: &str, data: &Value) -> String {
    format!("Aggregation over {}:\n{}", entity_type, format_json(data))
}

/// Formats a bulk response with one line per item.
fn format_bulk_result(operation: BulkOperation, data: &Value) -> String {
    let response: BulkResponse = match serde_json::from_value(data.clone()) {
        Ok(response) => response,
        Err(_) => return format!("Bulk {} completed.\n{}", operation, format_json(data)),
    };

    let total = response.items().count();
    let failed = response.failure_count();
    let mut output = format!(
        "Bulk {} completed: {} item(s), {} failed.\n",
        operation, total, failed
    );

    for item in response.items() {
        let status = item.completion_status.as_deref().unwrap_or("UNKNOWN");
        let subject = match &item.entity {
            Some(entity) => format!(
                "{} #{}",
                entity.entity_type,
                entity.id().unwrap_or_else(|| "?".to_string())
            ),
            None if item.relationship.is_some() => "relationship".to_string(),
            None => "item".to_string(),
        };
        output.push_str(&format!("   {} {}", status, subject));

        if let Some(details) = &item.error_details {
            let message = details.message.as_deref().unwrap_or("no message");
            match &details.code {
                Some(code) => output.push_str(&format!(" - {} ({})", message, code)),
                None => output.push_str(&format!(" - {}", message)),
            }
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tools::QueryOptions;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // ========================================================================
    // Truncation tests
    // ========================================================================

    #[test]
    fn test_truncate_text_short_text() {
        let text = "Short text";
        assert_eq!(truncate_text(text, 100), text);
    }

    #[test]
    fn test_truncate_text_long_text() {
        let text = "word ".repeat(500);
        let result = truncate_text(&text, 100);
        assert!(result.chars().count() <= 100);
        assert!(result.ends_with("... [truncated]"));
    }

    #[test]
    fn test_truncate_text_multibyte() {
        let text = "æøå ".repeat(100);
        let result = truncate_text(&text, 50);
        assert!(result.ends_with("... [truncated]"));
    }

    fn test_config(base_url: &str) -> Config {
        Config::new(base_url, "100000002", "bob", "hunter2")
            .unwrap()
            .with_accept_invalid_certs(false)
    }

    fn test_server(base_url: &str) -> SmaxServer {
        let client = SmaxClient::new(&test_config(base_url)).expect("Failed to create test client");
        SmaxServer::new(client)
    }

    #[test]
    fn test_server_info_has_tools_capability() {
        let server = test_server("https://smax.example.com");
        let info = server.get_info();
        assert!(info.instructions.is_some());
        assert!(info.capabilities.tools.is_some());
    }

    #[test]
    fn test_ping_tool_returns_pong() {
        let server = test_server("https://smax.example.com");
        assert_eq!(server.ping(), "pong");
    }

    #[test]
    fn test_bulk_tool_rejects_unknown_operation() {
        let server = test_server("https://smax.example.com");
        let input = BulkOperationInput {
            operation: "UPSERT".to_string(),
            entities: Some(vec![json!({})]),
            relationships: None,
        };

        let err = tokio_test::block_on(server.bulk_operation(Parameters(input))).unwrap_err();
        assert!(err.contains("Invalid bulk operation"));
    }

    async fn mount_login(mock: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/authentication-endpoint/authenticate/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("tok-1"))
            .mount(mock)
            .await;
    }

    #[tokio::test]
    async fn test_create_tool_requires_entities() {
        let mock = MockServer::start().await;
        mount_login(&mock).await;
        let server = test_server(&mock.uri());

        let input = EntitiesInput { entities: vec![] };
        let err = server.create_entity(Parameters(input)).await.unwrap_err();

        assert!(err.contains("either entities or relationships"));
        assert!(mock.received_requests().await.unwrap().is_empty());
        assert!(!server.smax_client.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_tool_logs_in_when_no_session() {
        let mock = MockServer::start().await;
        mount_login(&mock).await;
        Mock::given(method("GET"))
            .and(path("/rest/100000002/ems/Request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entities": []})))
            .expect(1)
            .mount(&mock)
            .await;

        let server = test_server(&mock.uri());
        let input = QueryEntitiesInput {
            entity_type: "Request".to_string(),
            layout: None,
            options: QueryOptions::default(),
        };

        let output = server.query_entities(Parameters(input)).await.unwrap();
        assert_eq!(output, "No Request records found matching the criteria.");
        assert!(server.smax_client.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_tool_reports_failed_login() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/authentication-endpoint/authenticate/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("wrong password hunter2"))
            .mount(&mock)
            .await;

        let server = test_server(&mock.uri());
        let input = GetEntityInput {
            entity_type: "Request".to_string(),
            id: "1".to_string(),
            layout: "Id".to_string(),
        };

        let err = server.get_entity(Parameters(input)).await.unwrap_err();
        assert!(err.starts_with("Failed to log in to SMAX"));
        assert!(!err.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_get_entity_tool_formats_record() {
        let mock = MockServer::start().await;
        mount_login(&mock).await;
        Mock::given(method("GET"))
            .and(path("/rest/100000002/ems/Incident/123"))
            .and(query_param("layout", "Id,DisplayLabel,Status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [{
                    "entity_type": "Incident",
                    "properties": {"Id": "123", "DisplayLabel": "VPN down", "Status": "Ready"}
                }],
                "meta": {"completion_status": "OK"}
            })))
            .mount(&mock)
            .await;

        let server = test_server(&mock.uri());
        server.smax_client.authenticate().await.unwrap();

        let input = GetEntityInput {
            entity_type: "Incident".to_string(),
            id: "123".to_string(),
            layout: "Id,DisplayLabel,Status".to_string(),
        };
        let output = server.get_entity(Parameters(input)).await.unwrap();

        assert!(output.contains("#123 - VPN down"));
        assert!(output.contains("Status: Ready"));
    }

    #[tokio::test]
    async fn test_server_error_becomes_tool_error() {
        let mock = MockServer::start().await;
        mount_login(&mock).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(405).set_body_string("nope"))
            .mount(&mock)
            .await;

        let server = test_server(&mock.uri());
        server.smax_client.authenticate().await.unwrap();

        let input = GetAggregatedDataInput {
            entity_type: "Request".to_string(),
            layout: "Count(Id)".to_string(),
            options: QueryOptions::default(),
        };
        let err = server
            .get_aggregated_data(Parameters(input))
            .await
            .unwrap_err();

        assert!(err.contains("HTTP 405"));
        assert!(err.contains("Method not allowed"));
    }

    // ========================================================================
    // Formatting tests
    // ========================================================================

    #[test]
    fn test_format_entity_list_empty() {
        let result = format_entity_list("Request", &json!({"entities": []}));
        assert_eq!(result, "No Request records found matching the criteria.");
    }

    #[test]
    fn test_format_entity_list_with_total() {
        let data = json!({
            "entities": [
                {"entity_type": "Request", "properties": {"Id": "1", "DisplayLabel": "Laptop", "Priority": null}},
                {"entity_type": "Request", "properties": {"Id": 2, "Urgency": "High"}}
            ],
            "meta": {"total_count": 57}
        });

        let result = format_entity_list("Request", &data);
        assert!(result.starts_with("Found 2 Request record(s) of 57 total"));
        assert!(result.contains("#1 - Laptop"));
        assert!(result.contains("#2 (Request)"));
        assert!(result.contains("Urgency: High"));
        assert!(!result.contains("Priority"));
    }

    #[test]
    fn test_format_entity_list_falls_back_to_json() {
        let result = format_entity_list("Request", &json!("plain text"));
        assert_eq!(result, "\"plain text\"");
    }

    #[test]
    fn test_format_bulk_result() {
        let data = json!({
            "entity_result_list": [
                {"entity": {"entity_type": "Request", "properties": {"Id": "10"}}, "completion_status": "OK"},
                {"completion_status": "FAILED", "errorDetails": {"code": "Validation", "message": "missing field"}}
            ]
        });

        let result = format_bulk_result(BulkOperation::Create, &data);
        assert!(result.starts_with("Bulk CREATE completed: 2 item(s), 1 failed."));
        assert!(result.contains("OK Request #10"));
        assert!(result.contains("FAILED item - missing field (Validation)"));
    }

    #[test]
    fn test_format_diagnostic() {
        let diagnostic = ServerDiagnostic {
            status_code: 500,
            category: Some("Internal server error"),
            method: "POST".to_string(),
            url: "https://smax.example.com/rest/1/ems/bulk".to_string(),
            params: vec![],
            request_body: None,
            response_body: "stack trace".to_string(),
        };

        let result = format_diagnostic(&diagnostic);
        assert!(result.starts_with("SMAX returned HTTP 500 (Internal server error) for POST"));
        assert!(result.contains("Response: stack trace"));
    }

    #[test]
    fn test_into_tool_data_transport() {
        let err = into_tool_data(ApiResponse::Transport(
            crate::models::TransportFailure::new("connection refused"),
        ))
        .unwrap_err();
        assert_eq!(err, "Could not reach SMAX: connection refused");
    }
}

//! Outcomes of a single REST call.
//!
//! Only authentication problems are raised as errors. A non-401 error status
//! is logged and handed back as a [`ServerDiagnostic`]; a transport failure
//! is handed back as a [`TransportFailure`]. Callers that only care about
//! data use [`ApiResponse::into_data`].

use serde::Serialize;
use serde_json::Value;

/// Result of a request that did not fail with a `SmaxError`.
#[derive(Debug, Clone)]
pub enum ApiResponse {
    /// 2xx response with its parsed JSON body.
    Data(Value),

    /// Error status other than 401. Already logged; carries no usable data.
    ServerError(ServerDiagnostic),

    /// Connection failure, timeout, or an undecodable success body.
    Transport(TransportFailure),
}

impl ApiResponse {
    /// Returns the response body if the call succeeded.
    pub fn data(&self) -> Option<&Value> {
        match self {
            ApiResponse::Data(value) => Some(value),
            _ => None,
        }
    }

    /// Consumes the response, returning the body if the call succeeded.
    pub fn into_data(self) -> Option<Value> {
        match self {
            ApiResponse::Data(value) => Some(value),
            _ => None,
        }
    }

    /// Returns true if the call produced data.
    pub fn is_data(&self) -> bool {
        matches!(self, ApiResponse::Data(_))
    }
}

/// Structured record of a rejected request.
#[derive(Debug, Clone, Serialize)]
pub struct ServerDiagnostic {
    /// HTTP status code.
    pub status_code: u16,

    /// Human-readable category for well-known codes.
    pub category: Option<&'static str>,

    /// HTTP method.
    pub method: String,

    /// Full request URL, without query string.
    pub url: String,

    /// Query parameters that were sent.
    pub params: Vec<(String, String)>,

    /// JSON body that was sent, if any.
    pub request_body: Option<Value>,

    /// Raw response body.
    pub response_body: String,
}

impl ServerDiagnostic {
    /// Maps a status code to the category reported in diagnostics.
    pub fn category_for(status_code: u16) -> Option<&'static str> {
        match status_code {
            400 => Some("Invalid request"),
            401 => Some("Unauthorized"),
            405 => Some("Method not allowed"),
            500 => Some("Internal server error"),
            _ => None,
        }
    }

    /// Emits the diagnostic as a single structured error event.
    pub fn log(&self) {
        let params = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let request_body = self
            .request_body
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_default();

        tracing::error!(
            status_code = self.status_code,
            category = self.category.unwrap_or("Unexpected status"),
            method = %self.method,
            url = %self.url,
            params = %params,
            request_body = %request_body,
            response_body = %self.response_body,
            "SMAX request failed"
        );
    }
}

/// A request that never produced an HTTP response we could use.
///
/// Serializes as `{"[ERROR] ": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportFailure {
    /// Description of the failure.
    #[serde(rename = "[ERROR] ")]
    pub message: String,
}

impl TransportFailure {
    /// Creates a transport failure from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_for_known_codes() {
        assert_eq!(ServerDiagnostic::category_for(400), Some("Invalid request"));
        assert_eq!(ServerDiagnostic::category_for(405), Some("Method not allowed"));
        assert_eq!(ServerDiagnostic::category_for(500), Some("Internal server error"));
        assert_eq!(ServerDiagnostic::category_for(418), None);
    }

    #[test]
    fn test_only_data_yields_a_value() {
        let ok = ApiResponse::Data(json!({"entities": []}));
        let failed = ApiResponse::Transport(TransportFailure::new("connection refused"));

        assert!(ok.is_data());
        assert!(ok.data().is_some());
        assert!(failed.data().is_none());
        assert!(failed.into_data().is_none());
    }

    #[test]
    fn test_transport_failure_shape() {
        let failure = TransportFailure::new("operation timed out");
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            json!({"[ERROR] ": "operation timed out"})
        );
    }
}

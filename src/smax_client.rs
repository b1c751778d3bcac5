//! HTTP client for the SMAX REST API.
//!
//! This module provides the `SmaxClient` struct, which logs in with
//! username and password, attaches the resulting token to every request and
//! exposes the `/ems` query and bulk endpoints.
//!
//! # Failure handling
//!
//! - HTTP 401: the client logs in again once and repeats the request. A
//!   second 401 fails with `SmaxError::RetryExhausted`.
//! - Any other error status is logged as a [`ServerDiagnostic`] and returned
//!   as `ApiResponse::ServerError`.
//! - Connection errors and timeouts are returned as
//!   `ApiResponse::Transport`.
//!
//! # Concurrency
//!
//! The client is cheap to clone and safe to share. Re-authentication is
//! single-flight: when several requests are rejected with the same token,
//! only the first one logs in again and the others reuse its token.
//!
//! # Security
//!
//! The password and token are never logged. Every message built from a
//! server response or transport error is redacted before it is logged or
//! returned.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::error::SmaxError;
use crate::models::{
    ApiResponse, BulkOperation, BulkRequest, QueryParams, ServerDiagnostic, TransportFailure,
};

/// Login endpoint, relative to the base URL.
const LOGIN_PATH: &str = "/auth/authentication-endpoint/authenticate/token";

/// Cookie name carrying the session token.
const AUTH_COOKIE: &str = "SMAX_AUTH_TOKEN";

/// Maximum length of a login error body quoted in `SmaxError::Authentication`.
const MAX_ERROR_BODY_LEN: usize = 500;

/// HTTP client for one SMAX tenant.
///
/// # Example
///
/// ```ignore
/// let config = Config::from_env()?;
/// let client = SmaxClient::connect(&config).await?;
///
/// let params = QueryParams::new().with_layout("Id,DisplayLabel").with_size(10);
/// let response = client.query_entities("Request", params).await?;
/// ```
#[derive(Clone)]
pub struct SmaxClient {
    /// The underlying HTTP client (cloning is cheap).
    http: Client,

    /// Base URL without trailing slash.
    base_url: String,

    /// Tenant identifier.
    tenant_id: String,

    /// Login name.
    username: String,

    /// SECURITY: Never log this value!
    password: String,

    /// Current session token, replaced on every successful login.
    token: Arc<RwLock<Option<String>>>,

    /// Serializes re-authentication after a 401.
    refresh_lock: Arc<Mutex<()>>,
}

/// Result of one HTTP attempt.
enum Attempt {
    /// The server rejected the token.
    Unauthorized,
    /// Anything else, already classified.
    Done(ApiResponse),
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    login: &'a str,
    password: &'a str,
}

impl SmaxClient {
    /// Creates a new client without logging in.
    ///
    /// Requests fail with `SmaxError::NotAuthenticated` until
    /// [`authenticate`](Self::authenticate) succeeds.
    ///
    /// # Errors
    ///
    /// Returns `SmaxError::HttpClient` if the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self, SmaxError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if config.accept_invalid_certs {
            tracing::warn!("TLS certificate validation is disabled for SMAX requests");
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(SmaxError::HttpClient)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tenant_id: config.tenant_id.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            token: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Creates a new client and logs in immediately.
    ///
    /// # Errors
    ///
    /// Returns `SmaxError::HttpClient` if the HTTP client fails to initialize
    /// and `SmaxError::Authentication` if the login is rejected.
    pub async fn connect(config: &Config) -> Result<Self, SmaxError> {
        let client = Self::new(config)?;
        client.authenticate().await?;
        Ok(client)
    }

    /// Returns the tenant this client talks to.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Returns true once a token has been obtained.
    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Logs in and stores the returned token for subsequent requests.
    ///
    /// SMAX answers the login call with the token as plain text.
    ///
    /// # Errors
    ///
    /// Returns `SmaxError::Authentication` on transport failure, on a
    /// non-success status, or when the server returns an empty token.
    pub async fn authenticate(&self) -> Result<(), SmaxError> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);

        tracing::debug!(tenant_id = %self.tenant_id, "Authenticating with SMAX");

        let response = self
            .http
            .post(&url)
            .query(&[("TENANTID", self.tenant_id.as_str())])
            .json(&LoginRequest {
                login: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| {
                let reason = self.redact(&e.to_string(), None);
                SmaxError::authentication_transport(reason, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = truncate_body(&self.redact(&body, None));
            return Err(SmaxError::authentication(format!(
                "login returned HTTP {}: {}",
                status, body
            )));
        }

        let token = response
            .text()
            .await
            .map_err(|e| {
                let reason = self.redact(&e.to_string(), None);
                SmaxError::authentication_transport(reason, e)
            })?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(SmaxError::authentication("login returned an empty token"));
        }

        *self.token.write().await = Some(token);

        tracing::info!(tenant_id = %self.tenant_id, "Authenticated with SMAX");
        Ok(())
    }

    /// Issues a request, re-authenticating once if the token was rejected.
    ///
    /// `path` is relative to the tenant root, e.g. `/ems/Request`.
    ///
    /// # Errors
    ///
    /// Returns `SmaxError::NotAuthenticated` when no token is present,
    /// `SmaxError::Authentication` when re-authentication fails and
    /// `SmaxError::RetryExhausted` when the retried request is rejected too.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&QueryParams>,
    ) -> Result<ApiResponse, SmaxError> {
        self.request_with_retry(method, path, body, query, true)
            .await
    }

    /// Issues a request with explicit control over the 401 retry.
    ///
    /// With `allow_retry` false, a 401 fails with
    /// `SmaxError::RetryExhausted` right away.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn request_with_retry(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&QueryParams>,
        allow_retry: bool,
    ) -> Result<ApiResponse, SmaxError> {
        let url = self.rest_url(path);
        let params = query.map(QueryParams::to_pairs).unwrap_or_default();

        let token = self
            .current_token()
            .await
            .ok_or(SmaxError::NotAuthenticated)?;

        tracing::debug!(method = %method, path = %path, "Making SMAX API request");

        match self.execute(&method, &url, body, &params, &token).await {
            Attempt::Done(response) => Ok(response),
            Attempt::Unauthorized if allow_retry => {
                tracing::warn!(method = %method, path = %path, "SMAX rejected the token, re-authenticating");

                let token = self.refresh_token(&token).await?;

                match self.execute(&method, &url, body, &params, &token).await {
                    Attempt::Done(response) => Ok(response),
                    Attempt::Unauthorized => {
                        tracing::error!(method = %method, path = %path, "Failed to re-authenticate");
                        Err(SmaxError::retry_exhausted(method.as_str(), path))
                    }
                }
            }
            Attempt::Unauthorized => Err(SmaxError::retry_exhausted(method.as_str(), path)),
        }
    }

    /// Queries records of one entity type.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let params = QueryParams::new()
    ///     .with_layout("Id,DisplayLabel,Status")
    ///     .with_filter("Status = 'RequestStatusReady'")
    ///     .with_order("Id desc")
    ///     .with_size(20);
    /// let response = client.query_entities("Request", params).await?;
    /// ```
    pub async fn query_entities(
        &self,
        entity_type: &str,
        params: QueryParams,
    ) -> Result<ApiResponse, SmaxError> {
        Self::validate_name(entity_type, "entity_type")?;
        let path = format!("/ems/{}", entity_type);
        self.get(&path, &params).await
    }

    /// Gets a single record by id, returning the fields listed in `layout`.
    pub async fn get_entity(
        &self,
        entity_type: &str,
        id: &str,
        layout: &str,
    ) -> Result<ApiResponse, SmaxError> {
        Self::validate_name(entity_type, "entity_type")?;
        let id = Self::encode_id(id)?;
        let path = format!("/ems/{}/{}", entity_type, id);
        self.get(&path, &QueryParams::new().with_layout(layout))
            .await
    }

    /// Gets the records linked to one record through an association.
    pub async fn get_related_records(
        &self,
        entity_type: &str,
        id: &str,
        association: &str,
        layout: &str,
        params: QueryParams,
    ) -> Result<ApiResponse, SmaxError> {
        Self::validate_name(entity_type, "entity_type")?;
        Self::validate_name(association, "association")?;
        let id = Self::encode_id(id)?;
        let path = format!("/ems/{}/{}/associations/{}", entity_type, id, association);
        self.get(&path, &params.with_layout(layout)).await
    }

    /// Runs an aggregation query over one entity type.
    pub async fn get_aggregated_data(
        &self,
        entity_type: &str,
        layout: &str,
        params: QueryParams,
    ) -> Result<ApiResponse, SmaxError> {
        Self::validate_name(entity_type, "entity_type")?;
        let path = format!("/ems/{}/aggregations", entity_type);
        self.get(&path, &params.with_layout(layout)).await
    }

    /// Applies one operation to a batch of entities and/or relationships.
    ///
    /// # Errors
    ///
    /// Returns `SmaxError::Validation`, without touching the network, when
    /// both `entities` and `relationships` are absent or empty.
    pub async fn bulk_operation(
        &self,
        operation: BulkOperation,
        entities: Option<Vec<Value>>,
        relationships: Option<Vec<Value>>,
    ) -> Result<ApiResponse, SmaxError> {
        let request = BulkRequest::new(operation, entities, relationships)?;
        self.bulk(&request).await
    }

    /// Posts an already validated bulk request.
    pub async fn bulk(&self, request: &BulkRequest) -> Result<ApiResponse, SmaxError> {
        let body = serde_json::to_value(request)?;

        self.request(Method::POST, "/ems/bulk", Some(&body), None)
            .await
    }

    /// Creates entities.
    pub async fn create_entity(&self, entities: Vec<Value>) -> Result<ApiResponse, SmaxError> {
        self.bulk_operation(BulkOperation::Create, Some(entities), None)
            .await
    }

    /// Updates entities.
    pub async fn update_entity(&self, entities: Vec<Value>) -> Result<ApiResponse, SmaxError> {
        self.bulk_operation(BulkOperation::Update, Some(entities), None)
            .await
    }

    /// Creates relationships.
    pub async fn create_relation(
        &self,
        relationships: Vec<Value>,
    ) -> Result<ApiResponse, SmaxError> {
        self.bulk_operation(BulkOperation::Create, None, Some(relationships))
            .await
    }

    /// Deletes relationships.
    pub async fn delete_relation(
        &self,
        relationships: Vec<Value>,
    ) -> Result<ApiResponse, SmaxError> {
        self.bulk_operation(BulkOperation::Delete, None, Some(relationships))
            .await
    }

    /// Redacts the password and current token from `message`.
    ///
    /// Use this before showing any error text to a user.
    pub async fn sanitize(&self, message: &str) -> String {
        let token = self.current_token().await;
        self.redact(message, token.as_deref())
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    async fn get(&self, path: &str, params: &QueryParams) -> Result<ApiResponse, SmaxError> {
        self.request(Method::GET, path, None, Some(params)).await
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/{}{}", self.base_url, self.tenant_id, path)
    }

    async fn current_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Logs in again unless another request already replaced `stale`.
    async fn refresh_token(&self, stale: &str) -> Result<String, SmaxError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.current_token().await {
            if current != stale {
                tracing::debug!("Token already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        self.authenticate().await?;

        self.current_token()
            .await
            .ok_or(SmaxError::NotAuthenticated)
    }

    /// Sends one attempt and classifies the outcome.
    async fn execute(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        params: &[(&'static str, String)],
        token: &str,
    ) -> Attempt {
        let mut req = self
            .http
            .request(method.clone(), url)
            .header(COOKIE, format!("{}={}", AUTH_COOKIE, token));

        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => {
                let message = self.redact(&e.to_string(), Some(token));
                tracing::warn!(method = %method, url = %url, error = %message, "SMAX request did not complete");
                return Attempt::Done(ApiResponse::Transport(TransportFailure::new(message)));
            }
        };

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Attempt::Unauthorized;
        }

        if !status.is_success() {
            let response_body = response.text().await.unwrap_or_default();
            let diagnostic = ServerDiagnostic {
                status_code: status.as_u16(),
                category: ServerDiagnostic::category_for(status.as_u16()),
                method: method.to_string(),
                url: url.to_string(),
                params: params
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect(),
                request_body: body.cloned(),
                response_body: self.redact(&response_body, Some(token)),
            };
            diagnostic.log();
            return Attempt::Done(ApiResponse::ServerError(diagnostic));
        }

        match response.json::<Value>().await {
            Ok(value) => {
                tracing::trace!(body = %value, "SMAX API response");
                Attempt::Done(ApiResponse::Data(value))
            }
            Err(e) => {
                let message = self.redact(&e.to_string(), Some(token));
                tracing::warn!(method = %method, url = %url, error = %message, "SMAX response body could not be decoded");
                Attempt::Done(ApiResponse::Transport(TransportFailure::new(message)))
            }
        }
    }

    fn redact(&self, message: &str, token: Option<&str>) -> String {
        SmaxError::sanitize_message(message, &[self.password.as_str(), token.unwrap_or_default()])
    }

    /// Validates an entity type or association name interpolated into a path.
    ///
    /// SMAX names are plain identifiers such as `Request` or
    /// `RequestedByPerson`; anything else could alter the URL.
    fn validate_name(name: &str, field_name: &str) -> Result<(), SmaxError> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(SmaxError::validation(format!(
                "{} must be a non-empty identifier, got: {:?}",
                field_name,
                name.chars().take(50).collect::<String>()
            )));
        }
        Ok(())
    }

    /// Percent-encodes a record id for use as a single path segment.
    ///
    /// The id is sent as given; surrounding whitespace is encoded, not trimmed.
    fn encode_id(id: &str) -> Result<String, SmaxError> {
        if id.is_empty() || id == "." || id == ".." {
            return Err(SmaxError::validation(format!(
                "id must be a non-empty path segment, got: {:?}",
                id
            )));
        }
        Ok(urlencoding::encode(id).into_owned())
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LEN {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
        format!("{}...[truncated]", truncated)
    } else {
        body.to_string()
    }
}

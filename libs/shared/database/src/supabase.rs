use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION, CONTENT_RANGE},
    Method, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

/// Postgres SQLSTATE for an exclusion constraint violation.
pub const EXCLUSION_VIOLATION: &str = "23P01";
/// Postgres SQLSTATE for a unique constraint violation.
pub const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for a serializable transaction conflict.
pub const SERIALIZATION_FAILURE: &str = "40001";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Constraint conflict ({code:?}): {message}")]
    Conflict { code: Option<String>, message: String },

    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DatabaseError {
    /// Whether the error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            DatabaseError::SerializationFailure(_) => true,
            DatabaseError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn constraint_code(&self) -> Option<&str> {
        match self {
            DatabaseError::Conflict { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_key(&config.supabase_url, config.supabase_api_key())
    }

    pub fn with_key(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn get_headers(&self, prefer: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(prefer) = prefer {
            let value = HeaderValue::from_str(prefer)
                .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?;
            headers.insert("prefer", value);
        }

        Ok(headers)
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<Response, DatabaseError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers(prefer)?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        Ok(req.send().await?)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<Response, DatabaseError> {
        let response = self.dispatch(method, path, body, prefer).await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(Self::error_from(response).await)
    }

    async fn error_from(response: Response) -> DatabaseError {
        let status = response.status();
        let error_text = match response.text().await {
            Ok(text) => text,
            Err(e) => return DatabaseError::Transport(e),
        };
        let code = serde_json::from_str::<Value>(&error_text)
            .ok()
            .and_then(|v| v.get("code").and_then(Value::as_str).map(str::to_string));

        if code.as_deref() == Some(SERIALIZATION_FAILURE) {
            warn!("Serialization failure from API: {}", error_text);
            return DatabaseError::SerializationFailure(error_text);
        }

        match status.as_u16() {
            401 | 403 => {
                error!("API authentication error ({}): {}", status, error_text);
                DatabaseError::Auth(error_text)
            }
            404 => DatabaseError::NotFound(error_text),
            409 => {
                debug!("API constraint conflict: {}", error_text);
                DatabaseError::Conflict { code, message: error_text }
            }
            _ => {
                error!("API error ({}): {}", status, error_text);
                DatabaseError::Api { status: status.as_u16(), message: error_text }
            }
        }
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_prefer(method, path, body, None).await
    }

    /// Same as [`request`](Self::request) with a PostgREST `Prefer` header,
    /// e.g. `return=representation` on writes.
    pub async fn request_with_prefer<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body, prefer).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// GET with `Prefer: count=exact`; returns rows and the total row count
    /// of the unpaginated result taken from `Content-Range`.
    ///
    /// An offset past the last row is answered with 416 and `*/N`; that is
    /// an empty page, not an error.
    pub async fn request_with_count<T>(&self, path: &str) -> Result<(T, Option<u64>), DatabaseError>
    where
        T: DeserializeOwned,
    {
        let response = self.dispatch(Method::GET, path, None, Some("count=exact")).await?;

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            if let Some(total) = total {
                debug!("Requested range is past the last of {} rows", total);
                let empty = serde_json::from_value::<T>(Value::Array(Vec::new()))?;
                return Ok((empty, Some(total)));
            }
        }

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let data = response.json::<T>().await?;
        Ok((data, total))
    }
}

/// Extracts the total from a PostgREST `Content-Range` value such as
/// `0-9/57` or `*/0`.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

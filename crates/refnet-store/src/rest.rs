//! HTTP store against a PostgREST-style endpoint.
//!
//! Tables live under `/rest/v1/{collection}` and procedures under
//! `/rest/v1/rpc/{name}`. Every request carries the project's anon key and
//! a bearer token: the signed-in user's access token when one is set, the
//! anon key otherwise.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use crate::query::Query;
use crate::{Result, Store, StoreError, DEFAULT_TIMEOUT_SECS};

const CLIENT_INFO: &str = concat!("refnet-store/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`RestStore`].
#[derive(Clone, Debug)]
pub struct RestStoreConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    /// Public anon key sent as `apikey` on every request.
    pub anon_key: String,
    /// Bound on every request.
    pub timeout: Duration,
}

impl RestStoreConfig {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// [`Store`] over HTTP.
pub struct RestStore {
    base_url: String,
    anon_key: String,
    timeout: Duration,
    access_token: RwLock<Option<String>>,
    http: reqwest::Client,
}

impl RestStore {
    pub fn new(config: RestStoreConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;
        if config.anon_key.trim().is_empty() {
            return Err(StoreError::InvalidConfig("anon key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            base_url,
            anon_key: config.anon_key,
            timeout: config.timeout.max(Duration::from_millis(250)),
            access_token: RwLock::new(None),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, query: &Query) -> String {
        format!("{}/rest/v1/{}", self.base_url, query.collection.as_str())
    }

    fn rpc_url(&self, procedure: &str) -> String {
        format!("{}/rest/v1/rpc/{procedure}", self.base_url)
    }

    fn bearer(&self) -> String {
        let token = match self.access_token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        token.unwrap_or_else(|| self.anon_key.clone())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .header("X-Client-Info", CLIENT_INFO)
            .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()))
            .timeout(self.timeout)
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, HeaderMap, Vec<u8>)> {
        let response = self.authorize(request).send().await.map_err(transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport_error)?;
        Ok((status, headers, body.to_vec()))
    }
}

#[async_trait]
impl Store for RestStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let request = self.http.get(self.table_url(query)).query(&query.to_params());
        let (status, _, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        decode_rows(query.collection.as_str(), &body)
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let request = self
            .http
            .head(self.table_url(query))
            .query(&query.to_params())
            .header("Prefer", "count=exact");
        let (status, headers, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        let range = headers
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::decode(query.collection.as_str(), "missing Content-Range"))?;
        parse_content_range_total(range)
            .ok_or_else(|| StoreError::decode(query.collection.as_str(), format!("bad Content-Range: {range}")))
    }

    async fn update(&self, query: &Query, patch: &Value) -> Result<Vec<Value>> {
        let request = self
            .http
            .patch(self.table_url(query))
            .query(&query.filter_params())
            .header("Prefer", "return=representation")
            .json(patch);
        let (status, _, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        decode_rows(query.collection.as_str(), &body)
    }

    async fn call(&self, procedure: &str, args: &Value) -> Result<Value> {
        let request = self.http.post(self.rpc_url(procedure)).json(args);
        let (status, _, body) = self.send(request).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::UnknownProcedure(procedure.to_string()));
        }
        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|e| StoreError::decode(procedure, e))
    }

    fn set_access_token(&self, token: Option<String>) {
        match self.access_token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }
}

fn normalize_base_url(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidConfig("base url is empty".to_string()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(StoreError::InvalidConfig(format!(
            "base url must be http(s): {trimmed}"
        )));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn transport_error(error: reqwest::Error) -> StoreError {
    StoreError::Connectivity {
        message: error.to_string(),
    }
}

/// Map a non-success response to a store error, preferring the remote's
/// `message` field over the raw body.
pub(crate) fn http_error(status: StatusCode, body: &[u8]) -> StoreError {
    let message = remote_message(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized { message },
        StatusCode::REQUEST_TIMEOUT | StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => StoreError::Connectivity { message },
        _ => StoreError::Query {
            status: status.as_u16(),
            message,
        },
    }
}

fn remote_message(body: &[u8]) -> String {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let field = parsed.as_ref().and_then(|v| {
        ["message", "msg", "error_description", "error"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    });
    field.unwrap_or_else(|| {
        let raw = String::from_utf8_lossy(body).trim().to_string();
        if raw.is_empty() {
            "<empty>".to_string()
        } else {
            raw
        }
    })
}

fn decode_rows(collection: &str, body: &[u8]) -> Result<Vec<Value>> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(body).map_err(|e| StoreError::decode(collection, e))
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
fn parse_content_range_total(range: &str) -> Option<u64> {
    range.rsplit_once('/')?.1.trim().parse().ok()
}

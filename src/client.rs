// SPDX-License-Identifier: MIT
//! Signed HTTP requests to the engine.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::auth;
use crate::error::{HostError, Result};
use crate::supervisor::{EngineEndpoint, EngineSupervisor};

/// Stateless request issuer: reads the current session endpoint at call time,
/// signs, sends, and classifies the response. Safe to call concurrently; a
/// call racing a restart fails with a transport error rather than hanging.
pub struct EngineClient {
    http: reqwest::Client,
    supervisor: Arc<EngineSupervisor>,
}

impl EngineClient {
    pub fn new(supervisor: Arc<EngineSupervisor>) -> Self {
        Self {
            http: reqwest::Client::new(),
            supervisor,
        }
    }

    /// GET with an empty body. `Ok(None)` means HTTP 204.
    pub async fn get(&self, path: &str) -> Result<Option<Value>> {
        self.request(Method::GET, path, None).await
    }

    /// POST a JSON payload. `Ok(None)` means HTTP 204.
    pub async fn post<T: Serialize>(&self, path: &str, payload: &T) -> Result<Option<Value>> {
        let body = serde_json::to_vec(payload)?;
        self.request(Method::POST, path, Some(body)).await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Option<Value>> {
        let endpoint = self
            .supervisor
            .endpoint()
            .await
            .ok_or(HostError::NotRunning)?;
        send_signed(&self.http, &endpoint, method, path, body).await
    }
}

/// Issue one signed request against `endpoint`. The MAC covers exactly the
/// bytes that go on the wire: the method name, the path, and the raw body.
pub(crate) async fn send_signed(
    http: &reqwest::Client,
    endpoint: &EngineEndpoint,
    method: Method,
    path: &str,
    body: Option<Vec<u8>>,
) -> Result<Option<Value>> {
    let url = format!("{}{}", endpoint.base_url, path);
    let body = body.unwrap_or_default();
    let mac = auth::request_header_value(method.as_str(), path, &body, &endpoint.secret);

    debug!(%method, %url, bytes = body.len(), "engine request");

    let response = http
        .request(method, url.as_str())
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(auth::HMAC_HEADER, mac)
        .body(body)
        .send()
        .await
        .map_err(|source| HostError::Transport {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HostError::EngineStatus { status, body });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| HostError::Transport { url, source })?;
    let value = serde_json::from_slice(&bytes)?;
    Ok(Some(value))
}

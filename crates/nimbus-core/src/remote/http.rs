//! HTTP remote store client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{Ack, PullOutcome, RemoteError, RemoteResult, RemoteStore};
use crate::models::{MutationId, ReportPayload, WeatherSnapshot};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cheap reachability probe used for connectivity detection.
    pub async fn probe(&self) -> bool {
        self.client
            .head(&self.base_url)
            .send()
            .await
            .is_ok_and(|response| !response.status().is_server_error())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn push(
        &self,
        payload: &ReportPayload,
        idempotency_key: &MutationId,
    ) -> RemoteResult<Ack> {
        let response = self
            .client
            .post(format!("{}/v1/reports", self.base_url))
            .header(IDEMPOTENCY_HEADER, idempotency_key.as_str())
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            // Already stored under this key by an earlier ambiguous push
            return Ok(Ack {
                remote_id: None,
                duplicate: true,
            });
        }

        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }

        if body.trim().is_empty() {
            return Ok(Ack {
                remote_id: None,
                duplicate: false,
            });
        }

        let parsed = serde_json::from_str::<PushResponse>(&body)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        Ok(Ack {
            remote_id: parsed.id,
            duplicate: parsed.duplicate,
        })
    }

    async fn pull(&self, key: &str) -> RemoteResult<PullOutcome> {
        let response = self
            .client
            .get(format!(
                "{}/v1/weather/{}",
                self.base_url,
                urlencoding::encode(key)
            ))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(PullOutcome::NotFound);
        }

        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }

        let snapshot = serde_json::from_str::<WeatherSnapshot>(&body)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        Ok(PullOutcome::Found(snapshot))
    }
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    id: Option<String>,
    #[serde(default)]
    duplicate: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ))
    }
}

//! HTTP implementation of [`TranslationApi`].

use std::time::Duration;

use async_trait::async_trait;
use medsync_types::{
    EndpointDescriptor, Session, TranslationPayload, TranslationRequest, TranslationResult,
};
use serde::{Deserialize, Serialize};

use super::{EdgeHealth, TranslationApi};
use crate::error::ApiError;

/// Timeout for session join/end calls.
const SESSION_TIMEOUT: Duration = Duration::from_secs(10);

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_connect() || e.is_request() {
            ApiError::Network(e.to_string())
        } else if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Body of `POST /translate`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateTextBody<'a> {
    text: &'a str,
    source_language: &'a str,
    target_language: &'a str,
    context: &'a str,
}

/// Body of `POST /translate-audio`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateAudioBody<'a> {
    audio_data: &'a str,
    source_language: &'a str,
    target_language: &'a str,
    context: &'a str,
}

/// Error body returned by the translate endpoints.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinBody<'a> {
    session_code: &'a str,
    language: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinResponse {
    session_id: String,
    token: String,
}

#[derive(Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<DeviceEntry>,
}

#[derive(Deserialize)]
struct DeviceEntry {
    address: String,
}

/// Translation API over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpApi {
    http: reqwest::Client,
}

impl HttpApi {
    /// Create a client with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing reqwest client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Turn a non-success response into [`ApiError::Status`], preferring the
/// endpoint's `{ "error": ... }` message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("error").to_string()
            } else {
                text
            }
        });
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TranslationApi for HttpApi {
    async fn translate(
        &self,
        endpoint: &EndpointDescriptor,
        request: &TranslationRequest,
        timeout: Duration,
    ) -> Result<TranslationResult, ApiError> {
        let builder = match &request.payload {
            TranslationPayload::Text { text } => self
                .http
                .post(endpoint.url("/translate"))
                .json(&TranslateTextBody {
                    text,
                    source_language: &request.source_language,
                    target_language: &request.target_language,
                    context: &request.context,
                }),
            TranslationPayload::Audio { audio_data } => self
                .http
                .post(endpoint.url("/translate-audio"))
                .json(&TranslateAudioBody {
                    audio_data,
                    source_language: &request.source_language,
                    target_language: &request.target_language,
                    context: &request.context,
                }),
        };

        let response = check_status(builder.timeout(timeout).send().await?).await?;
        Ok(response.json::<TranslationResult>().await?)
    }

    async fn health(
        &self,
        endpoint: &EndpointDescriptor,
        timeout: Duration,
    ) -> Result<EdgeHealth, ApiError> {
        let response = self
            .http
            .get(endpoint.url("/health"))
            .timeout(timeout)
            .send()
            .await?;
        Ok(check_status(response).await?.json::<EdgeHealth>().await?)
    }

    async fn discover_edge_devices(
        &self,
        cloud: &EndpointDescriptor,
        timeout: Duration,
    ) -> Result<Vec<String>, ApiError> {
        let response = self
            .http
            .get(cloud.url("/edge/devices"))
            .timeout(timeout)
            .send()
            .await?;
        let body = check_status(response).await?.json::<DevicesResponse>().await?;
        Ok(body.devices.into_iter().map(|d| d.address).collect())
    }

    async fn join_session(
        &self,
        cloud: &EndpointDescriptor,
        session_code: &str,
        language: &str,
    ) -> Result<Session, ApiError> {
        let response = self
            .http
            .post(cloud.url("/sessions/join"))
            .json(&JoinBody {
                session_code,
                language,
            })
            .timeout(SESSION_TIMEOUT)
            .send()
            .await?;
        let body = check_status(response).await?.json::<JoinResponse>().await?;
        Ok(Session::new(&body.session_id, &body.token, language))
    }

    async fn end_session(&self, cloud: &EndpointDescriptor, session: &Session) -> Result<(), ApiError> {
        let response = self
            .http
            .post(cloud.url(&format!("/sessions/{}/end", session.session_id)))
            .bearer_auth(&session.auth_token)
            .timeout(SESSION_TIMEOUT)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

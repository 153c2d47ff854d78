use archive_model::FetcherError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// One participant recording as reported by the provider's listing
/// endpoint (spec §6: "exact wire formats are provider-specific and
/// encapsulated in F" — this is our encapsulation of it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecording {
    pub call_id: String,
    pub kind: RecordingKind,
    pub user_id: Option<i64>,
    pub length_ms: Option<i64>,
    pub offset_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingKind {
    Audio,
    Video,
}

#[derive(Debug, Deserialize)]
struct ListRecordingsResponse {
    recordings: Vec<ProviderRecording>,
}

const MAX_TRANSIENT_RETRIES: u32 = 3;

/// Thin HTTP client over the third-party recording provider, authenticated
/// with an account/auth-token pair (spec §6).
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: String,
    account: String,
    auth_token: String,
}

impl ProviderClient {
    pub fn new(base_url: impl Into<String>, account: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            account: account.into(),
            auth_token: auth_token.into(),
        }
    }

    pub async fn list_recordings(
        &self,
        session_id: i64,
    ) -> Result<Vec<ProviderRecording>, FetcherError> {
        let url = format!("{}/sessions/{session_id}/recordings", self.base_url);
        let response = self.send_with_retry(|| self.authorized(self.http.get(&url))).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        self.check_auth(&response)?;

        let body: ListRecordingsResponse = response
            .json()
            .await
            .map_err(|e| FetcherError::BadManifest(e.to_string()))?;
        Ok(body.recordings)
    }

    pub async fn download_recording(&self, call_id: &str) -> Result<Vec<u8>, FetcherError> {
        let url = format!("{}/recordings/{call_id}/media", self.base_url);
        let response = self.send_with_retry(|| self.authorized(self.http.get(&url))).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetcherError::MissingRecording(call_id.to_string()));
        }
        self.check_auth(&response)?;

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| FetcherError::Unreachable(e.to_string()))
    }

    /// Idempotent: a recording already gone from the provider is a
    /// success, not an error (spec §4.5).
    pub async fn delete_recording(&self, call_id: &str) -> Result<(), FetcherError> {
        let url = format!("{}/recordings/{call_id}", self.base_url);
        let response = self
            .send_with_retry(|| self.authorized(self.http.delete(&url)))
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.check_auth(&response)?;
        Ok(())
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("X-Provider-Account", &self.account)
            .header("X-Provider-Auth-Token", &self.auth_token)
    }

    fn check_auth(&self, response: &reqwest::Response) -> Result<(), FetcherError> {
        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(FetcherError::Unauthorized(format!(
                "provider returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Retries only on transient network failures (connect/timeout);
    /// authorization and not-found responses are returned as-is for the
    /// caller to classify (spec §4.5: "authorization errors propagate").
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, FetcherError> {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < MAX_TRANSIENT_RETRIES => {
                    attempt += 1;
                    warn!(attempt, error = %e, "transient provider error, retrying");
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
                Err(e) => {
                    info!(error = %e, "provider request failed");
                    return Err(FetcherError::Unreachable(e.to_string()));
                }
            }
        }
    }
}

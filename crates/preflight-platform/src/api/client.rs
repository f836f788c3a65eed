//! HTTP client for the candidate endpoints of the backend.

use async_trait::async_trait;
use preflight_core::{
    Assessment, AssessmentDirectory, AssessmentRef, AttemptId, AttemptStarter, Frame,
    IdentityVerifier, RemoteError, VerificationOutcome,
};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use super::config::ApiConfig;
use super::wire::{self, StartRequest};
use crate::error::{PlatformError, PlatformResult};

/// Assessment directory, identity verifier and attempt starter in one,
/// all backed by the same authenticated client.
pub struct HttpApiClient {
    config: ApiConfig,
    client: Client,
}

impl HttpApiClient {
    pub fn new(config: ApiConfig) -> PlatformResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = config.session_cookie.as_deref() {
            let value =
                HeaderValue::from_str(cookie).map_err(|e| PlatformError::Client(e.to_string()))?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| PlatformError::Client(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Read status and body, mapping transport failures.
    async fn read(response: reqwest::Response) -> Result<(u16, String), RemoteError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        Ok((status, body))
    }
}

fn unreachable(e: reqwest::Error) -> RemoteError {
    RemoteError::Unreachable(e.to_string())
}

#[async_trait]
impl AssessmentDirectory for HttpApiClient {
    async fn assessment(&self, job_id: &str) -> Result<Assessment, RemoteError> {
        let url = self.config.url(&format!(
            "candidate/eligible-assessments/{}",
            self.config.user_id
        ));
        tracing::debug!(
            "Fetching assessments of candidate {} for {}",
            self.config.user_id,
            job_id
        );

        let response = self.client.get(&url).send().await.map_err(unreachable)?;
        let (status, body) = Self::read(response).await?;
        if !(200..300).contains(&status) {
            return Err(RemoteError::Status {
                status,
                message: wire::error_message(&body),
            });
        }
        wire::parse_assessment(&body, job_id)
    }
}

#[async_trait]
impl IdentityVerifier for HttpApiClient {
    async fn verify(&self, frame: &Frame) -> Result<VerificationOutcome, RemoteError> {
        let url = self.config.url("candidate/verify-face");
        let part = Part::bytes(frame.jpeg.clone())
            .file_name("webcam.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        let form = Form::new().part("webcam_image", part);

        tracing::debug!(
            "Submitting {}x{} frame ({} bytes) for face verification",
            frame.width,
            frame.height,
            frame.jpeg.len()
        );
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(unreachable)?;
        let (status, body) = Self::read(response).await?;

        let outcome = wire::parse_verification(status, &body)?;
        if outcome.success {
            tracing::info!("Face verification succeeded");
        } else {
            tracing::warn!("Face verification rejected: {}", outcome.failure_reason());
        }
        Ok(outcome)
    }
}

#[async_trait]
impl AttemptStarter for HttpApiClient {
    async fn start_attempt(&self, assessment: &AssessmentRef) -> Result<AttemptId, RemoteError> {
        let url = self.config.url("candidate/start-assessment");
        let request = StartRequest {
            user_id: &self.config.user_id,
            job_id: &assessment.job_id,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(unreachable)?;
        let (status, body) = Self::read(response).await?;
        if !(200..300).contains(&status) {
            return Err(RemoteError::Status {
                status,
                message: wire::error_message(&body),
            });
        }

        let attempt_id = wire::parse_attempt(status, &body)?;
        tracing::info!(
            "Started attempt {} for assessment {}",
            attempt_id,
            assessment.job_id
        );
        Ok(attempt_id)
    }
}

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::api::models::{
    Attachment, AuthResponse, Conversation, Errand, ErrandStatus, Message, NewErrand,
    OutgoingMessage, RunnerApplication, SignInRequest, SignUpRequest, StatusUpdate,
};
use crate::credentials::{CredentialStore, TOKEN_KEY};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}")]
    Status { status: u16, message: Option<String> },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// The `message` field of the server's error payload, if it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }

    /// What to show the user: the server's message, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }
}

fn error_message(body: &[u8]) -> Option<String> {
    let json: Value = serde_json::from_slice(body).ok()?;
    json.get("message")
        .and_then(|v| v.as_str())
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

/// Thin REST client for the marketplace API. Every request carries the
/// persisted bearer token when one exists; nothing is retried or queued.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl ApiClient {
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialStore>) -> Self {
        Self::with_http(HttpClient::new(), base_url, credentials)
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self::with_http(http, base_url, credentials))
    }

    fn with_http(http: HttpClient, base_url: &str, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn with_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match self.credentials.get(TOKEN_KEY) {
            Ok(Some(token)) => req.bearer_auth(token),
            Ok(None) => req,
            Err(e) => {
                log::warn!("Could not read stored token: {e}");
                req
            }
        }
    }

    async fn dispatch(&self, req: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let resp = self.with_auth(req).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            log::debug!("API responded {status}");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(body.to_vec())
    }

    async fn call<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let body = self.dispatch(req).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn sign_in(&self, request: &SignInRequest) -> Result<AuthResponse, ApiError> {
        self.call(self.http.post(self.endpoint("auth/signin")).json(request)).await
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthResponse, ApiError> {
        self.call(self.http.post(self.endpoint("auth/signup")).json(request)).await
    }

    pub async fn apply_as_runner(&self, application: RunnerApplication) -> Result<(), ApiError> {
        let mut form = Form::new()
            .text("userId", application.user_id)
            .text("vehicleType", application.vehicle_type)
            .text("location", application.location)
            .text("relativePhone", application.relative_phone)
            .text("nationalId", application.national_id);
        if let Some(file) = application.national_slip_image {
            form = form.part("nationalSlipImage", file_part(file)?);
        }
        if let Some(file) = application.photo {
            form = form.part("photo", file_part(file)?);
        }
        self.dispatch(self.http.post(self.endpoint("runner/apply")).multipart(form))
            .await
            .map(|_| ())
    }

    pub async fn errands(&self) -> Result<Vec<Errand>, ApiError> {
        self.call(self.http.get(self.endpoint("errands"))).await
    }

    pub async fn errand(&self, id: &str) -> Result<Errand, ApiError> {
        self.call(self.http.get(self.endpoint(&format!("errands/{id}")))).await
    }

    pub async fn create_errand(&self, errand: &NewErrand) -> Result<Errand, ApiError> {
        self.call(self.http.post(self.endpoint("errands")).json(errand)).await
    }

    pub async fn update_errand_status(&self, id: &str, status: ErrandStatus) -> Result<Errand, ApiError> {
        let body = StatusUpdate { status };
        self.call(self.http.put(self.endpoint(&format!("errands/{id}/status"))).json(&body))
            .await
    }

    /// Errands between the signed-in user and `user_id`.
    pub async fn errands_with(&self, user_id: &str) -> Result<Vec<Errand>, ApiError> {
        self.call(self.http.get(self.endpoint(&format!("errands/users/{user_id}")))).await
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.call(self.http.get(self.endpoint("chat/conversations"))).await
    }

    pub async fn messages(&self, user_id: &str) -> Result<Vec<Message>, ApiError> {
        self.call(self.http.get(self.endpoint(&format!("chat/{user_id}")))).await
    }

    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, ApiError> {
        self.call(self.http.post(self.endpoint("chat/send")).json(message)).await
    }
}

fn file_part(file: Attachment) -> Result<Part, ApiError> {
    Ok(Part::bytes(file.bytes).file_name(file.file_name).mime_str(&file.mime)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentials;

    #[test]
    fn server_message_wins_over_fallback() {
        let err = ApiError::Status { status: 400, message: error_message(br#"{"message":"Email taken"}"#) };
        assert_eq!(err.user_message("Registration failed"), "Email taken");
    }

    #[test]
    fn blank_or_missing_message_uses_fallback() {
        let bodies: [&[u8]; 3] = [br#"{"message":"  "}"#, b"{}", b"<html>oops</html>"];
        for body in bodies {
            let err = ApiError::Status { status: 500, message: error_message(body) };
            assert_eq!(err.user_message("Login failed"), "Login failed");
        }
    }

    #[test]
    fn not_found_is_detected() {
        let err = ApiError::Status { status: 404, message: None };
        assert!(err.is_not_found());
        assert!(!ApiError::Status { status: 500, message: None }.is_not_found());
    }

    #[test]
    fn endpoints_join_cleanly() {
        let client = ApiClient::new("http://localhost:5000/api/", Arc::new(MemoryCredentials::new()));
        assert_eq!(client.endpoint("errands"), "http://localhost:5000/api/errands");
        assert_eq!(client.endpoint("/chat/send"), "http://localhost:5000/api/chat/send");
    }
}

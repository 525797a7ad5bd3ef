use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub api_token: String,
    pub endpoint: String,
}

impl MailConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let api_token = env::var("MAIL_API_TOKEN")
            .map_err(|_| AppError::Validation("MAIL_API_TOKEN is not set".to_string()))?;
        let endpoint = env::var("MAIL_API_URL")
            .map_err(|_| AppError::Validation("MAIL_API_URL is not set".to_string()))?;

        Ok(Self { api_token, endpoint })
    }
}

/// The external mail-sending collaborator: an opaque, possibly slow,
/// possibly failing remote call. Callers tolerate failure without losing
/// reminder state.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

pub struct HttpMailer {
    client: Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Delivery(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let request_body = SendRequest {
            to,
            subject,
            text: body,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_token))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("Mail request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Delivery(format!(
                "Mail API error {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

/// Accepts every send without delivering anything. Used for local
/// development when no mail API is configured, and in tests.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), AppError> {
        tracing::debug!("noop mailer: would send {:?} to {}", subject, to);
        Ok(())
    }
}

//! Outbound SMS gateway client.
//!
//! The carrier is an external HTTP API; everything above it talks to the
//! `SmsGateway` trait so tests can swap in a mock.

use async_trait::async_trait;
use di::{inject, injectable};
use serde::Serialize;
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The carrier answered with a non-success status; the body text is
    /// kept verbatim for operator diagnosis.
    #[error("gateway rejected message: {0}")]
    Rejected(String),

    #[error("gateway request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Submits one message for delivery. Success means the carrier
    /// accepted the message, not that the handset received it.
    async fn send_sms(&self, phone_number: &str, body: &str) -> Result<(), GatewayError>;
}

#[derive(Serialize)]
struct SendSmsRequest<'a> {
    to: &'a str,
    body: &'a str,
}

pub struct HttpSmsGateway {
    url: String,
    api_key: String,
    client: reqwest::Client,
}

#[injectable(SmsGateway)]
impl HttpSmsGateway {
    #[inject]
    pub fn create() -> HttpSmsGateway {
        dotenvy::dotenv().ok();
        let url = env::var("SMS_GATEWAY_URL").expect("SMS_GATEWAY_URL must be set");
        let api_key = env::var("SMS_GATEWAY_API_KEY").unwrap_or_default();

        HttpSmsGateway {
            url,
            api_key,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("failed to build HTTP client"),
        }
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send_sms(&self, phone_number: &str, body: &str) -> Result<(), GatewayError> {
        let mut request = self.client.post(&self.url).json(&SendSmsRequest {
            to: phone_number,
            body,
        });
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if body.is_empty() {
            Err(GatewayError::Rejected(status.to_string()))
        } else {
            Err(GatewayError::Rejected(body))
        }
    }
}

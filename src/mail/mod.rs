//! Notifier for verification and reset messages, backed by the Mailtrap
//! send API. Without an API token the client is a no-op that reports
//! `Skipped`, which the auth flows surface as the dev-mode escape hatch.

use crate::config::MailConfig;
use serde_json::json;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Mail request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Mail provider rejected the message: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// No API token configured; nothing was sent.
    Skipped,
}

pub struct MailClient {
    http: reqwest::Client,
    api_url: String,
    api_token: Option<String>,
    sender_email: String,
    sender_name: String,
}

impl MailClient {
    pub fn new(config: &MailConfig) -> Self {
        let api_token = if config.api_token.is_empty() {
            None
        } else {
            Some(config.api_token.clone())
        };

        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_token,
            sender_email: config.sender_email.clone(),
            sender_name: config.sender_name.clone(),
        }
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: &str,
    ) -> Result<SendOutcome, MailError> {
        let Some(token) = &self.api_token else {
            info!("Mail client unconfigured, skipping send of '{}' to {}", subject, to);
            return Ok(SendOutcome::Skipped);
        };

        let response = self
            .http
            .post(format!("{}/api/send", self.api_url))
            .bearer_auth(token)
            .json(&json!({
                "from": { "email": self.sender_email, "name": self.sender_name },
                "to": [{ "email": to }],
                "subject": subject,
                "text": text,
                "html": html,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!("{}: {}", status, body)));
        }

        Ok(SendOutcome::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(api_url: &str, token: &str) -> MailClient {
        MailClient::new(&MailConfig {
            api_token: token.to_string(),
            api_url: api_url.to_string(),
            sender_email: "hello@demomailtrap.co".to_string(),
            sender_name: "PlateScanner".to_string(),
        })
    }

    #[tokio::test]
    async fn test_send_skipped_without_token() {
        let client = client_for("http://localhost:1", "");
        let outcome = client
            .send("a@x.com", "Verify your account", "text", "<p>html</p>")
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_send_posts_to_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/send"))
            .and(header("authorization", "Bearer mt_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), "mt_token");
        let outcome = client
            .send("a@x.com", "Verify your account", "text", "<p>html</p>")
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Sent);
    }

    #[tokio::test]
    async fn test_provider_rejection_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/send"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), "wrong_token");
        let err = client
            .send("a@x.com", "Verify your account", "text", "<p>html</p>")
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Rejected(_)));
    }
}

//! services/api/src/adapters/mailer.rs
//!
//! Adapters for the `NotificationService` port: an HTTP mail relay, and a logging
//! fallback used when no relay is configured.

use async_trait::async_trait;
use journal_core::ports::{NotificationService, PortError, PortResult};
use reqwest::Client;
use serde::Serialize;
use tracing::info;

//=========================================================================================
// HTTP Mail Relay
//=========================================================================================

/// The JSON body posted to the mail relay.
#[derive(Debug, Serialize, PartialEq)]
pub struct MailPayload<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub text: &'a str,
}

/// Sends mail by POSTing JSON to a transactional mail API.
#[derive(Clone)]
pub struct HttpMailAdapter {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailAdapter {
    /// Creates a new `HttpMailAdapter`. The client should carry the request timeouts.
    pub fn new(client: Client, endpoint: String, api_key: Option<String>, from: String) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl NotificationService for HttpMailAdapter {
    async fn send(&self, to_address: &str, subject: &str, body: &str) -> PortResult<()> {
        let payload = MailPayload {
            from: &self.from,
            to: to_address,
            subject,
            text: body,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Mail relay request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Unexpected(format!(
                "Mail relay rejected the message: HTTP {}",
                status
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// Logging Fallback
//=========================================================================================

/// Writes outgoing mail to the log instead of sending it.
#[derive(Clone, Default)]
pub struct LogMailAdapter;

#[async_trait]
impl NotificationService for LogMailAdapter {
    async fn send(&self, to_address: &str, subject: &str, body: &str) -> PortResult<()> {
        info!(to = to_address, subject, "Mail relay not configured; message body: {}", body);
        Ok(())
    }
}

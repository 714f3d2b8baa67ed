use std::sync::Arc;

use chrono::Local;
use log::{debug, warn};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use crate::error::LogError;
use crate::fetcher::PublicIp;

/// Warning shown when a click could not be logged.
pub const LOG_WARNING: &str = "Failed to log event.";

/// A single click on a report link, sent once and discarded.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClickEvent {
    pub timestamp: String,
    pub ip: String,
    pub company: String,
    pub link: String,
}

impl ClickEvent {
    pub fn new(ip: &str, company: &str, link: &str) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339(),
            ip: ip.to_string(),
            company: company.to_string(),
            link: link.to_string(),
        }
    }
}

/// What the front end should do after a click.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClickOutcome {
    /// Link to open; always present, logging never blocks it.
    pub open: String,
    pub warning: Option<String>,
}

/// Posts click events to the logging webhook.
#[derive(Clone, Debug)]
pub struct ClickLogger {
    client: Client,
    webhook: Option<String>,
    ip: Arc<PublicIp>,
}

impl ClickLogger {
    /// `webhook: None` disables logging entirely.
    pub fn new(client: Client, webhook: Option<String>, ip: Arc<PublicIp>) -> Self {
        Self { client, webhook, ip }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook.is_some()
    }

    /// Send one click event. Any non-success answer is an error.
    pub async fn log_click(&self, link: &str, company: &str) -> Result<(), LogError> {
        let Some(webhook) = self.webhook.as_deref() else {
            debug!("click logging disabled; not logging {}", company);
            return Ok(());
        };

        let event = ClickEvent::new(self.ip.get().await, company, link);
        let body = serde_json::to_string(&event)?;

        let response = self
            .client
            .post(webhook)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LogError::Status(status.as_u16()));
        }
        debug!("logged click on {} ({})", company, link);
        Ok(())
    }

    /// Log the click and hand back the link to open, with a warning if logging failed.
    pub async fn record_click(&self, link: &str, company: &str) -> ClickOutcome {
        let warning = match self.log_click(link, company).await {
            Ok(()) => None,
            Err(e) => {
                warn!("click on {} not logged: {}", company, e);
                Some(LOG_WARNING.to_string())
            }
        };
        ClickOutcome {
            open: link.to_string(),
            warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_expected_keys() {
        let event = ClickEvent::new("1.2.3.4", "Acme Corp", "https://x/y#name=Acme Corp");
        let value = serde_json::to_value(&event).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["company", "ip", "link", "timestamp"]);
        assert!(chrono::DateTime::parse_from_rfc3339(&event.timestamp).is_ok());
    }

    #[tokio::test]
    async fn disabled_logger_opens_link_without_warning() {
        let client = Client::new();
        let ip = Arc::new(PublicIp::new(client.clone(), "http://127.0.0.1:9/ip"));
        let logger = ClickLogger::new(client, None, ip.clone());
        let outcome = logger.record_click("https://x/y", "Acme").await;
        assert_eq!(outcome.open, "https://x/y");
        assert_eq!(outcome.warning, None);
        assert!(ip.cached().is_none());
    }
}

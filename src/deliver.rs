//! Webhook delivery.
//!
//! A destination is a Slack-style incoming-webhook URL that accepts
//! `{"text": "..."}`.  Delivery is fire-and-forget: any 2xx answer counts
//! as delivered and the response body is ignored.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;

use crate::config::WEBHOOK_PREFIX;
use crate::error::DeliveryError;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Posts a message to one destination.
pub trait Notifier {
    fn post(&self, destination: &str, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct Payload<'a> {
    text: &'a str,
}

/// [`Notifier`] for Slack incoming webhooks.
pub struct SlackWebhook {
    client: Client,
}

impl SlackWebhook {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(TIMEOUT).build()?;
        Ok(Self { client })
    }
}

impl Notifier for SlackWebhook {
    fn post(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(destination.trim())
            .json(&Payload { text })
            .send()
            .map_err(|source| DeliveryError::Http {
                destination: redact(destination),
                source: source.without_url(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                destination: redact(destination),
                status,
            });
        }
        Ok(())
    }
}

/// Webhook URLs are credentials; keep only enough to tell them apart in
/// logs.
pub fn redact(destination: &str) -> String {
    let destination = destination.trim();
    match destination.strip_prefix(WEBHOOK_PREFIX) {
        Some(rest) => {
            let team = rest.split('/').next().unwrap_or_default();
            format!("{WEBHOOK_PREFIX}{team}/***")
        }
        None => destination.to_string(),
    }
}

//! Machine translation of titles and abstracts.
//!
//! [`HttpTranslator`] speaks the LibreTranslate API (`POST /translate` with
//! `q`, `source`, `target`).  Without a configured service the run uses
//! [`Untranslated`], which hands the text back as-is.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TranslatorConfig;
use crate::error::TranslationError;

const TIMEOUT: Duration = Duration::from_secs(60);

/// Translates text between two languages.
pub trait Translator {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError>;
}

#[derive(Serialize)]
struct Request<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct Response {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
    error: Option<String>,
}

/// [`Translator`] for a LibreTranslate-compatible endpoint.
pub struct HttpTranslator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(config: &TranslatorConfig) -> Result<Self, TranslationError> {
        let client = Client::builder().timeout(TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim().to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

impl Translator for HttpTranslator {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError> {
        debug!("Translating {} chars {} -> {}", text.len(), source, target);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&Request {
                q: text,
                source,
                target,
                format: "text",
                api_key: self.api_key.as_deref(),
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::Status(status));
        }

        let body: Response = response.json()?;
        match body.translated_text {
            Some(text) => Ok(text),
            None => Err(TranslationError::EmptyResponse(
                body.error.unwrap_or_else(|| "missing translatedText".to_string()),
            )),
        }
    }
}

/// Passthrough used when no translation service is configured.
///
/// `main` warns once at startup when a feed asks for translation anyway.
pub struct Untranslated;

impl Translator for Untranslated {
    fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String, TranslationError> {
        debug!("No translator configured; leaving text untranslated instead of {}", target);
        Ok(text.to_string())
    }
}

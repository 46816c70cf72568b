//! Segment translation through a local Ollama server.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, TranslationError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "gemma:2b";
pub const DEFAULT_TARGET_LANGUAGE: &str = "Chinese";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaTranslator {
    client: Client,
    base_url: String,
    model: String,
    target_language: String,
}

impl OllamaTranslator {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::Config(format!("cannot build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
        })
    }

    pub fn with_target_language(mut self, language: &str) -> Self {
        self.target_language = language.to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the server answers its model listing endpoint.
    pub fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send() {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url, error = %e, "translator probe failed");
                false
            }
        }
    }

    /// Translate `text`, or `None` on any failure.
    pub fn translate(&self, text: &str) -> Option<String> {
        match self.try_translate(text) {
            Ok(translation) => Some(translation),
            Err(e) => {
                tracing::warn!(error = %e, "translation failed");
                None
            }
        }
    }

    /// Translate `text`, reporting why it failed.
    pub fn try_translate(
        &self,
        text: &str,
    ) -> std::result::Result<String, TranslationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TranslationError::EmptyInput);
        }

        let request = GenerateRequest {
            model: &self.model,
            prompt: build_prompt(text, &self.target_language),
            stream: false,
            options: GenerateOptions {
                temperature: 0.1,
                top_p: 0.9,
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TranslationError::Timeout(REQUEST_TIMEOUT.as_secs())
                } else {
                    TranslationError::Unavailable(self.base_url.clone())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TranslationError::Status(status.as_u16()));
        }

        let body: GenerateResponse = resp.json().map_err(|e| {
            if e.is_timeout() {
                TranslationError::Timeout(REQUEST_TIMEOUT.as_secs())
            } else {
                TranslationError::MalformedResponse(e.to_string())
            }
        })?;

        clean_translation(&body.response)
            .ok_or(TranslationError::EmptyTranslation)
    }
}

fn build_prompt(text: &str, target_language: &str) -> String {
    format!(
        "Please translate the following English text to {target_language}. \n\
         Only provide the direct translation without any explanations or \
         additional text:\n\"{text}\"\n"
    )
}

/// Strip quoting and a leading `Translation:` label from model output.
pub fn clean_translation(raw: &str) -> Option<String> {
    let mut cleaned = raw.trim().replace('"', "");
    let trimmed = cleaned.trim();
    if trimmed
        .get(..12)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("translation:"))
    {
        cleaned = trimmed[12..].to_string();
    }

    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// User-facing hint for a translation failure.
pub fn failure_hint(error: &TranslationError) -> &'static str {
    match error {
        TranslationError::Unavailable(_) => {
            "Start the server with `ollama serve` and pull the model, \
             e.g. `ollama pull gemma:2b`."
        }
        TranslationError::Timeout(_) => {
            "The model took too long to answer; try again once it is loaded."
        }
        TranslationError::Status(_) | TranslationError::MalformedResponse(_) => {
            "The server answered unexpectedly; check that the configured \
             model is installed."
        }
        TranslationError::EmptyInput | TranslationError::EmptyTranslation => {
            "Nothing was translated."
        }
    }
}

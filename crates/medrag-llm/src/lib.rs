//! Ollama text-generation client.
//!
//! Speaks the non-streaming `/api/generate` protocol:
//! `{model, prompt, stream: false, options: {num_predict, temperature, top_p}}`
//! answered by `{response}`. Every call carries its own timeout; timeouts and
//! transport failures come back as [`GenerateError`] values, never panics.
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use medrag_core::config::GeneratorConfig;
use medrag_core::traits::{GenerateRequest, Generator};
use medrag_core::GenerateError;

/// Sampling options sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub num_predict: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { num_predict: 384, temperature: 0.2, top_p: 0.9 }
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerationOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaGenerator {
    client: Client,
    endpoint: String,
    options: GenerationOptions,
}

impl OllamaGenerator {
    /// `base_url` is the server root, e.g. `http://localhost:11434`.
    pub fn new(base_url: &str, options: GenerationOptions) -> anyhow::Result<Self> {
        let client = Client::builder().build()?;
        let endpoint = format!("{}/api/generate", base_url.trim_end_matches('/'));
        Ok(Self { client, endpoint, options })
    }

    pub fn from_config(config: &GeneratorConfig) -> anyhow::Result<Self> {
        let options = GenerationOptions {
            num_predict: config.num_predict,
            temperature: config.temperature,
            top_p: config.top_p,
        };
        Self::new(&config.base_url, options)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_error(err: &reqwest::Error, timeout: Duration) -> GenerateError {
        if err.is_timeout() {
            GenerateError::Timeout(timeout)
        } else if err.is_connect() || err.is_request() {
            GenerateError::Unreachable(err.to_string())
        } else {
            GenerateError::Backend(err.to_string())
        }
    }
}

impl Generator for OllamaGenerator {
    fn generate(&self, request: &GenerateRequest<'_>) -> Result<String, GenerateError> {
        let body = GenerateBody {
            model: request.model,
            prompt: request.prompt,
            stream: false,
            options: self.options,
        };
        tracing::debug!(model = request.model, endpoint = %self.endpoint, prompt_chars = request.prompt.len(), "calling generator");

        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .map_err(|e| Self::map_error(&e, request.timeout))?;

        let status = resp.status();
        let text = resp.text().map_err(|e| Self::map_error(&e, request.timeout))?;
        if !status.is_success() {
            return Err(GenerateError::Backend(format!("HTTP {}: {}", status.as_u16(), text.trim())));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| GenerateError::Backend(format!("invalid response body: {e}")))?;
        Ok(parsed.response)
    }
}

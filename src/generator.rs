//! Remote text generator (Gemini `generateContent`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GeneratorConfig;
use crate::error::{Error, Result};

/// Anything that turns a prompt into text
#[async_trait]
pub trait Generator: Send + Sync {
  async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Prompt used for note explanations
pub fn explanation_prompt(title: &str, content: &str) -> String {
  format!(
    "Explain the following note in simple terms:\nTitle: {}\nContent: {}",
    title, content
  )
}

#[derive(Debug, Serialize)]
struct ApiPart<'a> {
  text: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiContent<'a> {
  parts: Vec<ApiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiGenerateRequest<'a> {
  contents: Vec<ApiContent<'a>>,
}

#[derive(Debug, Deserialize)]
struct ApiGenerateResponse {
  #[serde(default)]
  candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
  content: Option<ApiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidateContent {
  #[serde(default)]
  parts: Vec<ApiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidatePart {
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
  error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
  message: String,
}

impl ApiGenerateResponse {
  /// Text parts of the first candidate, concatenated
  fn into_text(self) -> Option<String> {
    let text: String = self
      .candidates
      .into_iter()
      .next()?
      .content?
      .parts
      .into_iter()
      .filter_map(|p| p.text)
      .collect();
    if text.is_empty() {
      None
    } else {
      Some(text)
    }
  }
}

/// Gemini REST client. The API key is optional at construction so the rest
/// of the app works without it; each call then fails with a configuration
/// error.
#[derive(Clone)]
pub struct GeminiClient {
  http: reqwest::Client,
  base_url: String,
  model: String,
  api_key: Option<String>,
}

impl GeminiClient {
  pub fn new(config: &GeneratorConfig, api_key: Option<String>) -> Self {
    Self {
      http: reqwest::Client::new(),
      base_url: config.base_url.trim_end_matches('/').to_string(),
      model: config.model.clone(),
      api_key,
    }
  }

  fn endpoint(&self) -> String {
    format!(
      "{}/v1beta/models/{}:generateContent",
      self.base_url, self.model
    )
  }
}

#[async_trait]
impl Generator for GeminiClient {
  async fn generate(&self, prompt: &str) -> Result<String> {
    let api_key = self.api_key.as_deref().ok_or_else(|| {
      Error::Configuration(
        "Generator API key not found. Set NOTEFIE_GEMINI_API_KEY or GEMINI_API_KEY.".to_string(),
      )
    })?;

    let body = ApiGenerateRequest {
      contents: vec![ApiContent {
        parts: vec![ApiPart { text: prompt }],
      }],
    };

    debug!(model = %self.model, "requesting generation");
    let response = self
      .http
      .post(self.endpoint())
      .header("x-goog-api-key", api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| Error::Generation(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let message = response
        .json::<ApiErrorEnvelope>()
        .await
        .map(|e| e.error.message)
        .unwrap_or_else(|_| status.to_string());
      return Err(Error::Generation(message));
    }

    response
      .json::<ApiGenerateResponse>()
      .await
      .map_err(|e| Error::Generation(format!("Unexpected reply: {}", e)))?
      .into_text()
      .ok_or_else(|| Error::Generation("Model returned no text".to_string()))
  }
}

#[cfg(test)]
pub mod testing {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Generator fake that echoes a counter so repeated calls differ
  #[derive(Default)]
  pub struct EchoGenerator {
    calls: AtomicUsize,
    pub fail: bool,
  }

  impl EchoGenerator {
    pub fn failing() -> Self {
      Self {
        calls: AtomicUsize::new(0),
        fail: true,
      }
    }

    pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
      let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
      if self.fail {
        return Err(Error::Generation("quota exceeded".to_string()));
      }
      let title = prompt
        .lines()
        .find_map(|l| l.strip_prefix("Title: "))
        .unwrap_or("");
      Ok(format!("Explanation #{} of {}", n, title))
    }
  }
}

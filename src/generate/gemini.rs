use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

use super::client::{ModelBackend, ModelRequest};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct GeminiBackend {
    http: Client,
    base_url: String,
}

impl GeminiBackend {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }
}

fn transport_error(error: reqwest::Error) -> PipelineError {
    if error.is_timeout() {
        PipelineError::Upstream(format!(
            "request timed out after {}s",
            REQUEST_TIMEOUT.as_secs()
        ))
    } else {
        PipelineError::Upstream(error.to_string())
    }
}

fn vendor_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| format!("HTTP {status}"))
}

fn response_text(body: &str) -> Result<String, PipelineError> {
    let response: GenerateResponse = serde_json::from_str(body).map_err(|error| {
        PipelineError::Upstream(format!("unexpected response envelope: {error}"))
    })?;

    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(PipelineError::Upstream(format!("prompt was blocked: {reason}")));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(PipelineError::Upstream("model returned no candidates".to_owned()));
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_owned());
        return Err(PipelineError::Upstream(format!(
            "model returned no content (finish reason: {reason})"
        )));
    }

    Ok(text)
}

impl ModelBackend for GeminiBackend {
    fn complete(&self, request: &ModelRequest<'_>) -> Result<String, PipelineError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model.id());
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part {
                    text: request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: request.sampling.temperature,
                top_p: request.sampling.top_p,
                top_k: request.sampling.top_k,
            },
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", request.credential)
            .json(&body)
            .send()
            .map_err(transport_error)?;
        let status = response.status();
        let text = response.text().map_err(transport_error)?;

        if !status.is_success() {
            return Err(PipelineError::Upstream(vendor_message(status, &text)));
        }

        response_text(&text)
    }

    fn validate_credential(&self, credential: &str) -> Result<bool, PipelineError> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .query(&[("pageSize", "1")])
            .header("x-goog-api-key", credential)
            .timeout(VALIDATION_TIMEOUT)
            .send()
            .map_err(transport_error)?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            status => {
                let body = response.text().unwrap_or_default();
                Err(PipelineError::Upstream(vendor_message(status, &body)))
            }
        }
    }
}

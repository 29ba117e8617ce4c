use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{ModelChoice, SAMPLING, Sampling, Settings};
use crate::error::PipelineError;
use crate::graph::Graph;

use super::parse::parse_graph;
use super::prompt::build_prompt;

#[derive(Clone, Copy, Debug)]
pub struct ModelRequest<'a> {
    pub model: ModelChoice,
    pub prompt: &'a str,
    pub credential: &'a str,
    pub sampling: Sampling,
}

pub trait ModelBackend: Send + Sync {
    fn complete(&self, request: &ModelRequest<'_>) -> Result<String, PipelineError>;

    fn validate_credential(&self, credential: &str) -> Result<bool, PipelineError>;
}

#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn ModelBackend>,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    pub fn generate(&self, article: &str, settings: &Settings) -> Result<Graph, PipelineError> {
        let Some(credential) = settings.credential() else {
            return Err(PipelineError::Configuration(
                "No Gemini API key configured. Enter one in the controls panel or set \
                 GEMINI_API_KEY."
                    .to_owned(),
            ));
        };

        let started = Instant::now();
        let prompt = build_prompt(article, settings.depth);
        info!(
            model = settings.model.id(),
            depth = settings.depth.label(),
            prompt_chars = prompt.len(),
            "requesting graph"
        );

        let raw = self.backend.complete(&ModelRequest {
            model: settings.model,
            prompt: &prompt,
            credential,
            sampling: SAMPLING,
        })?;
        info!(
            model = settings.model.id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[timing] model response"
        );
        debug!(raw = raw.as_str(), "raw model response");

        let graph = parse_graph(&raw).inspect_err(|error| {
            if let PipelineError::MalformedResponse { message, raw } = error {
                warn!(reason = message.as_str(), raw = raw.as_str(), "unusable model response");
            }
        })?;

        info!(
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[timing] graph generated"
        );
        Ok(graph)
    }

    pub fn validate_credential(&self, credential: &str) -> Result<bool, PipelineError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Ok(false);
        }
        self.backend.validate_credential(credential)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("malformed response: {message}")]
    MalformedResponse {
        message: String,
        raw: String,
    },

    #[error("insufficient content: generated graph has {nodes} node(s), at least {minimum} required")]
    InsufficientContent { nodes: usize, minimum: usize },

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("a graph is already being generated for {0}")]
    InFlight(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn malformed(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
            raw: raw.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(message) => message.clone(),
            Self::Extraction(message) => format!(
                "{message} Navigate to a page with a readable article and try again."
            ),
            Self::Upstream(message) => format!("The model request failed: {message}"),
            Self::MalformedResponse { .. } => {
                "The AI returned a malformed graph. Please try regenerating.".to_owned()
            }
            Self::InsufficientContent { .. } => "Insufficient content: the article does not \
                contain enough concepts to generate a meaningful graph."
                .to_owned(),
            Self::Messaging(_) => "Failed to process the article.".to_owned(),
            Self::InFlight(_) => "A graph is already being generated for this page.".to_owned(),
            Self::Storage(error) => format!("The graph could not be saved: {error:#}"),
        }
    }
}

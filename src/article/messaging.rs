use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::PipelineError;

use super::source::Citation;

pub const RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentRequest {
    ExtractText,
    FindText(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentReply {
    Text(Option<String>),
    Found(Option<Citation>),
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("receiving end does not exist")]
    NotReady,
    #[error("{0}")]
    Failed(String),
}

pub trait ContentEndpoint: Send {
    fn deliver(&mut self, request: &ContentRequest) -> Result<ContentReply, DeliveryError>;

    fn install(&mut self) -> Result<(), DeliveryError>;
}

pub type SharedEndpoint = Arc<Mutex<dyn ContentEndpoint>>;

pub fn send_with_retry(
    endpoint: &mut dyn ContentEndpoint,
    request: &ContentRequest,
    retry_delay: Duration,
) -> Result<ContentReply, PipelineError> {
    match endpoint.deliver(request) {
        Ok(reply) => return Ok(reply),
        Err(DeliveryError::NotReady) => {
            debug!(?request, "content receiver not ready, installing");
        }
        Err(error) => return Err(PipelineError::Messaging(error.to_string())),
    }

    endpoint
        .install()
        .map_err(|error| PipelineError::Messaging(format!("failed to install receiver: {error}")))?;
    thread::sleep(retry_delay);

    endpoint
        .deliver(request)
        .map_err(|error| PipelineError::Messaging(error.to_string()))
}

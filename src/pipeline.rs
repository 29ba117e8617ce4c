use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::article::{Citation, SharedEndpoint, extract_article, locate_quote};
use crate::config::Settings;
use crate::error::PipelineError;
use crate::generate::GenerationClient;
use crate::graph::Graph;
use crate::store::GraphStore;

#[derive(Debug)]
pub enum Message {
    RequestExtraction {
        source_key: String,
        settings: Settings,
    },
    ExtractionComplete { source_key: String, chars: usize },
    GraphReady {
        source_key: String,
        graph: Graph,
        revision: u64,
    },
    Error {
        source_key: Option<String>,
        message: String,
    },
    ValidateCredential {
        credential: String,
        reply: Sender<bool>,
    },
    LocateQuote {
        node_id: String,
        quote: String,
    },
    QuoteLocated {
        node_id: String,
        citation: Option<Citation>,
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestExtraction { .. } => "request-extraction",
            Self::ExtractionComplete { .. } => "extraction-complete",
            Self::GraphReady { .. } => "graph-ready",
            Self::Error { .. } => "error",
            Self::ValidateCredential { .. } => "validate-credential",
            Self::LocateQuote { .. } => "locate-quote",
            Self::QuoteLocated { .. } => "quote-located",
        }
    }
}

#[derive(Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<String>>>,
}

pub struct InFlightToken {
    active: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl InFlight {
    pub fn try_begin(&self, key: &str) -> Result<InFlightToken, PipelineError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.to_owned()) {
            return Err(PipelineError::InFlight(key.to_owned()));
        }
        Ok(InFlightToken {
            active: Arc::clone(&self.active),
            key: key.to_owned(),
        })
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

pub fn run_pipeline(
    client: &GenerationClient,
    store: &GraphStore,
    endpoint: &SharedEndpoint,
    source_key: &str,
    settings: &Settings,
    events: &Sender<Message>,
) -> Result<(Graph, u64), PipelineError> {
    let started = Instant::now();

    let article = extract_article(endpoint)?;
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "[timing] extraction"
    );
    let _ = events.send(Message::ExtractionComplete {
        source_key: source_key.to_owned(),
        chars: article.chars().count(),
    });

    let graph = client.generate(&article, settings)?;
    let revision = store.set(source_key, &graph)?;

    info!(
        source = source_key,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "[timing] pipeline total"
    );
    Ok((graph, revision))
}

#[derive(Clone)]
pub struct Background {
    client: GenerationClient,
    store: Arc<GraphStore>,
    endpoint: SharedEndpoint,
    in_flight: InFlight,
    events: Sender<Message>,
}

impl Background {
    pub fn new(
        client: GenerationClient,
        store: Arc<GraphStore>,
        endpoint: SharedEndpoint,
    ) -> (Self, Receiver<Message>) {
        let (events, rx) = mpsc::channel();
        (
            Self {
                client,
                store,
                endpoint,
                in_flight: InFlight::default(),
                events,
            },
            rx,
        )
    }

    pub fn is_generating(&self, source_key: &str) -> bool {
        self.in_flight.is_running(source_key)
    }

    pub fn dispatch(&self, message: Message) -> Result<(), PipelineError> {
        match message {
            Message::RequestExtraction {
                source_key,
                settings,
            } => {
                let token = self.in_flight.try_begin(&source_key)?;
                let worker = self.clone();
                thread::spawn(move || {
                    let _token = token;
                    worker.generate(source_key, settings);
                });
                Ok(())
            }
            Message::ValidateCredential { credential, reply } => {
                let worker = self.clone();
                thread::spawn(move || {
                    let valid = worker.validate(&credential);
                    let _ = reply.send(valid);
                });
                Ok(())
            }
            Message::LocateQuote { node_id, quote } => {
                let worker = self.clone();
                thread::spawn(move || worker.locate(node_id, &quote));
                Ok(())
            }
            other => {
                warn!(kind = other.kind(), "ignoring message not meant for the background");
                Ok(())
            }
        }
    }

    fn generate(&self, source_key: String, settings: Settings) {
        let result = run_pipeline(
            &self.client,
            &self.store,
            &self.endpoint,
            &source_key,
            &settings,
            &self.events,
        );

        let message = match result {
            Ok((graph, revision)) => Message::GraphReady {
                source_key,
                graph,
                revision,
            },
            Err(failure) => {
                error!(source = source_key.as_str(), error = %failure, "graph generation failed");
                Message::Error {
                    source_key: Some(source_key),
                    message: failure.user_message(),
                }
            }
        };
        let _ = self.events.send(message);
    }

    fn locate(&self, node_id: String, quote: &str) {
        let citation = locate_quote(&self.endpoint, quote).unwrap_or_else(|failure| {
            warn!(node = node_id.as_str(), error = %failure, "quote lookup failed");
            None
        });
        let _ = self.events.send(Message::QuoteLocated { node_id, citation });
    }

    fn validate(&self, credential: &str) -> bool {
        match self.client.validate_credential(credential) {
            Ok(true) => {
                if let Err(failure) = self.store.set_credential(credential.trim()) {
                    error!(error = %failure, "failed to persist validated credential");
                }
                info!("credential validated");
                true
            }
            Ok(false) => {
                warn!("credential rejected by the model vendor");
                false
            }
            Err(failure) => {
                warn!(error = %failure, "credential could not be validated");
                false
            }
        }
    }
}

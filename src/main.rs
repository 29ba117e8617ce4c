mod app;
mod article;
mod config;
mod error;
mod generate;
mod graph;
mod pipeline;
mod store;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::article::{FileSource, SharedEndpoint};
use crate::config::{Depth, ModelChoice, Settings};
use crate::generate::{GeminiBackend, GenerationClient};
use crate::pipeline::Background;
use crate::store::GraphStore;

#[derive(Debug, Parser)]
#[command(author, version, about = "Turn an article into an editable knowledge graph")]
struct Args {
    #[arg(help = "Plain-text article to analyse")]
    article: PathBuf,

    #[arg(long, help = "Source identifier the graph is stored under, defaults to the article path")]
    url: Option<String>,

    #[arg(long, help = "Model id, unknown ids fall back to the default model")]
    model: Option<String>,

    #[arg(long, value_enum, default_value_t = Depth::Moderate)]
    depth: Depth,

    #[arg(long, default_value = "lexigraph-store.json")]
    store: PathBuf,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lexigraph=info")),
        )
        .init();

    let args = Args::parse();
    let store = match GraphStore::open(&args.store) {
        Ok(store) => store,
        Err(error) => {
            warn!(
                path = %args.store.display(),
                error = format!("{error:#}"),
                "store unavailable, graphs will not outlive this session"
            );
            GraphStore::in_memory()
        }
    };
    let store = Arc::new(store);
    info!(path = ?store.path(), "store ready");

    let settings = Settings {
        model: ModelChoice::resolve(args.model.as_deref()),
        depth: args.depth,
        credential: args
            .api_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| store.credential()),
    };
    let source_key = args
        .url
        .unwrap_or_else(|| args.article.display().to_string());
    info!(
        source = source_key.as_str(),
        model = settings.model.id(),
        depth = settings.depth.label(),
        "starting"
    );

    let endpoint: SharedEndpoint = Arc::new(Mutex::new(FileSource::new(&args.article)));
    let client = GenerationClient::new(Arc::new(GeminiBackend::new()?));
    let (background, events) = Background::new(client, Arc::clone(&store), endpoint);

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };
    eframe::run_native(
        "LexiGraph",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::LexiGraphApp::new(
                cc, source_key, settings, store, background, events,
            )))
        }),
    )
    .map_err(|error| anyhow!("failed to run the viewer: {error}"))
}

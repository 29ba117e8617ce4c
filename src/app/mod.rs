use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::Result;
use eframe::egui::{self, Context, Vec2};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::graph::{Graph, GraphModel};
use crate::pipeline::{Background, Message};
use crate::store::{GraphStore, Subscription};

mod citation;
mod edit;
mod graph;
mod highlight;
mod physics;
mod render_utils;
mod ui;

use citation::CitationLookup;
use edit::{EditController, WriteBack};
use physics::Simulation;
use ui::{ControlRequests, CredentialPanel};

const INITIAL_FIT_DELAY: Duration = Duration::from_millis(100);

pub struct LexiGraphApp {
    source_key: String,
    settings: Settings,
    store: Arc<GraphStore>,
    background: Background,
    events: Receiver<Message>,
    store_updates: Receiver<StoreUpdate>,
    _subscription: Subscription,
    credential: CredentialPanel,
    state: AppState,
    notice: Option<String>,
}

enum AppState {
    Welcome,
    Working { stage: &'static str, started: Instant },
    Ready(Box<ViewModel>),
    Error(String),
}

struct StoreUpdate {
    graph: Option<Graph>,
    revision: u64,
}

#[derive(Debug, PartialEq, Eq)]
enum StoreSync {
    Ignored,
    Replaced,
    Cleared,
}

struct ViewModel {
    model: GraphModel,
    simulation: Simulation,
    controller: EditController,
    citation: CitationLookup,
    background: Background,
    store: Arc<GraphStore>,
    source_key: String,
    loaded_revision: Option<u64>,
    own_revisions: HashSet<u64>,
    search: String,
    search_match_cache: Option<SearchMatchCache>,
    pan: Vec2,
    zoom: f32,
    fit_at: Option<Instant>,
    settle_handled: bool,
    edit_error: Option<String>,
}

struct SearchMatchCache {
    query: String,
    model_revision: u64,
    matches: HashSet<usize>,
}

struct LayoutWriteBack<'a> {
    store: &'a GraphStore,
    source_key: &'a str,
    simulation: &'a Simulation,
    own_revisions: &'a mut HashSet<u64>,
}

impl WriteBack for LayoutWriteBack<'_> {
    fn persist(&mut self, graph: &Graph) -> Result<u64> {
        let flat = self.simulation.flatten(graph);
        let revision = self.store.set(self.source_key, &flat)?;
        self.own_revisions.insert(revision);
        Ok(revision)
    }
}

impl LexiGraphApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        source_key: String,
        settings: Settings,
        store: Arc<GraphStore>,
        background: Background,
        events: Receiver<Message>,
    ) -> Self {
        let (tx, store_updates) = mpsc::channel();
        let repaint = cc.egui_ctx.clone();
        let subscription = store.subscribe(&source_key, move |change| {
            let _ = tx.send(StoreUpdate {
                graph: change.graph.cloned(),
                revision: change.revision,
            });
            repaint.request_repaint();
        });

        let state = match store.get(&source_key) {
            Some(graph) => {
                info!(source = source_key.as_str(), nodes = graph.nodes.len(), "restored stored graph");
                AppState::Ready(Box::new(ViewModel::new(
                    graph,
                    None,
                    Arc::clone(&store),
                    source_key.clone(),
                    background.clone(),
                )))
            }
            None => AppState::Welcome,
        };

        Self {
            credential: CredentialPanel::new(settings.credential().is_some()),
            source_key,
            settings,
            store,
            background,
            events,
            store_updates,
            _subscription: subscription,
            state,
            notice: None,
        }
    }

    fn request_generation(&mut self) {
        let message = Message::RequestExtraction {
            source_key: self.source_key.clone(),
            settings: self.settings.clone(),
        };
        match self.background.dispatch(message) {
            Ok(()) => {
                self.notice = None;
                self.state = AppState::Working {
                    stage: "Extracting article text...",
                    started: Instant::now(),
                };
            }
            Err(rejected) => {
                warn!(error = %rejected, "generation request rejected");
                self.notice = Some(rejected.user_message());
            }
        }
    }

    fn clear_stored_graph(&mut self) {
        match self.store.remove(&self.source_key) {
            Ok(removed) => {
                info!(source = self.source_key.as_str(), removed, "cleared stored graph");
                self.state = AppState::Welcome;
            }
            Err(failure) => {
                error!(error = %failure, "failed to clear stored graph");
                self.notice = Some(format!("Could not clear the stored graph: {failure:#}"));
            }
        }
    }

    fn show_graph(&mut self, graph: Graph, revision: u64) {
        match &mut self.state {
            AppState::Ready(view) => view.replace_graph(graph, Some(revision)),
            _ => {
                self.state = AppState::Ready(Box::new(ViewModel::new(
                    graph,
                    Some(revision),
                    Arc::clone(&self.store),
                    self.source_key.clone(),
                    self.background.clone(),
                )));
            }
        }
    }

    fn poll_background(&mut self) {
        loop {
            let message = match self.events.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.state = AppState::Error("Background worker disconnected".to_owned());
                    break;
                }
            };

            debug!(kind = message.kind(), "background message");
            match message {
                Message::ExtractionComplete { chars, .. } => {
                    if let AppState::Working { stage, .. } = &mut self.state {
                        *stage = "Generating knowledge graph...";
                    }
                    debug!(chars, "extraction complete");
                }
                Message::GraphReady {
                    source_key,
                    graph,
                    revision,
                } if source_key == self.source_key => {
                    if !self.is_current(revision) {
                        self.show_graph(graph, revision);
                    }
                }
                Message::Error { message, .. } => {
                    self.state = AppState::Error(message);
                }
                Message::QuoteLocated { node_id, citation } => {
                    if let AppState::Ready(view) = &mut self.state {
                        view.citation.finish(&node_id, citation, Instant::now());
                    }
                }
                _ => {}
            }
        }
    }

    fn poll_store(&mut self) {
        while let Ok(update) = self.store_updates.try_recv() {
            match &mut self.state {
                AppState::Ready(view) => {
                    if view.apply_store_update(update) == StoreSync::Cleared {
                        self.state = AppState::Welcome;
                    }
                }
                _ => {
                    if let Some(graph) = update.graph {
                        self.show_graph(graph, update.revision);
                    }
                }
            }
        }
    }

    fn is_current(&self, revision: u64) -> bool {
        matches!(&self.state, AppState::Ready(view) if view.loaded_revision == Some(revision))
    }

    fn apply_requests(&mut self, requests: ControlRequests) {
        if let Some(credential) = requests.validate_credential {
            let (reply, answer) = mpsc::channel();
            if let Err(rejected) = self.background.dispatch(Message::ValidateCredential {
                credential: credential.clone(),
                reply,
            }) {
                warn!(error = %rejected, "credential validation not dispatched");
            } else {
                self.credential.start_check(credential, answer);
            }
        }
        if requests.clear {
            self.clear_stored_graph();
        }
        if requests.generate {
            self.request_generation();
        }
    }
}

impl eframe::App for LexiGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.poll_background();
        self.poll_store();
        if let Some(credential) = self.credential.poll() {
            self.settings.credential = Some(credential);
        }

        let busy = matches!(self.state, AppState::Working { .. })
            || self.background.is_generating(&self.source_key);
        let has_graph = matches!(self.state, AppState::Ready(_));

        ui::draw_top_bar(ctx, &self.source_key, &self.state, self.notice.as_deref());

        let mut requests = ControlRequests::default();
        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| {
                let search = match &mut self.state {
                    AppState::Ready(view) => Some(&mut view.search),
                    _ => None,
                };
                requests = ui::draw_controls(
                    ui,
                    &mut self.settings,
                    &mut self.credential,
                    search,
                    busy,
                    has_graph,
                );
            });

        match &mut self.state {
            AppState::Welcome => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("No graph for this article yet");
                        ui.add_space(6.0);
                        ui.label("Pick a model and depth, then generate a knowledge graph.");
                        ui.add_space(10.0);
                        if ui.add_enabled(!busy, egui::Button::new("Generate graph")).clicked() {
                            requests.generate = true;
                        }
                    });
                });
            }
            AppState::Working { stage, started } => {
                let elapsed = started.elapsed().as_secs();
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading(*stage);
                        ui.add_space(8.0);
                        ui.spinner();
                        ui.small(format!("{elapsed}s"));
                    });
                });
                ctx.request_repaint_after(Duration::from_millis(250));
            }
            AppState::Error(message) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Could not build a graph");
                        ui.add_space(6.0);
                        ui.label(message.as_str());
                        ui.add_space(10.0);
                        if ui.add_enabled(!busy, egui::Button::new("Retry")).clicked() {
                            requests.generate = true;
                        }
                    });
                });
            }
            AppState::Ready(view) => view.show(ctx),
        }

        self.apply_requests(requests);
    }
}

impl ViewModel {
    fn new(
        graph: Graph,
        revision: Option<u64>,
        store: Arc<GraphStore>,
        source_key: String,
        background: Background,
    ) -> Self {
        let model = GraphModel::new(graph);
        let simulation = Simulation::new(&model);
        Self {
            model,
            simulation,
            controller: EditController::default(),
            citation: CitationLookup::default(),
            background,
            store,
            source_key,
            loaded_revision: revision,
            own_revisions: HashSet::new(),
            search: String::new(),
            search_match_cache: None,
            pan: Vec2::ZERO,
            zoom: 1.0,
            fit_at: Some(Instant::now() + INITIAL_FIT_DELAY),
            settle_handled: false,
            edit_error: None,
        }
    }

    fn replace_graph(&mut self, graph: Graph, revision: Option<u64>) {
        self.model.replace(graph);
        self.simulation = Simulation::new(&self.model);
        self.controller.revalidate(&self.model);
        self.citation.reset();
        self.search_match_cache = None;
        self.loaded_revision = revision;
        self.fit_at = Some(Instant::now() + INITIAL_FIT_DELAY);
        self.settle_handled = false;
        self.edit_error = None;
    }

    fn apply_store_update(&mut self, update: StoreUpdate) -> StoreSync {
        if self.loaded_revision == Some(update.revision)
            || self.own_revisions.remove(&update.revision)
        {
            return StoreSync::Ignored;
        }
        match update.graph {
            Some(graph) => {
                debug!(revision = update.revision, "external store update");
                self.replace_graph(graph, Some(update.revision));
                StoreSync::Replaced
            }
            None => StoreSync::Cleared,
        }
    }

    fn persist_layout(&mut self) {
        let mut writer = LayoutWriteBack {
            store: &self.store,
            source_key: &self.source_key,
            simulation: &self.simulation,
            own_revisions: &mut self.own_revisions,
        };
        if let Err(failure) = writer.persist(self.model.graph()) {
            warn!(error = %failure, "failed to persist settled layout");
        }
    }

    fn save_edit(&mut self) {
        let mut writer = LayoutWriteBack {
            store: &self.store,
            source_key: &self.source_key,
            simulation: &self.simulation,
            own_revisions: &mut self.own_revisions,
        };
        self.edit_error = match self.controller.save(&mut self.model, &mut writer) {
            Ok(_) => None,
            Err(failure) => {
                error!(error = %failure, "failed to save edit");
                Some(format!("{failure:#}"))
            }
        };
    }

    fn show(&mut self, ctx: &Context) {
        if ctx.input(|input| input.key_pressed(egui::Key::Escape)) {
            self.controller.escape();
            self.citation.reset();
        }
        if self.citation.tick(Instant::now()) {
            ctx.request_repaint_after(Duration::from_millis(200));
        }

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui));
    }
}

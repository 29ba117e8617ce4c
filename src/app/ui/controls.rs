use std::sync::mpsc::{Receiver, TryRecvError};

use eframe::egui::{self, RichText, Ui};
use tracing::warn;

use crate::config::{Depth, ModelChoice, Settings};

#[derive(Default)]
pub(in crate::app) struct ControlRequests {
    pub(in crate::app) generate: bool,
    pub(in crate::app) clear: bool,
    pub(in crate::app) validate_credential: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CredentialStatus {
    Missing,
    Configured,
    Checking,
    Valid,
    Invalid,
}

pub(in crate::app) struct CredentialPanel {
    draft: String,
    status: CredentialStatus,
    pending: Option<(String, Receiver<bool>)>,
}

impl CredentialPanel {
    pub(in crate::app) fn new(configured: bool) -> Self {
        Self {
            draft: String::new(),
            status: if configured {
                CredentialStatus::Configured
            } else {
                CredentialStatus::Missing
            },
            pending: None,
        }
    }

    pub(in crate::app) fn start_check(&mut self, credential: String, answer: Receiver<bool>) {
        self.status = CredentialStatus::Checking;
        self.pending = Some((credential, answer));
    }

    pub(in crate::app) fn poll(&mut self) -> Option<String> {
        let (credential, answer) = self.pending.take()?;
        match answer.try_recv() {
            Ok(true) => {
                self.status = CredentialStatus::Valid;
                self.draft.clear();
                Some(credential)
            }
            Ok(false) => {
                self.status = CredentialStatus::Invalid;
                None
            }
            Err(TryRecvError::Empty) => {
                self.pending = Some((credential, answer));
                None
            }
            Err(TryRecvError::Disconnected) => {
                warn!("credential check dropped without an answer");
                self.status = CredentialStatus::Invalid;
                None
            }
        }
    }

    fn status_text(&self) -> RichText {
        match self.status {
            CredentialStatus::Missing => RichText::new("No API key configured").weak(),
            CredentialStatus::Configured => RichText::new("API key configured"),
            CredentialStatus::Checking => RichText::new("Checking key..."),
            CredentialStatus::Valid => {
                RichText::new("Key verified").color(egui::Color32::from_rgb(16, 185, 129))
            }
            CredentialStatus::Invalid => {
                RichText::new("Key rejected").color(egui::Color32::from_rgb(239, 68, 68))
            }
        }
    }
}

pub(in crate::app) fn draw_controls(
    ui: &mut Ui,
    settings: &mut Settings,
    credential: &mut CredentialPanel,
    search: Option<&mut String>,
    busy: bool,
    has_graph: bool,
) -> ControlRequests {
    let mut requests = ControlRequests::default();

    ui.heading("Generation");
    ui.add_space(4.0);

    egui::ComboBox::from_label("Model")
        .selected_text(settings.model.id())
        .show_ui(ui, |ui| {
            for choice in ModelChoice::ALL {
                ui.selectable_value(&mut settings.model, choice, choice.id());
            }
        });

    ui.horizontal(|ui| {
        ui.label("Depth");
        for depth in Depth::ALL {
            ui.radio_value(&mut settings.depth, depth, depth.label());
        }
    });
    let (min_nodes, max_nodes) = settings.depth.node_range();
    ui.small(format!("about {min_nodes}-{max_nodes} concepts"));

    ui.add_space(6.0);
    ui.horizontal(|ui| {
        let label = if has_graph { "Regenerate" } else { "Generate" };
        if ui.add_enabled(!busy, egui::Button::new(label)).clicked() {
            requests.generate = true;
        }
        if ui
            .add_enabled(has_graph && !busy, egui::Button::new("Clear stored graph"))
            .clicked()
        {
            requests.clear = true;
        }
        if busy {
            ui.spinner();
        }
    });

    ui.separator();
    ui.label(RichText::new("Gemini API key").strong());
    ui.add(
        egui::TextEdit::singleline(&mut credential.draft)
            .password(true)
            .hint_text("paste a key to replace the current one"),
    );
    ui.horizontal(|ui| {
        let checking = credential.status == CredentialStatus::Checking;
        let can_check = !checking && !credential.draft.trim().is_empty();
        if ui.add_enabled(can_check, egui::Button::new("Validate & save")).clicked() {
            requests.validate_credential = Some(credential.draft.trim().to_owned());
        }
        ui.label(credential.status_text());
    });

    if let Some(search) = search {
        ui.separator();
        ui.label(RichText::new("Search").strong());
        ui.add(egui::TextEdit::singleline(search).hint_text("fuzzy match on concept labels"));
    }

    requests
}

use std::time::Instant;

use eframe::egui::{self, Color32, RichText, Ui};
use tracing::warn;

use super::super::ViewModel;
use super::super::citation::CitationStatus;
use super::super::edit::Interaction;
use crate::pipeline::Message;

enum DetailAction {
    Close,
    SelectNode(String),
    BeginSummary,
    BeginQuote,
    BeginReason(String),
    Save,
    Cancel,
    JumpToSource { node_id: String, quote: String },
}

struct NeighborRow {
    link_index: usize,
    id: String,
    label: String,
    reason: String,
}

fn save_cancel_buttons(ui: &mut Ui, action: &mut Option<DetailAction>) {
    ui.horizontal(|ui| {
        if ui.button("Save").clicked() {
            *action = Some(DetailAction::Save);
        }
        if ui.button("Cancel").clicked() {
            *action = Some(DetailAction::Cancel);
        }
    });
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Details");
        ui.add_space(6.0);

        let mut action = None;
        let state = self.controller.state().clone();
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| match &state {
                Interaction::Idle => {
                    ui.label("Select a concept or a connection in the graph.");
                }
                Interaction::LinkSelected { link_index } => {
                    self.draw_link_details(ui, *link_index, &mut action);
                }
                _ => self.draw_node_details(ui, &state, &mut action),
            });

        if let Some(error) = &self.edit_error {
            ui.separator();
            ui.colored_label(Color32::from_rgb(239, 68, 68), error.as_str());
        }

        if let Some(action) = action {
            self.apply_detail_action(action);
        }
    }

    fn draw_link_details(&self, ui: &mut Ui, link_index: usize, action: &mut Option<DetailAction>) {
        let Some(link) = self.model.graph().links.get(link_index) else {
            ui.label("This connection no longer exists.");
            return;
        };
        let label = |id: &str| {
            self.model
                .node(id)
                .map_or_else(|| id.to_owned(), |node| node.label.clone())
        };

        ui.label(RichText::new("Connection").strong());
        ui.horizontal_wrapped(|ui| {
            if ui.link(label(&link.source)).clicked() {
                *action = Some(DetailAction::SelectNode(link.source.clone()));
            }
            ui.label("->");
            if ui.link(label(&link.target)).clicked() {
                *action = Some(DetailAction::SelectNode(link.target.clone()));
            }
        });
        ui.add_space(4.0);
        if link.reason.is_empty() {
            ui.label(RichText::new("No reason given.").weak());
        } else {
            ui.label(link.reason.as_str());
        }

        ui.add_space(8.0);
        if ui.button("Close").clicked() {
            *action = Some(DetailAction::Close);
        }
    }

    fn draw_node_details(
        &mut self,
        ui: &mut Ui,
        state: &Interaction,
        action: &mut Option<DetailAction>,
    ) {
        let Some(node) = self.controller.selected_node(&self.model).cloned() else {
            ui.label("The selected concept no longer exists in the graph.");
            return;
        };
        let is_root = self.model.root().is_some_and(|root| root.id == node.id);
        let neighbors: Vec<NeighborRow> = self
            .model
            .neighbors_of(&node.id)
            .into_iter()
            .map(|neighbor| NeighborRow {
                link_index: neighbor.link_index,
                id: neighbor.node.id.clone(),
                label: neighbor.node.label.clone(),
                reason: neighbor.reason.to_owned(),
            })
            .collect();

        ui.label(RichText::new(node.label.as_str()).strong().size(18.0));
        ui.horizontal(|ui| {
            if is_root {
                ui.label(RichText::new("root topic").color(Color32::from_rgb(245, 206, 93)));
            } else {
                ui.small(format!("group {}", node.group));
            }
            ui.small(format!("connections: {}", self.model.degree(&node.id)));
        });

        ui.separator();
        ui.label(RichText::new("Summary").strong());
        if matches!(state, Interaction::EditingSummary { .. }) {
            if let Some(draft) = self.controller.draft_mut() {
                ui.add(egui::TextEdit::multiline(draft).desired_rows(4));
            }
            save_cancel_buttons(ui, action);
        } else {
            if node.summary.is_empty() {
                ui.label(RichText::new("No summary.").weak());
            } else {
                ui.label(node.summary.as_str());
            }
            if ui.small_button("Edit summary").clicked() {
                *action = Some(DetailAction::BeginSummary);
            }
        }

        ui.separator();
        ui.label(RichText::new("Source quote").strong());
        if matches!(state, Interaction::EditingQuote { .. }) {
            if let Some(draft) = self.controller.draft_mut() {
                ui.add(egui::TextEdit::multiline(draft).desired_rows(3));
            }
            save_cancel_buttons(ui, action);
        } else {
            if node.source_quote.is_empty() {
                ui.label(RichText::new("No quote.").weak());
            } else {
                ui.label(RichText::new(format!("\"{}\"", node.source_quote)).italics());
            }
            ui.horizontal(|ui| {
                if ui.small_button("Edit quote").clicked() {
                    *action = Some(DetailAction::BeginQuote);
                }
                if ui.small_button("Jump to source").clicked() {
                    *action = Some(DetailAction::JumpToSource {
                        node_id: node.id.clone(),
                        quote: node.source_quote.clone(),
                    });
                }
            });
            match self.citation.status_for(&node.id) {
                CitationStatus::Found { citation, .. } => {
                    ui.horizontal_wrapped(|ui| {
                        ui.spacing_mut().item_spacing.x = 0.0;
                        ui.label(RichText::new(format!("...{}", citation.before)).weak());
                        ui.label(
                            RichText::new(citation.quote.as_str())
                                .strong()
                                .background_color(Color32::from_rgb(113, 63, 18)),
                        );
                        ui.label(RichText::new(format!("{}...", citation.after)).weak());
                    });
                }
                CitationStatus::NotFound { .. } => {
                    ui.colored_label(
                        Color32::from_rgb(245, 158, 11),
                        "Quote not found in the article.",
                    );
                }
                CitationStatus::Searching { .. } => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.small("Searching the article...");
                    });
                }
                CitationStatus::Idle => {}
            }
        }

        ui.separator();
        ui.label(RichText::new("Connections").strong());
        if neighbors.is_empty() {
            ui.label(RichText::new("Not connected to anything.").weak());
        }
        let editing_link = self.controller.editing_link(&self.model);
        for neighbor in &neighbors {
            ui.add_space(4.0);
            if ui.link(neighbor.label.as_str()).clicked() {
                *action = Some(DetailAction::SelectNode(neighbor.id.clone()));
            }
            if editing_link == Some(neighbor.link_index) {
                if let Some(draft) = self.controller.draft_mut() {
                    ui.add(egui::TextEdit::multiline(draft).desired_rows(2));
                }
                save_cancel_buttons(ui, action);
            } else {
                ui.horizontal_wrapped(|ui| {
                    if neighbor.reason.is_empty() {
                        ui.label(RichText::new("No reason given.").weak());
                    } else {
                        ui.label(neighbor.reason.as_str());
                    }
                    if ui.small_button("Edit").clicked() {
                        *action = Some(DetailAction::BeginReason(neighbor.id.clone()));
                    }
                });
            }
        }

        ui.add_space(8.0);
        if ui.button("Close").clicked() {
            *action = Some(DetailAction::Close);
        }
    }

    fn apply_detail_action(&mut self, action: DetailAction) {
        if !matches!(action, DetailAction::Save) {
            self.edit_error = None;
        }
        match action {
            DetailAction::Close => {
                self.controller.escape();
                self.citation.reset();
            }
            DetailAction::SelectNode(node_id) => {
                self.controller.select_node(&node_id);
                self.citation.reset();
            }
            DetailAction::BeginSummary => {
                self.controller.begin_summary_edit(&self.model);
            }
            DetailAction::BeginQuote => {
                self.controller.begin_quote_edit(&self.model);
            }
            DetailAction::BeginReason(neighbor_id) => {
                self.controller.begin_reason_edit(&self.model, &neighbor_id);
            }
            DetailAction::Save => self.save_edit(),
            DetailAction::Cancel => self.controller.cancel(),
            DetailAction::JumpToSource { node_id, quote } => {
                if !self.citation.begin(&node_id, &quote, Instant::now()) {
                    return;
                }
                let request = Message::LocateQuote {
                    node_id: node_id.clone(),
                    quote,
                };
                if let Err(rejected) = self.background.dispatch(request) {
                    warn!(error = %rejected, "quote lookup not dispatched");
                    self.citation.finish(&node_id, None, Instant::now());
                }
            }
        }
    }
}

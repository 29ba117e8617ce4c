use eframe::egui::{self, Align, Context, Layout, RichText};

use super::super::AppState;

pub(in crate::app) fn draw_top_bar(
    ctx: &Context,
    source_key: &str,
    state: &AppState,
    notice: Option<&str>,
) {
    egui::TopBottomPanel::top("top_bar")
        .resizable(false)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("LexiGraph");
                ui.separator();
                ui.label(format!("source: {source_key}"));

                if let AppState::Ready(view) = state {
                    ui.separator();
                    if let Some(root) = view.model.root() {
                        ui.label(format!("root: {}", root.label));
                    }
                    ui.label(format!("nodes: {}", view.model.node_count()));
                    ui.label(format!("links: {}", view.model.link_count()));
                }

                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                    if let Some(notice) = notice {
                        ui.label(RichText::new(notice).color(egui::Color32::from_rgb(245, 158, 11)));
                    }
                    if let AppState::Ready(view) = state
                        && !view.simulation.is_settled()
                    {
                        ui.small(format!("layout tick {}", view.simulation.ticks()));
                    }
                });
            });
        });
}

use std::collections::HashSet;
use std::time::Instant;

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Sense, Stroke, Ui, vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use tracing::debug;

use super::super::highlight::build_highlight_state;
use super::super::render_utils::{
    blend_color, circle_visible, dim_color, draw_arrow, draw_background, group_color, node_radius,
    world_to_screen,
};
use super::super::{SearchMatchCache, ViewModel};
use super::interaction::Hit;

const LABEL_ZOOM: f32 = 1.5;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

impl ViewModel {
    fn search_matches(&mut self) -> Option<&HashSet<usize>> {
        if self.controller.state().node_id().is_some()
            || self.controller.state().link_index().is_some()
        {
            return None;
        }
        let query = self.search.trim();
        if query.is_empty() {
            return None;
        }

        let stale = self.search_match_cache.as_ref().is_none_or(|cached| {
            cached.model_revision != self.model.revision() || cached.query != query
        });
        if stale {
            let matcher = SkimMatcherV2::default();
            let matches = self
                .model
                .graph()
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| fuzzy_match_score(&matcher, &node.label, query).is_some())
                .map(|(index, _)| index)
                .collect();
            self.search_match_cache = Some(SearchMatchCache {
                query: query.to_owned(),
                model_revision: self.model.revision(),
                matches,
            });
        }
        self.search_match_cache.as_ref().map(|cached| &cached.matches)
    }

    fn advance_layout(&mut self, ui: &Ui, rect: egui::Rect) {
        if self.simulation.model_revision() != self.model.revision() {
            self.simulation = super::super::Simulation::new(&self.model);
            self.settle_handled = false;
        }

        if self.simulation.tick() {
            ui.ctx().request_repaint();
        } else if !self.settle_handled {
            self.settle_handled = true;
            debug!(ticks = self.simulation.ticks(), "layout settled");
            self.fit_to_view(rect);
            self.fit_at = None;
            self.persist_layout();
        }

        if let Some(at) = self.fit_at {
            if Instant::now() >= at {
                self.fit_to_view(rect);
                self.fit_at = None;
            } else {
                ui.ctx().request_repaint();
            }
        }
    }

    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.handle_graph_zoom(ui, rect, &response);
        self.handle_graph_pan(&response);
        self.advance_layout(ui, rect);
        draw_background(&painter, rect, self.pan, self.zoom);

        let (pan, zoom) = (self.pan, self.zoom);
        let radius_scale = zoom.powf(0.5);
        let screen_positions: Vec<Pos2> = self
            .simulation
            .positions()
            .iter()
            .map(|&world| world_to_screen(rect, pan, zoom, world))
            .collect();
        let screen_radii: Vec<f32> = (0..self.model.node_count())
            .map(|index| node_radius(self.model.normalized_degree_at(index)) * radius_scale)
            .collect();
        let links: Vec<Option<(usize, usize)>> = self
            .model
            .graph()
            .links
            .iter()
            .map(|link| Some((self.model.index_of(&link.source)?, self.model.index_of(&link.target)?)))
            .collect();

        let hovered = ui
            .input(|input| input.pointer.hover_pos())
            .filter(|pointer| rect.contains(*pointer))
            .and_then(|pointer| self.hit_test(pointer, &screen_positions, &screen_radii, &links));
        if hovered.is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
        }
        if response.clicked_by(egui::PointerButton::Primary) {
            self.apply_click(hovered);
        }

        let highlight = build_highlight_state(&self.model, self.controller.state());
        let selection_active = highlight.as_ref().is_some_and(|state| !state.is_empty());
        let search_matches = self.search_matches().cloned();
        let search_active = search_matches.as_ref().is_some_and(|matches| !matches.is_empty());

        let zoom_sqrt = zoom.sqrt();
        for (link_index, endpoints) in links.iter().enumerate() {
            let Some((source, target)) = *endpoints else {
                continue;
            };
            let (start, end) = (screen_positions[source], screen_positions[target]);
            if !rect.intersects(egui::Rect::from_two_pos(start, end).expand(4.0)) {
                continue;
            }

            let is_highlighted = highlight
                .as_ref()
                .is_some_and(|state| state.links.contains(&link_index));
            let is_hovered = hovered == Some(Hit::Link(link_index));
            let (width, color) = if is_highlighted || is_hovered {
                ((2.2 * zoom_sqrt).clamp(1.2, 4.0), Color32::from_rgb(241, 146, 94))
            } else if selection_active || search_active {
                ((0.8 * zoom_sqrt).clamp(0.4, 2.0), Color32::from_rgba_unmultiplied(113, 113, 122, 60))
            } else {
                ((1.1 * zoom_sqrt).clamp(0.6, 3.0), Color32::from_rgba_unmultiplied(113, 113, 122, 140))
            };
            draw_arrow(
                &painter,
                start,
                end,
                screen_radii[target],
                (4.0 * zoom_sqrt).clamp(3.0, 9.0),
                Stroke::new(width, color),
            );
        }

        let root = self.model.root_index();
        let selected_id = self.controller.state().node_id();
        for (index, node) in self.model.graph().nodes.iter().enumerate() {
            let (position, radius) = (screen_positions[index], screen_radii[index]);
            if !circle_visible(rect, position, radius + 80.0) {
                continue;
            }

            let is_selected = selected_id == Some(node.id.as_str());
            let is_hovered = hovered == Some(Hit::Node(index));
            let is_related = highlight
                .as_ref()
                .is_some_and(|state| state.nodes.contains(&index));
            let is_match = search_matches
                .as_ref()
                .is_some_and(|matches| matches.contains(&index));

            let base = group_color(node.group);
            let color = if is_hovered {
                blend_color(base, Color32::WHITE, 0.35)
            } else if is_related || is_match {
                base
            } else if selection_active {
                dim_color(base, 0.35)
            } else if search_active {
                dim_color(base, 0.45)
            } else {
                base
            };

            painter.circle_filled(position, radius, color);
            painter.circle_stroke(
                position,
                radius,
                Stroke::new(1.5, Color32::from_rgb(9, 9, 11)),
            );
            if is_selected {
                painter.circle_stroke(
                    position,
                    radius + 4.0,
                    Stroke::new(2.0, Color32::from_rgb(245, 206, 93)),
                );
            } else if is_match {
                painter.circle_stroke(
                    position,
                    radius + 3.0,
                    Stroke::new(1.5, Color32::from_rgb(103, 196, 255)),
                );
            }

            let show_label = zoom > LABEL_ZOOM
                || is_selected
                || is_hovered
                || is_related
                || is_match
                || Some(index) == root;
            if show_label {
                painter.text(
                    position + vec2(0.0, radius + 8.0),
                    Align2::CENTER_CENTER,
                    node.label.as_str(),
                    FontId::monospace(12.0),
                    Color32::from_rgb(228, 228, 231),
                );
            }
        }

        let hover_text = match hovered {
            Some(Hit::Node(index)) => self.model.graph().nodes.get(index).map(|node| {
                format!("{}  |  connections {}", node.label, self.model.degree_at(index))
            }),
            Some(Hit::Link(link_index)) => self.model.graph().links.get(link_index).map(|link| {
                let label = |id: &str| self.model.node(id).map_or(id.to_owned(), |node| node.label.clone());
                format!("{} -> {}", label(&link.source), label(&link.target))
            }),
            None => None,
        };
        if let Some(text) = hover_text {
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                text,
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }
    }
}

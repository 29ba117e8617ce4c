use eframe::egui::{self, Pos2, Rect, Ui, vec2};

use super::super::ViewModel;
use super::super::render_utils::{distance_to_segment, screen_to_world};

const MIN_ZOOM: f32 = 0.05;
const MAX_ZOOM: f32 = 8.0;
const FIT_PADDING: f32 = 20.0;
const PAN_BUTTONS: [egui::PointerButton; 2] =
    [egui::PointerButton::Secondary, egui::PointerButton::Middle];
const LINK_HIT_DISTANCE: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) enum Hit {
    Node(usize),
    Link(usize),
}

impl ViewModel {
    pub(super) fn handle_graph_zoom(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let world_before = screen_to_world(rect, self.pan, self.zoom, pointer);

        let factor = (1.0 + scroll * 0.0018).clamp(0.85, 1.15);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = pointer - rect.center() - world_before * self.zoom;
        self.fit_at = None;
    }

    pub(super) fn handle_graph_pan(&mut self, response: &egui::Response) {
        if PAN_BUTTONS
            .iter()
            .any(|&button| response.dragged_by(button))
        {
            self.pan += response.drag_delta();
            self.fit_at = None;
        }
    }

    pub(super) fn fit_to_view(&mut self, rect: Rect) {
        let Some(bounds) = self.simulation.bounds() else {
            return;
        };
        let available = rect.size() - vec2(FIT_PADDING, FIT_PADDING) * 2.0;
        let extent = bounds.size().max(vec2(1.0, 1.0));
        self.zoom = (available.x / extent.x)
            .min(available.y / extent.y)
            .clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = -bounds.center().to_vec2() * self.zoom;
    }

    pub(super) fn hit_test(
        &self,
        pointer: Pos2,
        screen_positions: &[Pos2],
        screen_radii: &[f32],
        links: &[Option<(usize, usize)>],
    ) -> Option<Hit> {
        let node = screen_positions
            .iter()
            .zip(screen_radii)
            .enumerate()
            .filter_map(|(index, (position, radius))| {
                let distance = position.distance(pointer);
                (distance <= radius.max(4.0)).then_some((index, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((index, _)) = node {
            return Some(Hit::Node(index));
        }

        links
            .iter()
            .enumerate()
            .filter_map(|(link_index, endpoints)| {
                let (source, target) = (*endpoints)?;
                let distance = distance_to_segment(
                    pointer,
                    *screen_positions.get(source)?,
                    *screen_positions.get(target)?,
                );
                (distance <= LINK_HIT_DISTANCE).then_some((link_index, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(link_index, _)| Hit::Link(link_index))
    }

    pub(super) fn apply_click(&mut self, hit: Option<Hit>) {
        match hit {
            Some(Hit::Node(index)) => {
                if let Some(node) = self.model.graph().nodes.get(index) {
                    let node_id = node.id.clone();
                    self.controller.select_node(&node_id);
                }
            }
            Some(Hit::Link(link_index)) => self.controller.select_link(link_index),
            None => self.controller.clear(),
        }
        self.citation.reset();
        self.edit_error = None;
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::PointerButton;

    use super::PAN_BUTTONS;

    #[test]
    fn primary_drag_does_not_pan() {
        assert!(!PAN_BUTTONS.contains(&PointerButton::Primary));
        assert!(PAN_BUTTONS.contains(&PointerButton::Secondary));
        assert!(PAN_BUTTONS.contains(&PointerButton::Middle));
    }
}

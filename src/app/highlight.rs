use std::collections::HashSet;

use crate::graph::GraphModel;

use super::edit::Interaction;

#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct HighlightState {
    pub(super) nodes: HashSet<usize>,
    pub(super) links: HashSet<usize>,
}

impl HighlightState {
    pub(super) fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

pub(super) fn build_highlight_state(
    model: &GraphModel,
    interaction: &Interaction,
) -> Option<HighlightState> {
    if let Some(link_index) = interaction.link_index() {
        let link = model.graph().links.get(link_index)?;
        let nodes = [&link.source, &link.target]
            .into_iter()
            .filter_map(|id| model.index_of(id))
            .collect();
        return Some(HighlightState {
            nodes,
            links: HashSet::from([link_index]),
        });
    }

    let node_id = interaction.node_id()?;
    let selected = model.index_of(node_id)?;
    let mut state = HighlightState::default();
    state.nodes.insert(selected);
    for neighbor in model.neighbors_of(node_id) {
        if let Some(index) = model.index_of(&neighbor.node.id) {
            state.nodes.insert(index);
        }
        state.links.insert(neighbor.link_index);
    }
    Some(state)
}

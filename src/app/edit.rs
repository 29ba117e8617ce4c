use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::graph::{Graph, GraphModel, Node};

pub trait WriteBack {
    fn persist(&mut self, graph: &Graph) -> Result<u64>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Interaction {
    #[default]
    Idle,
    NodeSelected {
        node_id: String,
    },
    LinkSelected {
        link_index: usize,
    },
    EditingSummary {
        node_id: String,
        draft: String,
    },
    EditingQuote {
        node_id: String,
        draft: String,
    },
    EditingReason {
        node_id: String,
        neighbor_id: String,
        draft: String,
    },
}

impl Interaction {
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeSelected { node_id }
            | Self::EditingSummary { node_id, .. }
            | Self::EditingQuote { node_id, .. }
            | Self::EditingReason { node_id, .. } => Some(node_id),
            Self::Idle | Self::LinkSelected { .. } => None,
        }
    }

    pub fn link_index(&self) -> Option<usize> {
        match self {
            Self::LinkSelected { link_index } => Some(*link_index),
            _ => None,
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(
            self,
            Self::EditingSummary { .. } | Self::EditingQuote { .. } | Self::EditingReason { .. }
        )
    }
}

#[derive(Default)]
pub struct EditController {
    state: Interaction,
}

impl EditController {
    pub fn state(&self) -> &Interaction {
        &self.state
    }

    pub fn select_node(&mut self, node_id: &str) {
        self.state = Interaction::NodeSelected {
            node_id: node_id.to_owned(),
        };
    }

    pub fn select_link(&mut self, link_index: usize) {
        self.state = Interaction::LinkSelected { link_index };
    }

    pub fn clear(&mut self) {
        self.state = Interaction::Idle;
    }

    pub fn revalidate(&mut self, model: &GraphModel) {
        let keep = match &self.state {
            Interaction::Idle => true,
            Interaction::NodeSelected { node_id } => model.node(node_id).is_some(),
            _ => false,
        };
        if !keep {
            debug!(state = ?self.state, "selection dropped after graph replacement");
            self.clear();
        }
    }

    pub fn selected_node<'a>(&self, model: &'a GraphModel) -> Option<&'a Node> {
        self.state.node_id().and_then(|node_id| model.node(node_id))
    }

    pub fn begin_summary_edit(&mut self, model: &GraphModel) -> bool {
        let Some(node) = self.selected_node(model) else {
            return false;
        };
        self.state = Interaction::EditingSummary {
            node_id: node.id.clone(),
            draft: node.summary.clone(),
        };
        true
    }

    pub fn begin_quote_edit(&mut self, model: &GraphModel) -> bool {
        let Some(node) = self.selected_node(model) else {
            return false;
        };
        self.state = Interaction::EditingQuote {
            node_id: node.id.clone(),
            draft: node.source_quote.clone(),
        };
        true
    }

    pub fn begin_reason_edit(&mut self, model: &GraphModel, neighbor_id: &str) -> bool {
        let Some(node_id) = self.state.node_id().map(str::to_owned) else {
            return false;
        };
        let Some(link_index) = model.link_between(&node_id, neighbor_id) else {
            return false;
        };
        self.state = Interaction::EditingReason {
            draft: model.graph().links[link_index].reason.clone(),
            node_id,
            neighbor_id: neighbor_id.to_owned(),
        };
        true
    }

    pub fn editing_link(&self, model: &GraphModel) -> Option<usize> {
        match &self.state {
            Interaction::EditingReason {
                node_id,
                neighbor_id,
                ..
            } => model.link_between(node_id, neighbor_id),
            _ => None,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut String> {
        match &mut self.state {
            Interaction::EditingSummary { draft, .. }
            | Interaction::EditingQuote { draft, .. }
            | Interaction::EditingReason { draft, .. } => Some(draft),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        if !self.state.is_editing() {
            return;
        }
        if let Some(node_id) = self.state.node_id().map(str::to_owned) {
            self.select_node(&node_id);
        }
    }

    pub fn escape(&mut self) {
        self.clear();
    }

    pub fn save(&mut self, model: &mut GraphModel, store: &mut dyn WriteBack) -> Result<Option<u64>> {
        let state = std::mem::take(&mut self.state);
        let node_id = match state {
            Interaction::EditingSummary { node_id, draft } => {
                if !model.set_summary(&node_id, &draft) {
                    bail!("node {node_id} no longer exists");
                }
                node_id
            }
            Interaction::EditingQuote { node_id, draft } => {
                if !model.set_source_quote(&node_id, &draft) {
                    bail!("node {node_id} no longer exists");
                }
                node_id
            }
            Interaction::EditingReason {
                node_id,
                neighbor_id,
                draft,
            } => {
                let Some(link_index) = model.link_between(&node_id, &neighbor_id) else {
                    self.select_node(&node_id);
                    bail!("{node_id} and {neighbor_id} are no longer connected");
                };
                model.set_link_reason(link_index, &draft);
                node_id
            }
            other => {
                self.state = other;
                return Ok(None);
            }
        };

        self.select_node(&node_id);
        let revision = store.persist(model.graph())?;
        info!(node = node_id.as_str(), revision, "edit saved");
        Ok(Some(revision))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::graph::Link;
    use crate::store::GraphStore;

    fn sample_model() -> GraphModel {
        GraphModel::new(Graph {
            nodes: vec![
                Node::new("root", "Root", 0),
                Node::new("p1", "Pillar", 1),
                Node::new("d1", "Detail", 2),
            ],
            links: vec![
                Link::new("p1", "root", "supports"),
                Link::new("d1", "p1", "explains"),
            ],
        })
    }

    struct StoreWriteBack<'a> {
        store: &'a GraphStore,
        key: &'a str,
    }

    impl WriteBack for StoreWriteBack<'_> {
        fn persist(&mut self, graph: &Graph) -> Result<u64> {
            self.store.set(self.key, graph)
        }
    }

    struct FailingWriteBack;

    impl WriteBack for FailingWriteBack {
        fn persist(&mut self, _graph: &Graph) -> Result<u64> {
            bail!("disk full")
        }
    }

    #[test]
    fn node_and_link_selection_are_exclusive() {
        let mut controller = EditController::default();

        controller.select_node("p1");
        assert_eq!(controller.state().node_id(), Some("p1"));

        controller.select_link(1);
        assert_eq!(controller.state().node_id(), None);
        assert_eq!(controller.state().link_index(), Some(1));

        controller.select_node("d1");
        assert_eq!(controller.state().link_index(), None);

        controller.clear();
        assert_eq!(controller.state(), &Interaction::Idle);
    }

    #[test]
    fn summary_edit_round_trips_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = GraphStore::open(&path).unwrap();
        let mut model = sample_model();
        let mut expected = model.graph().clone();
        expected.node_mut("p1").unwrap().summary = "Edited summary".to_owned();
        let mut controller = EditController::default();

        controller.select_node("p1");
        assert!(controller.begin_summary_edit(&model));
        *controller.draft_mut().unwrap() = "Edited summary".to_owned();
        let revision = controller
            .save(&mut model, &mut StoreWriteBack { store: &store, key: "k" })
            .unwrap();

        assert_eq!(revision, Some(1));
        assert_eq!(controller.state(), &Interaction::NodeSelected { node_id: "p1".to_owned() });
        assert_eq!(controller.selected_node(&model).unwrap().summary, "Edited summary");

        let reopened = GraphStore::open(&path).unwrap();
        let stored = reopened.get("k").unwrap();
        assert_eq!(stored.without_layout(), expected);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for link in raw["k"]["links"].as_array().unwrap() {
            assert!(link["source"].is_string());
            assert!(link["target"].is_string());
        }
    }

    #[test]
    fn reason_edit_finds_link_regardless_of_direction() {
        let store = GraphStore::in_memory();
        let mut model = sample_model();
        let mut controller = EditController::default();

        controller.select_node("root");
        assert!(controller.begin_reason_edit(&model, "p1"));
        assert_eq!(controller.editing_link(&model), Some(0));
        assert_eq!(controller.draft_mut().map(|draft| draft.clone()), Some("supports".to_owned()));
        *controller.draft_mut().unwrap() = "is the main pillar of".to_owned();
        controller
            .save(&mut model, &mut StoreWriteBack { store: &store, key: "k" })
            .unwrap();

        assert_eq!(model.graph().links[0].reason, "is the main pillar of");
        assert_eq!(store.get("k").unwrap().links[0].reason, "is the main pillar of");
    }

    #[test]
    fn reason_edit_needs_an_existing_connection() {
        let model = sample_model();
        let mut controller = EditController::default();
        controller.select_node("root");
        assert!(!controller.begin_reason_edit(&model, "d1"));
        assert_eq!(controller.state().node_id(), Some("root"));
    }

    #[test]
    fn cancel_discards_the_draft() {
        let store = GraphStore::in_memory();
        let mut model = sample_model();
        let mut controller = EditController::default();

        controller.select_node("d1");
        controller.begin_quote_edit(&model);
        *controller.draft_mut().unwrap() = "never saved".to_owned();
        controller.cancel();

        assert_eq!(controller.state(), &Interaction::NodeSelected { node_id: "d1".to_owned() });
        assert_eq!(model.node("d1").unwrap().source_quote, "");
        let saved = controller
            .save(&mut model, &mut StoreWriteBack { store: &store, key: "k" })
            .unwrap();
        assert_eq!(saved, None);
        assert!(store.get("k").is_none());
    }

    #[test]
    fn escape_closes_from_editing() {
        let model = sample_model();
        let mut controller = EditController::default();
        controller.select_node("p1");
        controller.begin_summary_edit(&model);

        controller.escape();

        assert_eq!(controller.state(), &Interaction::Idle);
        assert!(controller.draft_mut().is_none());
    }

    #[test]
    fn failed_persist_keeps_the_edit_in_the_model() {
        let mut model = sample_model();
        let mut controller = EditController::default();
        controller.select_node("p1");
        controller.begin_summary_edit(&model);
        *controller.draft_mut().unwrap() = "kept".to_owned();

        assert!(controller.save(&mut model, &mut FailingWriteBack).is_err());
        assert_eq!(model.node("p1").unwrap().summary, "kept");
        assert_eq!(controller.state().node_id(), Some("p1"));
    }

    #[test]
    fn replacing_the_graph_drops_link_selection_and_open_edits() {
        let mut model = sample_model();
        let mut controller = EditController::default();
        controller.select_link(0);
        model.replace(sample_model().graph().clone());
        controller.revalidate(&model);
        assert_eq!(controller.state(), &Interaction::Idle);

        controller.select_node("p1");
        controller.begin_summary_edit(&model);
        model.replace(sample_model().graph().clone());
        controller.revalidate(&model);
        assert_eq!(controller.state(), &Interaction::Idle);

        controller.select_node("p1");
        model.replace(sample_model().graph().clone());
        controller.revalidate(&model);
        assert_eq!(controller.state(), &Interaction::NodeSelected { node_id: "p1".to_owned() });
    }

    #[test]
    fn duplicate_connection_edits_only_the_first_link() {
        let mut model = GraphModel::new(Graph {
            nodes: vec![
                Node::new("root", "Root", 0),
                Node::new("p1", "Pillar", 1),
                Node::new("d1", "Detail", 2),
            ],
            links: vec![
                Link::new("root", "p1", "first"),
                Link::new("p1", "root", "second"),
            ],
        });
        let store = GraphStore::in_memory();
        let mut controller = EditController::default();
        controller.select_node("root");
        controller.begin_reason_edit(&model, "p1");

        let rows: Vec<usize> = model
            .neighbors_of("root")
            .iter()
            .map(|neighbor| neighbor.link_index)
            .filter(|&link_index| controller.editing_link(&model) == Some(link_index))
            .collect();
        assert_eq!(rows, vec![0]);

        *controller.draft_mut().unwrap() = "edited".to_owned();
        controller
            .save(&mut model, &mut StoreWriteBack { store: &store, key: "k" })
            .unwrap();
        assert_eq!(model.graph().links[0].reason, "edited");
        assert_eq!(model.graph().links[1].reason, "second");
    }

    #[test]
    fn revalidate_drops_vanished_selection() {
        let mut model = sample_model();
        let mut controller = EditController::default();
        controller.select_node("d1");

        model.replace(Graph {
            nodes: vec![
                Node::new("a", "A", 0),
                Node::new("b", "B", 0),
                Node::new("c", "C", 0),
            ],
            links: Vec::new(),
        });
        controller.revalidate(&model);

        assert_eq!(controller.state(), &Interaction::Idle);
    }
}

use std::collections::HashMap;

use super::types::{Graph, Node};

#[derive(Clone, Debug)]
pub struct Neighbor<'a> {
    pub node: &'a Node,
    pub reason: &'a str,
    pub link_index: usize,
}

#[derive(Clone, Debug)]
pub struct GraphModel {
    graph: Graph,
    index_by_id: HashMap<String, usize>,
    degrees: Vec<usize>,
    incident: Vec<Vec<usize>>,
    root_index: Option<usize>,
    max_degree: usize,
    revision: u64,
}

impl GraphModel {
    pub fn new(graph: Graph) -> Self {
        let mut model = Self {
            graph: Graph::default(),
            index_by_id: HashMap::new(),
            degrees: Vec::new(),
            incident: Vec::new(),
            root_index: None,
            max_degree: 0,
            revision: 0,
        };
        model.replace(graph);
        model
    }

    pub fn replace(&mut self, graph: Graph) {
        self.graph = graph;
        self.revision = self.revision.wrapping_add(1);
        self.recompute();
    }

    fn recompute(&mut self) {
        let node_count = self.graph.nodes.len();

        self.index_by_id.clear();
        self.index_by_id.reserve(node_count);
        for (index, node) in self.graph.nodes.iter().enumerate() {
            self.index_by_id.entry(node.id.clone()).or_insert(index);
        }

        self.degrees = vec![0; node_count];
        self.incident = vec![Vec::new(); node_count];
        for (link_index, link) in self.graph.links.iter().enumerate() {
            let source = self.index_by_id.get(&link.source).copied();
            let target = self.index_by_id.get(&link.target).copied();
            if let Some(source) = source {
                self.degrees[source] += 1;
                self.incident[source].push(link_index);
            }
            if let Some(target) = target {
                self.degrees[target] += 1;
                if source != Some(target) {
                    self.incident[target].push(link_index);
                }
            }
        }

        self.root_index = None;
        self.max_degree = 0;
        for (index, &degree) in self.degrees.iter().enumerate() {
            if self.root_index.is_none() || degree > self.max_degree {
                self.root_index = Some(index);
                self.max_degree = degree;
            }
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node_count(&self) -> usize {
        self.graph.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.graph.links.len()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|index| &self.graph.nodes[index])
    }

    pub fn degree(&self, id: &str) -> usize {
        self.index_of(id)
            .map(|index| self.degrees[index])
            .unwrap_or(0)
    }

    pub fn degree_at(&self, index: usize) -> usize {
        self.degrees.get(index).copied().unwrap_or(0)
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    pub fn normalized_degree_at(&self, index: usize) -> f32 {
        if self.max_degree == 0 {
            return 0.0;
        }
        self.degree_at(index) as f32 / self.max_degree as f32
    }

    pub fn root(&self) -> Option<&Node> {
        self.root_index.map(|index| &self.graph.nodes[index])
    }

    pub fn root_index(&self) -> Option<usize> {
        self.root_index
    }

    pub fn neighbors_of(&self, id: &str) -> Vec<Neighbor<'_>> {
        let Some(index) = self.index_of(id) else {
            return Vec::new();
        };

        self.incident[index]
            .iter()
            .filter_map(|&link_index| {
                let link = &self.graph.links[link_index];
                let other = link.other_end(id)?;
                let node = self.node(other)?;
                Some(Neighbor {
                    node,
                    reason: link.reason.as_str(),
                    link_index,
                })
            })
            .collect()
    }

    pub fn link_indices(&self) -> Vec<(usize, usize)> {
        self.graph
            .links
            .iter()
            .filter_map(|link| Some((self.index_of(&link.source)?, self.index_of(&link.target)?)))
            .collect()
    }

    pub fn link_between(&self, a: &str, b: &str) -> Option<usize> {
        let index = self.index_of(a)?;
        self.incident[index]
            .iter()
            .copied()
            .find(|&link_index| self.graph.links[link_index].connects(a, b))
    }

    pub fn set_summary(&mut self, id: &str, summary: &str) -> bool {
        match self.graph.node_mut(id) {
            Some(node) => {
                node.summary = summary.to_owned();
                true
            }
            None => false,
        }
    }

    pub fn set_source_quote(&mut self, id: &str, quote: &str) -> bool {
        match self.graph.node_mut(id) {
            Some(node) => {
                node.source_quote = quote.to_owned();
                true
            }
            None => false,
        }
    }

    pub fn set_link_reason(&mut self, link_index: usize, reason: &str) -> bool {
        match self.graph.links.get_mut(link_index) {
            Some(link) => {
                link.reason = reason.to_owned();
                true
            }
            None => false,
        }
    }
}

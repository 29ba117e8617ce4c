mod forces;
mod quadtree;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use eframe::egui::{Rect, Vec2, vec2};

use crate::graph::{Graph, GraphModel};
use forces::{Spring, apply_charge, apply_links, apply_radial};

pub const CHARGE_STRENGTH: f32 = -150.0;
pub const LINK_DISTANCE: f32 = 50.0;
pub const MIN_RADIUS: f32 = 60.0;
pub const MAX_RADIUS: f32 = 220.0;
pub const MAX_TICKS: u32 = 100;
pub const COOLDOWN: Duration = Duration::from_secs(3);

const RADIAL_STRENGTH: f32 = 0.1;
const BARNES_HUT_THETA: f32 = 0.9;
const ALPHA_MIN: f32 = 0.001;
const VELOCITY_DECAY: f32 = 0.4;
const INITIAL_SPACING: f32 = 10.0;

pub fn radial_target(normalized_degree: f32) -> f32 {
    MIN_RADIUS + (1.0 - normalized_degree.clamp(0.0, 1.0)) * (MAX_RADIUS - MIN_RADIUS)
}

pub struct Simulation {
    ids: Vec<String>,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    targets: Vec<f32>,
    springs: Vec<Spring>,
    root: Option<usize>,
    alpha: f32,
    alpha_decay: f32,
    ticks: u32,
    started: Instant,
    model_revision: u64,
}

impl Simulation {
    pub fn new(model: &GraphModel) -> Self {
        let graph = model.graph();
        let root = model.root_index();
        let node_count = graph.nodes.len();

        let mut positions = Vec::with_capacity(node_count);
        let mut velocities = Vec::with_capacity(node_count);
        let mut targets = Vec::with_capacity(node_count);
        for (index, node) in graph.nodes.iter().enumerate() {
            if Some(index) == root {
                positions.push(Vec2::ZERO);
                velocities.push(Vec2::ZERO);
                targets.push(0.0);
                continue;
            }

            positions.push(match (node.x, node.y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => vec2(x, y),
                _ => phyllotaxis(index),
            });
            velocities.push(vec2(node.vx.unwrap_or(0.0), node.vy.unwrap_or(0.0)));
            targets.push(radial_target(model.normalized_degree_at(index)));
        }

        Self {
            ids: graph.nodes.iter().map(|node| node.id.clone()).collect(),
            positions,
            velocities,
            targets,
            springs: Spring::for_edges(&model.link_indices(), node_count),
            root,
            alpha: 1.0,
            alpha_decay: 1.0 - ALPHA_MIN.powf(1.0 / 300.0),
            ticks: 0,
            started: Instant::now(),
            model_revision: model.revision(),
        }
    }

    pub fn model_revision(&self) -> u64 {
        self.model_revision
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn is_settled(&self) -> bool {
        self.ticks >= MAX_TICKS || self.started.elapsed() >= COOLDOWN || self.alpha < ALPHA_MIN
    }

    pub fn tick(&mut self) -> bool {
        if self.is_settled() {
            return false;
        }

        self.alpha -= self.alpha * self.alpha_decay;
        apply_charge(
            &self.positions,
            &mut self.velocities,
            CHARGE_STRENGTH,
            BARNES_HUT_THETA,
            self.alpha,
        );
        apply_links(
            &self.springs,
            &self.positions,
            &mut self.velocities,
            LINK_DISTANCE,
            self.alpha,
        );
        apply_radial(
            &self.positions,
            &mut self.velocities,
            &self.targets,
            RADIAL_STRENGTH,
            self.alpha,
        );

        for (index, (position, velocity)) in self
            .positions
            .iter_mut()
            .zip(self.velocities.iter_mut())
            .enumerate()
        {
            if Some(index) == self.root {
                *position = Vec2::ZERO;
                *velocity = Vec2::ZERO;
                continue;
            }
            *velocity *= 1.0 - VELOCITY_DECAY;
            *position += *velocity;
        }

        self.ticks += 1;
        true
    }

    #[cfg(test)]
    pub fn run_to_rest(&mut self) -> u32 {
        let before = self.ticks;
        while self.tick() {}
        self.ticks - before
    }

    #[cfg(test)]
    pub fn position(&self, index: usize) -> Option<Vec2> {
        self.positions.get(index).copied()
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn bounds(&self) -> Option<Rect> {
        if self.positions.is_empty() {
            return None;
        }
        let points: Vec<_> = self.positions.iter().map(|position| position.to_pos2()).collect();
        Some(Rect::from_points(&points))
    }

    pub fn flatten(&self, graph: &Graph) -> Graph {
        let by_id: HashMap<&str, usize> = self
            .ids
            .iter()
            .enumerate()
            .map(|(index, id)| (id.as_str(), index))
            .collect();

        let mut flat = graph.clone();
        for node in &mut flat.nodes {
            let Some(&index) = by_id.get(node.id.as_str()) else {
                continue;
            };
            let (position, velocity) = (self.positions[index], self.velocities[index]);
            node.x = Some(position.x);
            node.y = Some(position.y);
            node.vx = Some(velocity.x);
            node.vy = Some(velocity.y);
            let pin = (Some(index) == self.root).then_some(0.0);
            node.fx = pin;
            node.fy = pin;
        }
        flat
    }
}

fn phyllotaxis(index: usize) -> Vec2 {
    let radius = INITIAL_SPACING * (0.5 + index as f32).sqrt();
    let angle = index as f32 * std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    vec2(radius * angle.cos(), radius * angle.sin())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::graph::{Link, Node};

    fn layered_graph() -> Graph {
        let mut nodes = vec![Node::new("root", "Root", 0)];
        let mut links = Vec::new();
        for pillar in 0..3 {
            let pillar_id = format!("p{pillar}");
            nodes.push(Node::new(pillar_id.clone(), "Pillar", 1));
            links.push(Link::new(pillar_id.clone(), "root", "supports"));
            for detail in 0..2 {
                let detail_id = format!("d{pillar}{detail}");
                nodes.push(Node::new(detail_id.clone(), "Detail", 2));
                links.push(Link::new(detail_id, pillar_id.clone(), "explains"));
            }
        }
        Graph { nodes, links }
    }

    fn mean_radius(simulation: &Simulation, model: &GraphModel, prefix: &str) -> f32 {
        let radii: Vec<f32> = model
            .graph()
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.id.starts_with(prefix))
            .map(|(index, _)| simulation.position(index).unwrap().length())
            .collect();
        radii.iter().sum::<f32>() / radii.len() as f32
    }

    #[test]
    fn radial_target_shrinks_with_degree() {
        assert_eq!(radial_target(1.0), MIN_RADIUS);
        assert_eq!(radial_target(0.0), MAX_RADIUS);
        assert!(radial_target(0.75) < radial_target(0.25));
    }

    #[test]
    fn simulation_stops_after_tick_limit() {
        let model = GraphModel::new(layered_graph());
        let mut simulation = Simulation::new(&model);

        let ran = simulation.run_to_rest();

        assert!(ran <= MAX_TICKS);
        assert!(simulation.is_settled());
        assert!(!simulation.tick());
    }

    #[test]
    fn root_stays_pinned_at_origin() {
        let model = GraphModel::new(layered_graph());
        let mut simulation = Simulation::new(&model);
        simulation.run_to_rest();

        let root = model.root_index().unwrap();
        assert_eq!(model.graph().nodes[root].id, "root");
        assert_eq!(simulation.position(root), Some(Vec2::ZERO));
    }

    #[test]
    fn hubs_settle_closer_to_the_root_than_leaves() {
        let model = GraphModel::new(layered_graph());
        let mut simulation = Simulation::new(&model);
        simulation.run_to_rest();

        let pillars = mean_radius(&simulation, &model, "p");
        let details = mean_radius(&simulation, &model, "d");
        assert!(pillars < details, "pillars at {pillars}, details at {details}");
    }

    #[test]
    fn persisted_positions_are_resumed() {
        let mut graph = layered_graph();
        graph.nodes[1].x = Some(42.0);
        graph.nodes[1].y = Some(-7.0);
        let model = GraphModel::new(graph);

        let simulation = Simulation::new(&model);

        assert_eq!(simulation.position(1), Some(vec2(42.0, -7.0)));
    }

    #[test]
    fn flatten_writes_layout_by_id_and_keeps_string_endpoints() {
        let model = GraphModel::new(layered_graph());
        let mut simulation = Simulation::new(&model);
        simulation.tick();

        let flat = simulation.flatten(model.graph());

        assert_eq!(flat.links, model.graph().links);
        let root = flat.node("root").unwrap();
        assert_eq!((root.x, root.y, root.fx, root.fy), (Some(0.0), Some(0.0), Some(0.0), Some(0.0)));
        let pillar = flat.node("p0").unwrap();
        assert_eq!(pillar.x, Some(simulation.position(1).unwrap().x));
        assert_eq!(pillar.fx, None);
        assert_eq!(flat.without_layout(), model.graph().without_layout());
    }

    #[test]
    fn empty_graph_has_no_bounds() {
        let model = GraphModel::new(Graph::default());
        let simulation = Simulation::new(&model);
        assert!(simulation.bounds().is_none());
        assert!(simulation.flatten(model.graph()).nodes.is_empty());
    }
}

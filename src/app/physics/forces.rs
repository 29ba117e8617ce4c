use eframe::egui::{Vec2, vec2};

use super::quadtree::Cell;

const MIN_DISTANCE_SQ: f32 = 1.0;

#[derive(Clone, Copy, Debug)]
pub(super) struct Spring {
    pub(super) source: usize,
    pub(super) target: usize,
    pub(super) strength: f32,
    pub(super) bias: f32,
}

impl Spring {
    pub(super) fn for_edges(edges: &[(usize, usize)], body_count: usize) -> Vec<Self> {
        let mut counts = vec![0_u32; body_count];
        for &(source, target) in edges {
            counts[source] += 1;
            counts[target] += 1;
        }

        edges
            .iter()
            .filter(|(source, target)| source != target)
            .map(|&(source, target)| {
                let (from, to) = (counts[source] as f32, counts[target] as f32);
                Self {
                    source,
                    target,
                    strength: 1.0 / from.min(to).max(1.0),
                    bias: from / (from + to),
                }
            })
            .collect()
    }
}

fn jiggle(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

pub(super) fn apply_charge(
    positions: &[Vec2],
    velocities: &mut [Vec2],
    strength: f32,
    theta: f32,
    alpha: f32,
) {
    let Some(tree) = Cell::build(positions) else {
        return;
    };
    for (index, velocity) in velocities.iter_mut().enumerate() {
        *velocity += charge_on(&tree, index, positions, strength * alpha, theta);
    }
}

fn charge_on(cell: &Cell, index: usize, positions: &[Vec2], scaled: f32, theta: f32) -> Vec2 {
    let point = positions[index];

    if cell.is_leaf() {
        return cell
            .members
            .iter()
            .filter(|&&other| other != index)
            .fold(Vec2::ZERO, |sum, &other| {
                sum + pull_towards(positions[other] - point, scaled, || jiggle(index, other))
            });
    }

    let delta = cell.centroid - point;
    let distance = delta.length().max(f32::EPSILON);
    if !cell.square.contains(point) && cell.square.side() / distance < theta {
        return pull_towards(delta, scaled * cell.weight, || jiggle(index, 0));
    }

    cell.children()
        .fold(Vec2::ZERO, |sum, child| sum + charge_on(child, index, positions, scaled, theta))
}

fn pull_towards(delta: Vec2, scaled: f32, fallback: impl FnOnce() -> Vec2) -> Vec2 {
    let mut delta = delta;
    let mut distance_sq = delta.length_sq();
    if distance_sq == 0.0 {
        delta = fallback();
        distance_sq = 1.0;
    }
    if distance_sq < MIN_DISTANCE_SQ {
        distance_sq = (MIN_DISTANCE_SQ * distance_sq).sqrt();
    }
    delta * (scaled / distance_sq)
}

pub(super) fn apply_links(
    springs: &[Spring],
    positions: &[Vec2],
    velocities: &mut [Vec2],
    distance: f32,
    alpha: f32,
) {
    for spring in springs {
        let (source, target) = (spring.source, spring.target);
        let mut delta = (positions[target] + velocities[target])
            - (positions[source] + velocities[source]);
        if delta.length_sq() == 0.0 {
            delta = jiggle(source, target) * 1e-3;
        }
        let length = delta.length();
        let correction = delta * ((length - distance) / length * alpha * spring.strength);

        velocities[target] -= correction * spring.bias;
        velocities[source] += correction * (1.0 - spring.bias);
    }
}

pub(super) fn apply_radial(
    positions: &[Vec2],
    velocities: &mut [Vec2],
    targets: &[f32],
    strength: f32,
    alpha: f32,
) {
    for ((position, velocity), target) in positions.iter().zip(velocities.iter_mut()).zip(targets)
    {
        let radius = position.length();
        if radius <= f32::EPSILON {
            continue;
        }
        *velocity += *position * ((target - radius) * strength * alpha / radius);
    }
}

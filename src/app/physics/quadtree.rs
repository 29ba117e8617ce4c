use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 12;

#[derive(Clone, Copy, Debug)]
pub(super) struct Square {
    pub(super) center: Vec2,
    pub(super) half_side: f32,
}

impl Square {
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        let (min, max) = points.iter().fold(
            (vec2(f32::INFINITY, f32::INFINITY), vec2(f32::NEG_INFINITY, f32::NEG_INFINITY)),
            |(min, max), point| (min.min(*point), max.max(*point)),
        );
        if !(min.x.is_finite() && min.y.is_finite() && max.x.is_finite() && max.y.is_finite()) {
            return None;
        }

        let span = (max - min).max_elem().max(1.0);
        Some(Self {
            center: (min + max) * 0.5,
            half_side: span * 0.5 + 1.0,
        })
    }

    pub(super) fn side(self) -> f32 {
        self.half_side * 2.0
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        let offset = (point - self.center).abs();
        offset.x <= self.half_side && offset.y <= self.half_side
    }

    fn quadrant_of(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | (usize::from(point.y >= self.center.y) << 1)
    }

    fn quadrant(self, quadrant: usize) -> Self {
        let quarter = self.half_side * 0.5;
        let sign = |bit: usize| if quadrant & bit == 0 { -quarter } else { quarter };
        Self {
            center: self.center + vec2(sign(1), sign(2)),
            half_side: quarter,
        }
    }
}

pub(super) struct Cell {
    pub(super) square: Square,
    pub(super) centroid: Vec2,
    pub(super) weight: f32,
    pub(super) members: Vec<usize>,
    pub(super) children: [Option<Box<Cell>>; 4],
}

impl Cell {
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        let square = Square::enclosing(positions)?;
        Some(Self::subdivide(
            square,
            (0..positions.len()).collect(),
            positions,
            0,
        ))
    }

    fn subdivide(square: Square, members: Vec<usize>, positions: &[Vec2], depth: usize) -> Self {
        let weight = members.len() as f32;
        let centroid = if members.is_empty() {
            square.center
        } else {
            members
                .iter()
                .fold(Vec2::ZERO, |sum, &index| sum + positions[index])
                / weight
        };

        let mut cell = Self {
            square,
            centroid,
            weight,
            members,
            children: std::array::from_fn(|_| None),
        };
        if depth >= MAX_DEPTH || cell.members.len() <= LEAF_CAPACITY {
            return cell;
        }

        let mut buckets: [Vec<usize>; 4] = std::array::from_fn(|_| Vec::new());
        for &index in &cell.members {
            buckets[square.quadrant_of(positions[index])].push(index);
        }
        if buckets.iter().filter(|bucket| !bucket.is_empty()).count() <= 1 {
            return cell;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if !bucket.is_empty() {
                cell.children[quadrant] = Some(Box::new(Self::subdivide(
                    square.quadrant(quadrant),
                    bucket,
                    positions,
                    depth + 1,
                )));
            }
        }
        cell.members.clear();
        cell
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    pub(super) fn children(&self) -> impl Iterator<Item = &Cell> {
        self.children.iter().flatten().map(Box::as_ref)
    }
}

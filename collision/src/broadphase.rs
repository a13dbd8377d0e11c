use crate::bounds::Bounds;
use std::cmp::Ordering;

/// Edges are snapped to a grid of this many cells per unit.
const FIXED_POINT_SCALE: f32 = 8.0;

/// Two element indices whose bounding boxes overlap. Order doesn't matter.
#[derive(Copy, Clone, Debug)]
pub struct CollisionPair {
    pub a: usize,
    pub b: usize,
}

impl PartialEq for CollisionPair {
    fn eq(&self, other: &Self) -> bool {
        (self.a == other.a && self.b == other.b) || (self.a == other.b && self.b == other.a)
    }
}

impl Eq for CollisionPair {}

#[derive(Copy, Clone, Debug)]
struct BroadphaseEdge {
    x: i32,
    is_end: bool,
    index: usize,
}

fn compare_edges(a: &BroadphaseEdge, b: &BroadphaseEdge) -> Ordering {
    // starts sort before ends so boxes that touch at x still pair up
    a.x.cmp(&b.x).then(a.is_end.cmp(&b.is_end))
}

fn sort_edges(bounds: &[Bounds]) -> Vec<BroadphaseEdge> {
    let mut edges = Vec::with_capacity(bounds.len() * 2);

    for (index, bb) in bounds.iter().enumerate() {
        edges.push(BroadphaseEdge {
            x: (bb.mins.x * FIXED_POINT_SCALE).floor() as i32,
            is_end: false,
            index,
        });
        edges.push(BroadphaseEdge {
            x: (bb.maxs.x * FIXED_POINT_SCALE).ceil() as i32,
            is_end: true,
            index,
        });
    }

    // stable, elements keep their insertion order within equal keys
    edges.sort_by(compare_edges);

    edges
}

fn build_pairs(bounds: &[Bounds], sorted_edges: &[BroadphaseEdge]) -> Vec<CollisionPair> {
    let mut collision_pairs = Vec::new();
    let mut active: Vec<usize> = Vec::new();

    for edge in sorted_edges {
        if edge.is_end {
            if let Some(slot) = active.iter().position(|&index| index == edge.index) {
                active.swap_remove(slot);
            }
            continue;
        }

        for &other in &active {
            if bounds[other].intersects(&bounds[edge.index]) {
                collision_pairs.push(CollisionPair {
                    a: other,
                    b: edge.index,
                });
            }
        }

        active.push(edge.index);
    }

    collision_pairs
}

/// Every pair of overlapping boxes, each reported exactly once.
pub fn broadphase(bounds: &[Bounds]) -> Vec<CollisionPair> {
    let sorted_edges = sort_edges(bounds);
    build_pairs(bounds, &sorted_edges)
}

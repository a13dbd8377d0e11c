use crate::{bounds::Bounds, error::CollisionError};
use arrayvec::ArrayVec;
use glam::Vec3;
use log::warn;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Traversal stack size. Branches may only appear at depths below
/// `MAX_DEPTH - 1`, which bounds the stack at `MAX_DEPTH` entries.
pub const MAX_DEPTH: usize = 16;
const LEAF_SIZE: usize = 4;
const QUANTIZE_RANGE: f32 = 65535.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KdTreeNode {
    Leaf {
        triangle_offset: u16,
        triangle_count: u16,
    },
    /// Triangles on the `a` side end at or before `a_max` on `axis`, those on
    /// the `b` side start at or after `b_min`. Both are quantised against the
    /// tree bounds, rounded outward.
    Branch {
        axis: u8,
        a_max: u16,
        b_min: u16,
        a_child: u16,
        b_child: u16,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KdTree {
    bounds: Bounds,
    size_inv: Vec3,
    nodes: Vec<KdTreeNode>,
}

struct BuildTriangle {
    index: usize,
    bounds: Bounds,
    centroid: Vec3,
}

struct KdTreeBuilder {
    bounds: Bounds,
    size_inv: Vec3,
    nodes: Vec<KdTreeNode>,
    order: Vec<usize>,
}

fn to_u16(value: usize, triangle_count: usize) -> Result<u16, CollisionError> {
    u16::try_from(value).map_err(|_| CollisionError::MeshTooLarge { triangle_count })
}

fn quantize(min: f32, size_inv: f32, value: f32) -> f32 {
    ((value - min) * size_inv).max(0.0).min(QUANTIZE_RANGE)
}

impl KdTreeBuilder {
    fn quantize_floor(&self, axis: usize, value: f32) -> u16 {
        quantize(self.bounds.mins[axis], self.size_inv[axis], value).floor() as u16
    }

    fn quantize_ceil(&self, axis: usize, value: f32) -> u16 {
        quantize(self.bounds.mins[axis], self.size_inv[axis], value).ceil() as u16
    }

    fn push_leaf(&mut self, triangles: &[BuildTriangle], total: usize) -> Result<u16, CollisionError> {
        let node_index = to_u16(self.nodes.len(), total)?;
        let triangle_offset = to_u16(self.order.len(), total)?;
        let triangle_count = to_u16(triangles.len(), total)?;
        self.order.extend(triangles.iter().map(|tri| tri.index));
        self.nodes.push(KdTreeNode::Leaf {
            triangle_offset,
            triangle_count,
        });
        Ok(node_index)
    }

    fn build_node(
        &mut self,
        triangles: &mut [BuildTriangle],
        depth: usize,
        total: usize,
    ) -> Result<u16, CollisionError> {
        if triangles.len() <= LEAF_SIZE || depth + 1 >= MAX_DEPTH {
            return self.push_leaf(triangles, total);
        }

        let centroids = Bounds::from_points(
            &triangles.iter().map(|tri| tri.centroid).collect::<Vec<_>>(),
        );
        let extent = centroids.width();
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };

        if extent[axis] <= 0.0 {
            // every centroid is the same point, splitting wouldn't separate anything
            return self.push_leaf(triangles, total);
        }

        triangles.sort_by(|a, b| {
            a.centroid[axis]
                .partial_cmp(&b.centroid[axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mid = triangles.len() / 2;
        let (a_side, b_side) = triangles.split_at_mut(mid);

        let a_max = a_side
            .iter()
            .fold(f32::MIN, |acc, tri| acc.max(tri.bounds.maxs[axis]));
        let b_min = b_side
            .iter()
            .fold(f32::MAX, |acc, tri| acc.min(tri.bounds.mins[axis]));

        let node_index = to_u16(self.nodes.len(), total)?;
        // placeholder until both children have been placed
        self.nodes.push(KdTreeNode::Leaf {
            triangle_offset: 0,
            triangle_count: 0,
        });

        let a_child = self.build_node(a_side, depth + 1, total)?;
        let b_child = self.build_node(b_side, depth + 1, total)?;

        self.nodes[node_index as usize] = KdTreeNode::Branch {
            axis: axis as u8,
            a_max: self.quantize_ceil(axis, a_max),
            b_min: self.quantize_floor(axis, b_min),
            a_child,
            b_child,
        };

        Ok(node_index)
    }
}

impl KdTree {
    /// Builds a tree over the given triangles. Returns the tree and the order
    /// triangles have to be stored in so leaf ranges index them directly.
    pub fn build(vertices: &[Vec3], triangles: &[[u16; 3]]) -> Result<(KdTree, Vec<usize>), CollisionError> {
        if triangles.is_empty() {
            return Err(CollisionError::EmptyMesh);
        }

        let mut build_triangles = Vec::with_capacity(triangles.len());
        for (index, indices) in triangles.iter().enumerate() {
            let mut pts = [Vec3::ZERO; 3];
            for (pt, &vertex) in pts.iter_mut().zip(indices.iter()) {
                *pt = *vertices
                    .get(vertex as usize)
                    .ok_or(CollisionError::InvalidVertexIndex {
                        triangle: index,
                        index: vertex,
                        vertex_count: vertices.len(),
                    })?;
            }
            build_triangles.push(BuildTriangle {
                index,
                bounds: Bounds::from_points(&pts),
                centroid: (pts[0] + pts[1] + pts[2]) / 3.0,
            });
        }

        let bounds = build_triangles
            .iter()
            .fold(Bounds::new(), |acc, tri| acc.union(&tri.bounds));
        let size = bounds.width();
        let size_inv = Vec3::select(
            size.cmpgt(Vec3::splat(f32::EPSILON)),
            Vec3::splat(QUANTIZE_RANGE) / size,
            Vec3::ZERO,
        );

        let mut builder = KdTreeBuilder {
            bounds,
            size_inv,
            nodes: Vec::new(),
            order: Vec::with_capacity(triangles.len()),
        };
        let total = triangles.len();
        builder.build_node(&mut build_triangles, 0, total)?;

        Ok((
            KdTree {
                bounds,
                size_inv,
                nodes: builder.nodes,
            },
            builder.order,
        ))
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn nodes(&self) -> &[KdTreeNode] {
        &self.nodes
    }

    fn quantize_floor(&self, axis: usize, value: f32) -> u16 {
        quantize(self.bounds.mins[axis], self.size_inv[axis], value).floor() as u16
    }

    fn quantize_ceil(&self, axis: usize, value: f32) -> u16 {
        quantize(self.bounds.mins[axis], self.size_inv[axis], value).ceil() as u16
    }

    /// Checks a loaded tree against the triangle count it indexes and the
    /// traversal stack bound.
    pub fn validate(&self, triangle_count: usize) -> Result<(), CollisionError> {
        if self.nodes.is_empty() {
            return Err(CollisionError::EmptyMesh);
        }

        let mut stack = vec![(0usize, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            if depth + 1 > MAX_DEPTH {
                return Err(CollisionError::KdTreeTooDeep {
                    depth: depth + 1,
                    max_depth: MAX_DEPTH,
                });
            }

            match self.nodes[node] {
                KdTreeNode::Leaf {
                    triangle_offset,
                    triangle_count: count,
                } => {
                    let start = triangle_offset as usize;
                    let end = start + count as usize;
                    if end > triangle_count {
                        return Err(CollisionError::TriangleOutOfRange {
                            node,
                            start,
                            end,
                            triangle_count,
                        });
                    }
                }
                KdTreeNode::Branch {
                    a_child, b_child, ..
                } => {
                    if depth + 2 > MAX_DEPTH {
                        return Err(CollisionError::KdTreeTooDeep {
                            depth: depth + 2,
                            max_depth: MAX_DEPTH,
                        });
                    }
                    for &child in &[a_child as usize, b_child as usize] {
                        // children always come after their parent which also rules out cycles
                        if child <= node || child >= self.nodes.len() {
                            return Err(CollisionError::NodeOutOfRange {
                                node,
                                child,
                                node_count: self.nodes.len(),
                            });
                        }
                        stack.push((child, depth + 1));
                    }
                }
            }
        }
        Ok(())
    }

    fn traverse(
        &self,
        mut visit_a: impl FnMut(usize, u16) -> bool,
        mut visit_b: impl FnMut(usize, u16) -> bool,
        mut callback: impl FnMut(usize),
    ) {
        if self.nodes.is_empty() {
            return;
        }

        let mut stack = ArrayVec::<u16, MAX_DEPTH>::new();
        stack.push(0);

        while let Some(node) = stack.pop() {
            match self.nodes[node as usize] {
                KdTreeNode::Leaf {
                    triangle_offset,
                    triangle_count,
                } => {
                    let start = triangle_offset as usize;
                    for triangle in start..start + triangle_count as usize {
                        callback(triangle);
                    }
                }
                KdTreeNode::Branch {
                    axis,
                    a_max,
                    b_min,
                    a_child,
                    b_child,
                } => {
                    let axis = axis as usize;
                    for &(visit, child) in &[(visit_b(axis, b_min), b_child), (visit_a(axis, a_max), a_child)] {
                        if visit && stack.try_push(child).is_err() {
                            warn!("kd-tree deeper than {} levels, skipping node {}", MAX_DEPTH, child);
                        }
                    }
                }
            }
        }
    }

    /// Calls `callback` with the index of every triangle whose leaf overlaps
    /// `bounds`. May report triangles that don't overlap, never misses one
    /// that does.
    pub fn lookup(&self, bounds: &Bounds, callback: impl FnMut(usize)) {
        if !self.bounds.intersects(bounds) {
            return;
        }

        let mut box_min = [0u16; 3];
        let mut box_max = [0u16; 3];
        for axis in 0..3 {
            box_min[axis] = self.quantize_floor(axis, bounds.mins[axis]);
            box_max[axis] = self.quantize_ceil(axis, bounds.maxs[axis]);
        }

        self.traverse(
            |axis, a_max| box_min[axis] <= a_max,
            |axis, b_min| box_max[axis] >= b_min,
            callback,
        );
    }

    /// Calls `callback` with every triangle that may lie directly below
    /// `point`. On the vertical axis the lower side is always searched and
    /// the upper side only when it starts below the point.
    pub fn shadow_cast(&self, point: Vec3, callback: impl FnMut(usize)) {
        if point.x < self.bounds.mins.x
            || point.x > self.bounds.maxs.x
            || point.z < self.bounds.mins.z
            || point.z > self.bounds.maxs.z
            || point.y < self.bounds.mins.y
        {
            return;
        }

        let mut pt_min = [0u16; 3];
        let mut pt_max = [0u16; 3];
        for axis in 0..3 {
            pt_min[axis] = self.quantize_floor(axis, point[axis]);
            pt_max[axis] = self.quantize_ceil(axis, point[axis]);
        }

        self.traverse(
            |axis, a_max| axis == 1 || pt_min[axis] <= a_max,
            |axis, b_min| pt_max[axis] >= b_min,
            callback,
        );
    }
}

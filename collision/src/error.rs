use crate::dynamic_object::EntityId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollisionError {
    #[error("failed to read collision data")]
    Io(#[from] std::io::Error),
    #[error("failed to parse collision data")]
    Json(#[from] serde_json::Error),
    #[error("mesh has no triangles")]
    EmptyMesh,
    #[error("mesh with {triangle_count} triangles can't be indexed with 16 bit offsets")]
    MeshTooLarge { triangle_count: usize },
    #[error("triangle {triangle} references vertex {index} but the mesh has {vertex_count} vertices")]
    InvalidVertexIndex {
        triangle: usize,
        index: u16,
        vertex_count: usize,
    },
    #[error("kd-tree leaf {node} covers triangles {start}..{end} but the mesh has {triangle_count}")]
    TriangleOutOfRange {
        node: usize,
        start: usize,
        end: usize,
        triangle_count: usize,
    },
    #[error("kd-tree node {node} references child {child} out of {node_count}")]
    NodeOutOfRange {
        node: usize,
        child: usize,
        node_count: usize,
    },
    #[error("kd-tree depth {depth} exceeds the traversal limit of {max_depth}")]
    KdTreeTooDeep { depth: usize, max_depth: usize },
    #[error("entity id 0 is reserved")]
    NullEntity,
    #[error("entity {0:?} is already registered")]
    DuplicateEntity(EntityId),
}

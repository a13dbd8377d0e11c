use crate::{
    bounds::Bounds,
    dynamic_object::CollisionLayers,
    error::CollisionError,
    kd_tree::KdTree,
    shapes::MinkowskiSum,
};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

const EDGE_FILTER_TOLERANCE: f32 = 0.0001;
/// Neighbours whose normals agree this closely share a filtered edge.
const COPLANAR_THRESHOLD: f32 = 0.999;
const MIN_UPWARD_NORMAL_Y: f32 = 0.0001;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceType {
    Default,
    /// Never slide, whatever the slope.
    Sticky,
    /// Always slide, even on flat ground.
    Slippery,
    Water,
}

impl Default for SurfaceType {
    fn default() -> Self {
        SurfaceType::Default
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshTriangleIndices {
    pub indices: [u16; 3],
    #[serde(default)]
    pub surface_type: SurfaceType,
    #[serde(default = "CollisionLayers::all")]
    pub collision_layers: CollisionLayers,
    /// Bit `i` marks the edge from corner `i` to corner `i + 1` as shared
    /// with a coplanar neighbour.
    #[serde(default)]
    pub filtered_edges: u8,
}

impl MeshTriangleIndices {
    pub fn new(indices: [u16; 3]) -> Self {
        Self {
            indices,
            surface_type: SurfaceType::Default,
            collision_layers: CollisionLayers::all(),
            filtered_edges: 0,
        }
    }

    fn has_edge(&self, edge: usize) -> bool {
        self.filtered_edges & (1 << edge) != 0
    }
}

/// A single triangle of a mesh as a convex shape.
#[derive(Copy, Clone, Debug)]
pub struct MeshTriangle<'a> {
    pub vertices: &'a [Vec3],
    pub triangle: &'a MeshTriangleIndices,
}

impl<'a> MeshTriangle<'a> {
    pub fn corner(&self, i: usize) -> Vec3 {
        self.vertices[self.triangle.indices[i] as usize]
    }

    pub fn normal(&self) -> Vec3 {
        let a = self.corner(0);
        (self.corner(1) - a)
            .cross(self.corner(2) - a)
            .normalize_or_zero()
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(&[self.corner(0), self.corner(1), self.corner(2)])
    }
}

impl<'a> MinkowskiSum for MeshTriangle<'a> {
    fn support(&self, dir: Vec3) -> Vec3 {
        let mut result = self.corner(0);
        let mut distance = result.dot(dir);
        for i in 1..3 {
            let corner = self.corner(i);
            let check = corner.dot(dir);
            if check > distance {
                distance = check;
                result = corner;
            }
        }
        result
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShadowCastResult {
    pub y: f32,
    pub normal: Vec3,
    pub surface_type: SurfaceType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshCollider {
    vertices: Vec<Vec3>,
    triangles: Vec<MeshTriangleIndices>,
    kd_tree: KdTree,
}

fn cross_2d(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

impl MeshCollider {
    /// Indexes the triangles and marks seams between coplanar neighbours.
    /// Triangles are reordered to match the index.
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<MeshTriangleIndices>) -> Result<Self, CollisionError> {
        let indices: Vec<[u16; 3]> = triangles.iter().map(|tri| tri.indices).collect();
        let (kd_tree, order) = KdTree::build(&vertices, &indices)?;
        let mut triangles: Vec<MeshTriangleIndices> = order.iter().map(|&i| triangles[i]).collect();
        mark_filtered_edges(&vertices, &mut triangles);

        Ok(Self {
            vertices,
            triangles,
            kd_tree,
        })
    }

    pub fn from_triangles(
        vertices: Vec<Vec3>,
        indices: &[[u16; 3]],
        surface_type: SurfaceType,
    ) -> Result<Self, CollisionError> {
        let triangles = indices
            .iter()
            .map(|&indices| MeshTriangleIndices {
                surface_type,
                ..MeshTriangleIndices::new(indices)
            })
            .collect();
        Self::new(vertices, triangles)
    }

    pub fn from_json(json: &str) -> Result<Self, CollisionError> {
        let mesh: MeshCollider = serde_json::from_str(json)?;
        mesh.validate()?;
        Ok(mesh)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CollisionError> {
        let reader = BufReader::new(File::open(path)?);
        let mesh: MeshCollider = serde_json::from_reader(reader)?;
        mesh.validate()?;
        Ok(mesh)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CollisionError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CollisionError> {
        if self.triangles.is_empty() {
            return Err(CollisionError::EmptyMesh);
        }

        for (triangle, indices) in self.triangles.iter().enumerate() {
            for &index in &indices.indices {
                if index as usize >= self.vertices.len() {
                    return Err(CollisionError::InvalidVertexIndex {
                        triangle,
                        index,
                        vertex_count: self.vertices.len(),
                    });
                }
            }
        }

        self.kd_tree.validate(self.triangles.len())
    }

    pub fn bounds(&self) -> &Bounds {
        self.kd_tree.bounds()
    }

    /// Lowest point of the mesh, anything falling well below this is lost.
    pub fn lowest_point(&self) -> f32 {
        self.kd_tree.bounds().mins.y
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle(&self, index: usize) -> MeshTriangle<'_> {
        MeshTriangle {
            vertices: &self.vertices,
            triangle: &self.triangles[index],
        }
    }

    /// Calls `callback` for every triangle that shares a layer with
    /// `collision_layers` and whose bounds overlap `bounds`.
    pub fn lookup(&self, bounds: &Bounds, collision_layers: CollisionLayers, mut callback: impl FnMut(usize)) {
        self.kd_tree.lookup(bounds, |index| {
            let triangle = self.triangle(index);
            if triangle.triangle.collision_layers.intersects(collision_layers)
                && triangle.bounds().intersects(bounds)
            {
                callback(index);
            }
        });
    }

    /// Rejects contacts whose normal leans out across a seam to a coplanar
    /// neighbour. The neighbour produces the proper face contact instead.
    /// Returns true when the contact should be kept.
    pub fn filter_edge_contact(&self, index: usize, contact_normal: Vec3) -> bool {
        let triangle = &self.triangles[index];
        if triangle.filtered_edges == 0 {
            return true;
        }

        for i in 0..3 {
            if !triangle.has_edge(i) {
                continue;
            }

            let next_i = (i + 1) % 3;
            let next_next_i = (i + 2) % 3;
            let corner = self.vertices[triangle.indices[i] as usize];
            let offset = self.vertices[triangle.indices[next_i] as usize] - corner;
            let opposite = self.vertices[triangle.indices[next_next_i] as usize] - corner;

            // points from the opposite corner straight out across the edge
            let perp_offset = offset * (opposite.dot(offset) / offset.length_squared()) - opposite;

            if perp_offset.dot(contact_normal) > EDGE_FILTER_TOLERANCE {
                return false;
            }
        }

        true
    }

    fn shadow_cast_triangle(&self, index: usize, point: Vec3) -> Option<ShadowCastResult> {
        let triangle = self.triangle(index);
        let normal = triangle.normal();
        if normal.y <= MIN_UPWARD_NORMAL_Y {
            return None;
        }

        let p = Vec2::new(point.x, point.z);
        let corners: Vec<Vec2> = (0..3)
            .map(|i| {
                let corner = triangle.corner(i);
                Vec2::new(corner.x, corner.z)
            })
            .collect();

        // the point has to be on the same side of all three edges in the xz plane
        let mut sign = 0.0;
        for i in 0..3 {
            let side = cross_2d(corners[(i + 1) % 3] - corners[i], p - corners[i]);
            if side == 0.0 {
                continue;
            }
            if sign == 0.0 {
                sign = side;
            } else if side * sign < 0.0 {
                return None;
            }
        }

        let origin = triangle.corner(0);
        let y = origin.y - (normal.x * (point.x - origin.x) + normal.z * (point.z - origin.z)) / normal.y;
        if y >= point.y {
            return None;
        }

        Some(ShadowCastResult {
            y,
            normal,
            surface_type: triangle.triangle.surface_type,
        })
    }

    /// Highest upward facing surface strictly below `point`.
    pub fn shadow_cast(&self, point: Vec3) -> Option<ShadowCastResult> {
        let mut best: Option<ShadowCastResult> = None;
        self.kd_tree.shadow_cast(point, |index| {
            if let Some(hit) = self.shadow_cast_triangle(index, point) {
                if best.map_or(true, |best| hit.y > best.y) {
                    best = Some(hit);
                }
            }
        });
        best
    }
}

fn mark_filtered_edges(vertices: &[Vec3], triangles: &mut [MeshTriangleIndices]) {
    let normals: Vec<Vec3> = triangles
        .iter()
        .map(|triangle| {
            MeshTriangle {
                vertices,
                triangle,
            }
            .normal()
        })
        .collect();

    let mut edges: HashMap<(u16, u16), Vec<(usize, usize)>> = HashMap::new();
    for (index, triangle) in triangles.iter().enumerate() {
        for edge in 0..3 {
            let a = triangle.indices[edge];
            let b = triangle.indices[(edge + 1) % 3];
            edges.entry((a.min(b), a.max(b))).or_default().push((index, edge));
        }
    }

    for sharing in edges.values() {
        for (i, &(tri_a, edge_a)) in sharing.iter().enumerate() {
            for &(tri_b, edge_b) in &sharing[i + 1..] {
                if normals[tri_a].dot(normals[tri_b]) > COPLANAR_THRESHOLD {
                    triangles[tri_a].filtered_edges |= 1 << edge_a;
                    triangles[tri_b].filtered_edges |= 1 << edge_b;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Two triangle floor spanning `±half` on x and z at height `y`.
    pub(crate) fn make_floor(half: f32, y: f32, surface_type: SurfaceType) -> MeshCollider {
        let vertices = vec![
            Vec3::new(-half, y, -half),
            Vec3::new(-half, y, half),
            Vec3::new(half, y, half),
            Vec3::new(half, y, -half),
        ];
        MeshCollider::from_triangles(vertices, &[[0, 1, 2], [0, 2, 3]], surface_type).unwrap()
    }

    #[test]
    fn test_floor_faces_up_and_shares_a_seam() {
        let floor = make_floor(10.0, 0.0, SurfaceType::Default);
        for i in 0..floor.triangle_count() {
            assert!(floor.triangle(i).normal().abs_diff_eq(Vec3::Y, 1e-6));
            assert_eq!(floor.triangles[i].filtered_edges.count_ones(), 1);
        }
    }

    #[test]
    fn test_edge_filter() {
        let floor = make_floor(10.0, 0.0, SurfaceType::Default);
        for i in 0..floor.triangle_count() {
            // straight up is always fine
            assert!(floor.filter_edge_contact(i, Vec3::Y));
        }

        // a sideways normal is rejected by exactly the triangle it leans out of
        let diagonal = Vec3::new(1.0, 0.0, -1.0).normalize();
        let kept: Vec<bool> = (0..2)
            .map(|i| floor.filter_edge_contact(i, diagonal))
            .collect();
        assert_eq!(kept.iter().filter(|k| **k).count(), 1);
    }

    #[test]
    fn test_shadow_cast() {
        let floor = make_floor(10.0, 1.0, SurfaceType::Water);
        let hit = floor.shadow_cast(Vec3::new(2.0, 5.0, 3.0)).unwrap();
        assert!((hit.y - 1.0).abs() < 1e-5);
        assert_eq!(hit.surface_type, SurfaceType::Water);

        assert!(floor.shadow_cast(Vec3::new(2.0, 0.5, 3.0)).is_none());
        assert!(floor.shadow_cast(Vec3::new(20.0, 5.0, 3.0)).is_none());
    }

    #[test]
    fn test_shadow_cast_picks_highest() {
        let vertices = vec![
            Vec3::new(-5.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(5.0, 0.0, -5.0),
            Vec3::new(-5.0, 2.0, -5.0),
            Vec3::new(0.0, 2.0, 5.0),
            Vec3::new(5.0, 2.0, -5.0),
            // facing down, never a shadow surface
            Vec3::new(-5.0, 1.0, -5.0),
            Vec3::new(5.0, 1.0, -5.0),
            Vec3::new(0.0, 1.0, 5.0),
        ];
        let mesh = MeshCollider::from_triangles(
            vertices,
            &[[0, 1, 2], [3, 4, 5], [6, 7, 8]],
            SurfaceType::Default,
        )
        .unwrap();

        assert!((mesh.shadow_cast(Vec3::new(0.0, 3.0, 0.0)).unwrap().y - 2.0).abs() < 1e-5);
        assert!((mesh.shadow_cast(Vec3::new(0.0, 1.5, 0.0)).unwrap().y - 0.0).abs() < 1e-5);
    }

    #[test]
    fn test_lookup_is_layer_gated() {
        let mut vertices = vec![Vec3::ZERO, Vec3::Z, Vec3::X];
        vertices.extend_from_slice(&[Vec3::new(0.0, 0.1, 0.0), Vec3::new(0.0, 0.1, 1.0), Vec3::new(1.0, 0.1, 0.0)]);
        let mut damage = MeshTriangleIndices::new([3, 4, 5]);
        damage.collision_layers = CollisionLayers::DAMAGE_PLAYER;
        let mesh = MeshCollider::new(vertices, vec![MeshTriangleIndices::new([0, 1, 2]), damage]).unwrap();

        let query = Bounds::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let mut count = 0;
        mesh.lookup(&query, CollisionLayers::TANGIBLE, |_| count += 1);
        assert_eq!(count, 1);

        count = 0;
        mesh.lookup(&query, CollisionLayers::TANGIBLE | CollisionLayers::DAMAGE_PLAYER, |_| count += 1);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_json_round_trip_validates() {
        let floor = make_floor(4.0, 0.0, SurfaceType::Sticky);
        let json = serde_json::to_string(&floor).unwrap();
        let loaded = MeshCollider::from_json(&json).unwrap();
        assert_eq!(loaded, floor);

        let mut broken = floor.clone();
        broken.triangles[0].indices[1] = 99;
        let json = serde_json::to_string(&broken).unwrap();
        assert!(matches!(
            MeshCollider::from_json(&json),
            Err(CollisionError::InvalidVertexIndex { .. })
        ));
    }
}

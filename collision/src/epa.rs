use crate::{
    gjk::{gjk_closest_points, support_point, Simplex, SupportPoint},
    shapes::{MinkowskiSum, Translated},
};
use glam::Vec3;
use log::debug;
use std::cmp::Ordering;

const MAX_ITERATIONS: usize = 64;
const EPA_TOLERANCE: f32 = 0.0001;
const DEGENERATE_EPSILON: f32 = 1e-10;

const MAX_ADVANCE_ITERATIONS: usize = 16;
/// Separation at which a swept shape counts as touching.
const SWEPT_TOLERANCE: f32 = 0.01;
/// Gap left between the shapes when a sweep stops short of impact.
const SWEPT_SKIN: f32 = 0.005;
/// Motion closer than this (as a cosine) to the contact plane is grazing, not closing.
const PARALLEL_EPSILON: f32 = 1e-3;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct EpaResult {
    pub contact_a: Vec3,
    pub contact_b: Vec3,
    /// Unit normal pointing from A toward B. Moving B by
    /// `normal * penetration` separates the shapes.
    pub normal: Vec3,
    pub penetration: f32,
    /// Fraction of B's motion completed at the time of impact. Always zero
    /// for the static solve.
    pub time: f32,
}

#[derive(Copy, Clone, Debug)]
struct Face {
    indices: [usize; 3],
    normal: Vec3,
    distance: f32,
}

fn make_face(points: &[SupportPoint], a: usize, b: usize, c: usize, interior: Vec3) -> Option<Face> {
    let pa = points[a].xyz;
    let normal = (points[b].xyz - pa).cross(points[c].xyz - pa);
    let length_sq = normal.length_squared();
    if length_sq < DEGENERATE_EPSILON {
        return None;
    }

    let mut normal = normal / length_sq.sqrt();
    let mut indices = [a, b, c];

    // faces always wind away from the inside of the polytope
    if normal.dot(pa - interior) < 0.0 {
        normal = -normal;
        indices.swap(1, 2);
    }

    Some(Face {
        indices,
        normal,
        distance: normal.dot(pa),
    })
}

fn closest_face(faces: &[Face]) -> Option<usize> {
    faces
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
}

/// Records the edge unless its reverse is already there, in which case both
/// faces sharing it were removed and the edge is interior.
fn add_edge(edges: &mut Vec<(usize, usize)>, a: usize, b: usize) {
    if let Some(reverse) = edges.iter().position(|&edge| edge == (b, a)) {
        edges.swap_remove(reverse);
    } else {
        edges.push((a, b));
    }
}

fn barycentric_coordinates(a: Vec3, b: Vec3, c: Vec3, pt: Vec3) -> Option<Vec3> {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = pt - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < DEGENERATE_EPSILON * DEGENERATE_EPSILON {
        return None;
    }

    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Some(Vec3::new(1.0 - v - w, v, w))
}

/// Expands an overlapping GJK simplex into a polytope and returns the face of
/// `A - B` closest to the origin. `None` when the polytope degenerates, which
/// callers treat as no resolvable penetration this tick.
pub fn epa_solve<A, B>(a: &A, b: &B, simplex: &Simplex) -> Option<EpaResult>
where
    A: MinkowskiSum + ?Sized,
    B: MinkowskiSum + ?Sized,
{
    if simplex.len < 4 {
        debug!("epa skipped, flat simplex with {} points", simplex.len);
        return None;
    }

    let mut points: Vec<SupportPoint> = simplex.support_points().collect();
    let interior = points.iter().fold(Vec3::ZERO, |acc, pt| acc + pt.xyz) / points.len() as f32;

    let mut faces = Vec::with_capacity(32);
    for &[i, j, k] in &[[0, 1, 2], [0, 2, 3], [0, 3, 1], [1, 3, 2]] {
        match make_face(&points, i, j, k, interior) {
            Some(face) => faces.push(face),
            None => {
                debug!("epa skipped, degenerate tetrahedron");
                return None;
            }
        }
    }

    let mut edges = Vec::new();
    let mut visible = Vec::new();
    let mut new_faces = Vec::new();

    for _ in 0..MAX_ITERATIONS {
        let face = faces[closest_face(&faces)?];
        let new_pt = support_point(a, b, face.normal);

        // stop once the boundary can't be pushed out any further
        if face.normal.dot(new_pt.xyz) - face.distance < EPA_TOLERANCE {
            break;
        }

        visible.clear();
        edges.clear();
        for face in &faces {
            let can_see = face.normal.dot(new_pt.xyz - points[face.indices[0]].xyz) > 0.0;
            visible.push(can_see);
            if can_see {
                let [i, j, k] = face.indices;
                add_edge(&mut edges, i, j);
                add_edge(&mut edges, j, k);
                add_edge(&mut edges, k, i);
            }
        }

        if edges.is_empty() {
            break;
        }

        points.push(new_pt);
        let new_index = points.len() - 1;

        new_faces.clear();
        let mut degenerate = false;
        for &(i, j) in &edges {
            match make_face(&points, i, j, new_index, interior) {
                Some(face) => new_faces.push(face),
                None => {
                    degenerate = true;
                    break;
                }
            }
        }

        if degenerate {
            // keep the polytope as it was, the current closest face is as good as it gets
            points.pop();
            break;
        }

        let mut index = 0;
        faces.retain(|_| {
            let keep = !visible[index];
            index += 1;
            keep
        });
        faces.extend_from_slice(&new_faces);
    }

    let face = faces[closest_face(&faces)?];
    let [ia, ib, ic] = face.indices;
    let (pa, pb, pc) = (points[ia], points[ib], points[ic]);
    let lambdas = match barycentric_coordinates(pa.xyz, pb.xyz, pc.xyz, face.normal * face.distance) {
        Some(lambdas) => lambdas,
        None => {
            debug!("epa failed, degenerate closest face");
            return None;
        }
    };

    Some(EpaResult {
        contact_a: pa.pt_a * lambdas.x + pb.pt_a * lambdas.y + pc.pt_a * lambdas.z,
        contact_b: pa.pt_b() * lambdas.x + pb.pt_b() * lambdas.y + pc.pt_b() * lambdas.z,
        normal: face.normal,
        penetration: face.distance.max(0.0),
        time: 0.0,
    })
}

/// Finds when `b`, which travelled `motion` this tick and now sits at the end
/// of it, first touched `a`. Uses conservative advancement, stepping along
/// the motion by the closest distance over the closing speed. Returns `None`
/// for a miss and also when `b` already overlaps `a` at the start of the
/// motion, in which case the static solve should be used.
pub fn epa_solve_swept<A, B>(a: &A, b: &B, motion: Vec3) -> Option<EpaResult>
where
    A: MinkowskiSum + ?Sized,
    B: MinkowskiSum + ?Sized,
{
    let motion_length = motion.length();
    let mut toi = 0.0;
    let mut last_safe: Option<EpaResult> = None;

    for _ in 0..MAX_ADVANCE_ITERATIONS {
        let moved = Translated {
            inner: b,
            offset: motion * (toi - 1.0),
        };
        let closest = gjk_closest_points(a, &moved);

        if closest.distance <= 0.0 {
            // stepped past the surface, fall back to the last separated position
            return last_safe;
        }

        let normal = (closest.point_b - closest.point_a).normalize_or_zero();
        let closing_speed = -motion.dot(normal);
        if normal == Vec3::ZERO || closing_speed <= motion_length * PARALLEL_EPSILON {
            return None;
        }

        let result = EpaResult {
            contact_a: closest.point_a,
            contact_b: closest.point_b,
            normal,
            penetration: 0.0,
            time: toi,
        };

        if closest.distance < SWEPT_TOLERANCE {
            return Some(result);
        }
        last_safe = Some(result);

        toi += (closest.distance - SWEPT_SKIN) / closing_speed;
        if toi > 1.0 {
            return None;
        }
    }

    debug!("swept solve ran out of iterations at t = {}", toi);
    last_safe
}

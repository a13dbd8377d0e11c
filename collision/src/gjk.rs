use crate::{
    math_ext::{any_orthogonal, Mat4Ext},
    shapes::MinkowskiSum,
};
use glam::{Mat4, Vec2, Vec3, Vec4};

const MAX_ITERATIONS: usize = 32;
const CONTAINS_ORIGIN_EPSILON: f32 = 0.0001 * 0.0001;
const DUPLICATE_POINT_EPSILON: f32 = 1e-6 * 1e-6;
const DEGENERATE_EPSILON: f32 = 1e-12;

fn signed_volume_1d(s1: Vec3, s2: Vec3) -> Vec2 {
    let ab = s2 - s1; // ray from a to b
    let ab_length_sq = ab.length_squared();
    if ab_length_sq < DEGENERATE_EPSILON {
        // coincident points, the segment is just a
        return Vec2::X;
    }

    let ap = Vec3::ZERO - s1; // ray from a to origin
    let p0 = s1 + ab * ab.dot(ap) / ab_length_sq; // projection of the origin onto the line

    // Choose the axis with the greatest difference/length
    let mut idx = 0;
    let mut mu_max = 0.0;
    for i in 0..3 {
        let mu = s2[i] - s1[i];
        if mu * mu > mu_max * mu_max {
            mu_max = mu;
            idx = i;
        }
    }

    // Project the simplex points and projected origin onto the axis with the greatest length
    let a = s1[idx];
    let b = s2[idx];
    let p = p0[idx];

    // Get the signed distance from a to p and from p to b
    let c1 = p - a;
    let c2 = b - p;

    if (p > a && p < b) || (p > b && p < a) {
        // p is between [a,b]
        Vec2::new(c2 / mu_max, c1 / mu_max)
    } else if (a <= b && p <= a) || (a >= b && p >= a) {
        // p is on the far side of a
        Vec2::X
    } else {
        // p must be on the far side of b
        Vec2::Y
    }
}

fn compare_signs(a: f32, b: f32) -> bool {
    (a > 0.0 && b > 0.0) || (a < 0.0 && b < 0.0)
}

fn closest_on_edges(s1: Vec3, s2: Vec3, s3: Vec3) -> Vec3 {
    let edges_pts = [s1, s2, s3];
    let mut dist = f32::MAX;
    let mut lambdas = Vec3::X;
    for i in 0..3 {
        let k = (i + 1) % 3;
        let l = (i + 2) % 3;

        let lambda_edge = signed_volume_1d(edges_pts[k], edges_pts[l]);
        let pt = edges_pts[k] * lambda_edge[0] + edges_pts[l] * lambda_edge[1];
        if pt.length_squared() < dist {
            dist = pt.length_squared();
            lambdas[i] = 0.0;
            lambdas[k] = lambda_edge[0];
            lambdas[l] = lambda_edge[1];
        }
    }
    lambdas
}

fn signed_volume_2d(s1: Vec3, s2: Vec3, s3: Vec3) -> Vec3 {
    let normal = (s2 - s1).cross(s3 - s1);
    let normal_length_sq = normal.length_squared();
    if normal_length_sq < DEGENERATE_EPSILON {
        // collinear, the triangle has no interior to project onto
        return closest_on_edges(s1, s2, s3);
    }

    let p0 = normal * s1.dot(normal) / normal_length_sq;

    // find the axis with the greatest projected area
    let mut idx = 0;
    let mut area_max = 0.0;
    for i in 0..3 {
        let j = (i + 1) % 3;
        let k = (i + 2) % 3;

        let a = Vec2::new(s1[j], s1[k]);
        let b = Vec2::new(s2[j], s2[k]);
        let c = Vec2::new(s3[j], s3[k]);
        let ab = b - a;
        let ac = c - a;
        let area = ab.x * ac.y - ab.y * ac.x;
        if area * area > area_max * area_max {
            idx = i;
            area_max = area;
        }
    }

    // Project onto the appropriate axis
    let x = (idx + 1) % 3;
    let y = (idx + 2) % 3;
    let s = [
        Vec2::new(s1[x], s1[y]),
        Vec2::new(s2[x], s2[y]),
        Vec2::new(s3[x], s3[y]),
    ];
    let p = Vec2::new(p0[x], p0[y]);

    // Get the sub-areas of the triangles formed from the projected origin and the edges
    let mut areas = Vec3::ZERO;
    for i in 0..3 {
        let j = (i + 1) % 3;
        let k = (i + 2) % 3;

        let ab = s[j] - p;
        let ac = s[k] - p;

        areas[i] = ab.x * ac.y - ab.y * ac.x;
    }

    if compare_signs(area_max, areas[0])
        && compare_signs(area_max, areas[1])
        && compare_signs(area_max, areas[2])
    {
        // the projected origin is inside the triangle, return the barycentric coordinates
        areas / area_max
    } else {
        closest_on_edges(s1, s2, s3)
    }
}

fn signed_volume_3d(s1: Vec3, s2: Vec3, s3: Vec3, s4: Vec3) -> Vec4 {
    let m = Mat4::from_cols(
        Vec4::new(s1.x, s2.x, s3.x, s4.x),
        Vec4::new(s1.y, s2.y, s3.y, s4.y),
        Vec4::new(s1.z, s2.z, s3.z, s4.z),
        Vec4::ONE,
    );

    let c4 = Vec4::new(
        m.cofactor(3, 0),
        m.cofactor(3, 1),
        m.cofactor(3, 2),
        m.cofactor(3, 3),
    );

    let det_m = c4[0] + c4[1] + c4[2] + c4[3];

    if det_m.abs() > DEGENERATE_EPSILON
        && compare_signs(det_m, c4[0])
        && compare_signs(det_m, c4[1])
        && compare_signs(det_m, c4[2])
        && compare_signs(det_m, c4[3])
    {
        // the barycentric coordinates put the origin inside the simplex
        return c4 * det_m.recip();
    }

    // project the origin onto the faces and take the closest one
    let face_pts = [s1, s2, s3, s4];
    let mut lambdas = Vec4::ZERO;
    let mut dist = f32::MAX;
    for i in 0..4 {
        let j = (i + 1) % 4;
        let k = (i + 2) % 4;

        let lambdas_face = signed_volume_2d(face_pts[i], face_pts[j], face_pts[k]);
        let pt = face_pts[i] * lambdas_face[0]
            + face_pts[j] * lambdas_face[1]
            + face_pts[k] * lambdas_face[2];
        if pt.length_squared() < dist {
            dist = pt.length_squared();
            let l = (i + 3) % 4;
            lambdas[i] = lambdas_face[0];
            lambdas[j] = lambdas_face[1];
            lambdas[k] = lambdas_face[2];
            lambdas[l] = 0.0;
        }
    }
    lambdas
}

/// A point on the Minkowski difference `A - B` together with the point on `A`
/// that produced it.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) struct SupportPoint {
    pub xyz: Vec3,
    pub pt_a: Vec3,
}

impl SupportPoint {
    pub fn pt_b(&self) -> Vec3 {
        self.pt_a - self.xyz
    }
}

pub(crate) fn support_point<A, B>(a: &A, b: &B, dir: Vec3) -> SupportPoint
where
    A: MinkowskiSum + ?Sized,
    B: MinkowskiSum + ?Sized,
{
    let pt_a = a.support(dir);
    let pt_b = b.support(-dir);
    SupportPoint {
        xyz: pt_a - pt_b,
        pt_a,
    }
}

/// Up to four points of the Minkowski difference `A - B` along with the
/// matching points on `A`.
#[derive(Copy, Clone, Debug, Default)]
pub struct Simplex {
    pub points: [Vec3; 4],
    pub object_a_point: [Vec3; 4],
    pub len: usize,
}

impl Simplex {
    fn push(&mut self, pt: SupportPoint) {
        debug_assert!(self.len < 4);
        self.points[self.len] = pt.xyz;
        self.object_a_point[self.len] = pt.pt_a;
        self.len += 1;
    }

    fn has_point(&self, xyz: Vec3) -> bool {
        self.points[..self.len]
            .iter()
            .any(|pt| (*pt - xyz).length_squared() < DUPLICATE_POINT_EPSILON)
    }

    pub(crate) fn support_points(&self) -> impl Iterator<Item = SupportPoint> + '_ {
        self.points[..self.len]
            .iter()
            .zip(self.object_a_point.iter())
            .map(|(&xyz, &pt_a)| SupportPoint { xyz, pt_a })
    }

    /// Projects the origin onto the simplex, returning the projected point and
    /// its barycentric coordinates.
    fn signed_volumes(&self) -> (Vec3, Vec4) {
        let p = &self.points;
        let lambdas = match self.len {
            1 => Vec4::X,
            2 => {
                let l = signed_volume_1d(p[0], p[1]);
                Vec4::new(l.x, l.y, 0.0, 0.0)
            }
            3 => signed_volume_2d(p[0], p[1], p[2]).extend(0.0),
            _ => signed_volume_3d(p[0], p[1], p[2], p[3]),
        };

        let mut v = Vec3::ZERO;
        for i in 0..self.len {
            v += p[i] * lambdas[i];
        }
        (v, lambdas)
    }

    /// Drops the points that don't contribute to the closest point.
    fn retain_valid(&mut self, lambdas: Vec4) -> Vec4 {
        let mut valid = Vec4::ZERO;
        let mut len = 0;
        for i in 0..self.len {
            if lambdas[i] != 0.0 {
                self.points[len] = self.points[i];
                self.object_a_point[len] = self.object_a_point[i];
                valid[len] = lambdas[i];
                len += 1;
            }
        }
        self.len = len;
        valid
    }

    fn push_unique<A, B>(&mut self, a: &A, b: &B, dir: Vec3) -> bool
    where
        A: MinkowskiSum + ?Sized,
        B: MinkowskiSum + ?Sized,
    {
        for &dir in &[dir, -dir] {
            if dir.length_squared() < DEGENERATE_EPSILON {
                continue;
            }
            let pt = support_point(a, b, dir);
            if !self.has_point(pt.xyz) {
                self.push(pt);
                return true;
            }
        }
        false
    }

    /// EPA needs a tetrahedron to start from. Grows a smaller simplex by
    /// searching away from its existing points, stopping early when the
    /// Minkowski difference is flat.
    fn complete_tetrahedron<A, B>(&mut self, a: &A, b: &B)
    where
        A: MinkowskiSum + ?Sized,
        B: MinkowskiSum + ?Sized,
    {
        if self.len == 1 {
            let dir = if self.points[0].length_squared() > DEGENERATE_EPSILON {
                -self.points[0]
            } else {
                Vec3::X
            };
            if !self.push_unique(a, b, dir) {
                return;
            }
        }

        if self.len == 2 {
            let ab = self.points[1] - self.points[0];
            let u = any_orthogonal(ab);
            if !self.push_unique(a, b, u) && !self.push_unique(a, b, u.cross(ab)) {
                return;
            }
        }

        if self.len == 3 {
            let ab = self.points[1] - self.points[0];
            let ac = self.points[2] - self.points[0];
            let normal = ab.cross(ac);
            self.push_unique(a, b, normal);
        }
    }
}

/// Returns the terminal simplex when the two shapes overlap. `first_direction`
/// seeds the search and falls back to +X when it is zero.
pub fn gjk_check_for_overlap<A, B>(a: &A, b: &B, first_direction: Vec3) -> Option<Simplex>
where
    A: MinkowskiSum + ?Sized,
    B: MinkowskiSum + ?Sized,
{
    let first_direction = if first_direction.length_squared() > DEGENERATE_EPSILON {
        first_direction
    } else {
        Vec3::X
    };

    let mut simplex = Simplex::default();
    simplex.push(support_point(a, b, first_direction));

    let mut dir = -simplex.points[0];
    let mut closest_dist = f32::MAX;
    let mut contains_origin = dir.length_squared() < CONTAINS_ORIGIN_EPSILON;
    let mut iterations = 0;

    while !contains_origin {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return None;
        }

        let new_pt = support_point(a, b, dir);

        // a repeated point means the simplex can't get any closer
        if simplex.has_point(new_pt.xyz) {
            return None;
        }

        // if this new point hasn't moved past the origin, then the origin cannot be in the set
        if dir.dot(new_pt.xyz) < 0.0 {
            return None;
        }

        simplex.push(new_pt);

        let (v, lambdas) = simplex.signed_volumes();
        let dist = v.length_squared();
        if dist < CONTAINS_ORIGIN_EPSILON {
            contains_origin = true;
            break;
        }

        if dist >= closest_dist {
            return None;
        }
        closest_dist = dist;

        simplex.retain_valid(lambdas);
        dir = -v;
        contains_origin = simplex.len == 4;
    }

    simplex.complete_tetrahedron(a, b);
    Some(simplex)
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClosestPoints {
    pub point_a: Vec3,
    pub point_b: Vec3,
    /// Zero when the shapes overlap.
    pub distance: f32,
}

pub fn gjk_closest_points<A, B>(a: &A, b: &B) -> ClosestPoints
where
    A: MinkowskiSum + ?Sized,
    B: MinkowskiSum + ?Sized,
{
    let mut simplex = Simplex::default();
    simplex.push(support_point(a, b, Vec3::ONE));

    let mut lambdas = Vec4::X;
    let mut dir = -simplex.points[0];
    let mut closest_dist = dir.length_squared();
    let mut overlapping = closest_dist < CONTAINS_ORIGIN_EPSILON;

    for _ in 0..MAX_ITERATIONS {
        if overlapping {
            break;
        }

        let new_pt = support_point(a, b, dir);
        if simplex.has_point(new_pt.xyz) {
            break;
        }

        // no meaningful progress toward the origin
        if closest_dist + dir.dot(new_pt.xyz) <= closest_dist * 1e-6 {
            break;
        }

        simplex.push(new_pt);
        let (v, new_lambdas) = simplex.signed_volumes();
        let dist = v.length_squared();
        if dist >= closest_dist {
            simplex.len -= 1;
            break;
        }

        lambdas = simplex.retain_valid(new_lambdas);
        closest_dist = dist;
        dir = -v;
        overlapping = dist < CONTAINS_ORIGIN_EPSILON || simplex.len == 4;
    }

    let mut point_a = Vec3::ZERO;
    let mut point_b = Vec3::ZERO;
    for (i, pt) in simplex.support_points().enumerate() {
        point_a += pt.pt_a * lambdas[i];
        point_b += pt.pt_b() * lambdas[i];
    }

    ClosestPoints {
        point_a,
        point_b,
        distance: if overlapping {
            0.0
        } else {
            closest_dist.sqrt()
        },
    }
}

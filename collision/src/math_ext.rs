use glam::{Mat3, Mat4, Vec2, Vec3};

pub trait Mat4Ext {
    fn minor(&self, i: usize, j: usize) -> Mat3;
    fn cofactor(&self, i: usize, j: usize) -> f32;
}

impl Mat4Ext for Mat4 {
    fn minor(&self, i: usize, j: usize) -> Mat3 {
        let mut minor = Mat3::ZERO;
        let mut yy = 0;
        for y in 0..4 {
            if y == j {
                continue;
            }

            let mut xx = 0;
            for x in 0..4 {
                if x == i {
                    continue;
                }

                minor.col_mut(xx)[yy] = self.col(x)[y];
                xx += 1;
            }

            yy += 1;
        }
        minor
    }

    fn cofactor(&self, i: usize, j: usize) -> f32 {
        let minor = self.minor(i, j);
        i32::pow(-1, (i + 1 + j + 1) as u32) as f32 * minor.determinant()
    }
}

/// Rotations about a single axis are stored as unit complex numbers `(cos, sin)`.
pub trait RotationExt {
    /// Rotates a local direction about the Y axis into world space.
    fn yaw_to_world(self, v: Vec3) -> Vec3;
    /// Inverse of `yaw_to_world`.
    fn yaw_to_local(self, v: Vec3) -> Vec3;
    /// Rotates a local direction about the X axis (in the y/z plane) into world space.
    fn pitch_to_world(self, v: Vec3) -> Vec3;
    fn pitch_to_local(self, v: Vec3) -> Vec3;
}

impl RotationExt for Vec2 {
    fn yaw_to_world(self, v: Vec3) -> Vec3 {
        Vec3::new(
            v.x * self.x - v.z * self.y,
            v.y,
            v.z * self.x + v.x * self.y,
        )
    }

    fn yaw_to_local(self, v: Vec3) -> Vec3 {
        Vec3::new(
            v.x * self.x + v.z * self.y,
            v.y,
            v.z * self.x - v.x * self.y,
        )
    }

    fn pitch_to_world(self, v: Vec3) -> Vec3 {
        Vec3::new(
            v.x,
            v.y * self.x - v.z * self.y,
            v.z * self.x + v.y * self.y,
        )
    }

    fn pitch_to_local(self, v: Vec3) -> Vec3 {
        Vec3::new(
            v.x,
            v.y * self.x + v.z * self.y,
            v.z * self.x - v.y * self.y,
        )
    }
}

/// Complex multiplication, composes two single-axis rotations.
pub fn complex_mul(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x * b.x - a.y * b.y, a.x * b.y + a.y * b.x)
}

pub fn rotation_from_angle(radians: f32) -> Vec2 {
    let (s, c) = radians.sin_cos();
    Vec2::new(c, s)
}

/// Returns some unit vector perpendicular to `v`.
pub fn any_orthogonal(v: Vec3) -> Vec3 {
    let abs = v.abs();
    let other = if abs.x <= abs.y && abs.x <= abs.z {
        Vec3::X
    } else if abs.y <= abs.z {
        Vec3::Y
    } else {
        Vec3::Z
    };
    v.cross(other).normalize_or_zero()
}

pub fn move_towards(from: f32, to: f32, max_delta: f32) -> f32 {
    if (to - from).abs() <= max_delta {
        to
    } else if to > from {
        from + max_delta
    } else {
        from - max_delta
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_yaw_round_trip() {
        let rot = rotation_from_angle(0.7);
        let v = Vec3::new(1.0, 2.0, -3.0);
        let world = rot.yaw_to_world(v);
        assert!((world.y - 2.0).abs() < 1e-6);
        assert!(rot.yaw_to_local(world).abs_diff_eq(v, 1e-5));

        let pitched = rot.pitch_to_world(v);
        assert!(rot.pitch_to_local(pitched).abs_diff_eq(v, 1e-5));
    }

    #[test]
    fn test_quarter_turn() {
        let rot = rotation_from_angle(std::f32::consts::FRAC_PI_2);
        assert!(rot.yaw_to_world(Vec3::X).abs_diff_eq(Vec3::Z, 1e-6));
        let twice = complex_mul(rot, rot);
        assert!(twice.abs_diff_eq(Vec2::new(-1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_any_orthogonal() {
        for v in [Vec3::X, Vec3::Y, Vec3::new(1.0, 2.0, 3.0)] {
            let o = any_orthogonal(v);
            assert!(o.dot(v).abs() < 1e-5);
            assert!((o.length() - 1.0).abs() < 1e-5);
        }
    }
}

use super::ShapeTrait;
use crate::{bounds::Bounds, math_ext::RotationExt};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Hull of the last two blade positions of a weapon swing. Each call to `add`
/// replaces the older pair of corners.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeSwing {
    corners: [Vec3; 4],
    next_corner: usize,
    data_count: usize,
}

impl ShapeSwing {
    pub fn add(&mut self, a: Vec3, b: Vec3) {
        self.corners[self.next_corner] = a;
        self.corners[self.next_corner + 1] = b;

        if self.data_count < 4 {
            self.data_count += 2;
        }
        self.next_corner ^= 2;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn corners(&self) -> &[Vec3] {
        &self.corners[..self.data_count]
    }
}

impl ShapeTrait for ShapeSwing {
    fn support(&self, dir: Vec3) -> Vec3 {
        let mut result = Vec3::ZERO;
        let mut score = f32::MIN;
        for corner in self.corners() {
            let test = corner.dot(dir);
            if test > score {
                score = test;
                result = *corner;
            }
        }
        result
    }

    fn bounding_box(&self, rotation: Option<Vec2>) -> Bounds {
        if self.data_count == 0 {
            return Bounds::from_min_max(Vec3::ZERO, Vec3::ZERO);
        }

        let rotation = rotation.unwrap_or(Vec2::X);
        let mut bounds = Bounds::new();
        for corner in self.corners() {
            bounds.expand_by_point(rotation.yaw_to_world(*corner));
        }
        bounds
    }
}

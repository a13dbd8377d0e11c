use super::{sign_select, ShapeTrait};
use crate::bounds::Bounds;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Vertical capsule. `inner_half_height` is the half length of the segment
/// between the two sphere centres.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeCapsule {
    pub radius: f32,
    pub inner_half_height: f32,
}

impl ShapeTrait for ShapeCapsule {
    fn support(&self, dir: Vec3) -> Vec3 {
        let mut result = dir.normalize_or_zero() * self.radius;
        result.y += sign_select(dir.y, self.inner_half_height);
        result
    }

    fn bounding_box(&self, _: Option<Vec2>) -> Bounds {
        let maxs = Vec3::new(
            self.radius,
            self.radius + self.inner_half_height,
            self.radius,
        );
        Bounds::from_min_max(-maxs, maxs)
    }
}

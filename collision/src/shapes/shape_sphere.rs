use super::ShapeTrait;
use crate::bounds::Bounds;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeSphere {
    pub radius: f32,
}

impl ShapeTrait for ShapeSphere {
    fn support(&self, dir: Vec3) -> Vec3 {
        dir.normalize_or_zero() * self.radius
    }

    fn bounding_box(&self, _: Option<Vec2>) -> Bounds {
        Bounds::from_min_max(Vec3::splat(-self.radius), Vec3::splat(self.radius))
    }
}

use super::{sign_select, ShapeTrait};
use crate::bounds::Bounds;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Cylinder standing on the Y axis.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeCylinder {
    pub radius: f32,
    pub half_height: f32,
}

impl ShapeTrait for ShapeCylinder {
    fn support(&self, dir: Vec3) -> Vec3 {
        let flat = Vec2::new(dir.x, dir.z).normalize_or_zero() * self.radius;
        Vec3::new(flat.x, sign_select(dir.y, self.half_height), flat.y)
    }

    fn bounding_box(&self, _: Option<Vec2>) -> Bounds {
        let maxs = Vec3::new(self.radius, self.half_height, self.radius);
        Bounds::from_min_max(-maxs, maxs)
    }
}

/// Cylinder lying on its side with its axis along local Z, used for rolling
/// objects.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeCylinderHorz {
    pub radius: f32,
    pub half_height: f32,
}

impl ShapeTrait for ShapeCylinderHorz {
    fn support(&self, dir: Vec3) -> Vec3 {
        let flat = Vec2::new(dir.x, dir.y).normalize_or_zero() * self.radius;
        Vec3::new(flat.x, flat.y, sign_select(dir.z, self.half_height))
    }

    fn bounding_box(&self, rotation: Option<Vec2>) -> Bounds {
        let rotation = rotation.unwrap_or(Vec2::X);
        let c = rotation.x.abs();
        let s = rotation.y.abs();
        let maxs = Vec3::new(
            c * self.radius + s * self.half_height,
            self.radius,
            c * self.half_height + s * self.radius,
        );
        Bounds::from_min_max(-maxs, maxs)
    }
}

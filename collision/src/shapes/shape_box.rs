use super::{sign_select, ShapeTrait};
use crate::bounds::Bounds;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeBox {
    pub half_size: Vec3,
}

impl ShapeTrait for ShapeBox {
    fn support(&self, dir: Vec3) -> Vec3 {
        Vec3::new(
            sign_select(dir.x, self.half_size.x),
            sign_select(dir.y, self.half_size.y),
            sign_select(dir.z, self.half_size.z),
        )
    }

    fn bounding_box(&self, rotation: Option<Vec2>) -> Bounds {
        let half_size = self.half_size;
        let maxs = match rotation {
            Some(rotation) => {
                let c = rotation.x.abs();
                let s = rotation.y.abs();
                Vec3::new(
                    half_size.x * c + half_size.z * s,
                    half_size.y,
                    half_size.x * s + half_size.z * c,
                )
            }
            None => half_size,
        };
        Bounds::from_min_max(-maxs, maxs)
    }
}

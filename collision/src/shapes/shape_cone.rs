use super::{sign_select, ShapeTrait};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Four sided pyramid with its apex at the origin opening along +Z. The base
/// spans `±size.x` by `±size.y` at `z = size.z`. Used for vision cones.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeCone {
    pub size: Vec3,
}

impl ShapeTrait for ShapeCone {
    fn support(&self, dir: Vec3) -> Vec3 {
        let corner = Vec3::new(
            sign_select(dir.x, self.size.x),
            sign_select(dir.y, self.size.y),
            self.size.z,
        );

        if corner.dot(dir) < 0.0 {
            Vec3::ZERO
        } else {
            corner
        }
    }
}

use super::{sign_select, ShapeTrait};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Flat kite used for melee swings. In the XZ plane the hull covers the
/// origin, the two arms `(±range.x, range.y)` and the tip `(0, 1)`, all scaled
/// by `radius`, extruded by `half_height` on Y.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeSweep {
    pub range: Vec2,
    pub radius: f32,
    pub half_height: f32,
}

impl ShapeTrait for ShapeSweep {
    fn support(&self, dir: Vec3) -> Vec3 {
        let dir_2d = Vec2::new(dir.x, dir.z);

        let mut result_2d = Vec2::ZERO;
        let mut distance = 0.0;

        let mut arm_check = self.range;
        if dir.x < 0.0 {
            arm_check.x = -arm_check.x;
        }

        let test = dir_2d.dot(arm_check);
        if test > distance {
            distance = test;
            result_2d = arm_check;
        }

        if dir_2d.y > distance {
            result_2d = Vec2::Y;
        }

        Vec3::new(
            result_2d.x * self.radius,
            sign_select(dir.y, self.half_height),
            result_2d.y * self.radius,
        )
    }
}

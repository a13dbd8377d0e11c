use crate::{
    bounds::Bounds,
    contact::ContactId,
    dynamic_object::{CollisionLayers, EntityId},
    math_ext::RotationExt,
    shapes::{MinkowskiSum, Positioned, Shape},
};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerShape {
    Sphere { radius: f32 },
    Cylinder { radius: f32, half_height: f32 },
    Box { half_size: Vec3 },
}

impl TriggerShape {
    fn to_shape(self) -> Shape {
        match self {
            TriggerShape::Sphere { radius } => Shape::make_sphere(radius),
            TriggerShape::Cylinder {
                radius,
                half_height,
            } => Shape::make_cylinder(radius, half_height),
            TriggerShape::Box { half_size } => Shape::make_box(half_size),
        }
    }
}

/// A volume that only records which objects are inside it.
#[derive(Clone, Debug)]
pub struct SpatialTrigger {
    pub entity_id: EntityId,
    pub position: Vec3,
    pub rotation: Option<Vec2>,
    pub collision_layers: CollisionLayers,
    pub bounding_box: Bounds,
    pub active_contacts: Option<ContactId>,
    shape: TriggerShape,
    collider: Shape,
}

impl SpatialTrigger {
    pub fn new(
        entity_id: EntityId,
        shape: TriggerShape,
        collision_layers: CollisionLayers,
        position: Vec3,
        rotation: Option<Vec2>,
    ) -> Self {
        let mut trigger = Self {
            entity_id,
            position,
            rotation,
            collision_layers,
            bounding_box: Bounds::default(),
            active_contacts: None,
            shape,
            collider: shape.to_shape(),
        };
        trigger.recalc_bb();
        trigger
    }

    pub fn shape(&self) -> TriggerShape {
        self.shape
    }

    pub fn set_shape(&mut self, shape: TriggerShape) {
        self.shape = shape;
        self.collider = shape.to_shape();
        self.recalc_bb();
    }

    pub fn recalc_bb(&mut self) {
        self.bounding_box = Positioned::new(&self.collider, self.position, self.rotation).bounding_box();
    }

    /// Strictly inside the volume, points on the surface don't count.
    pub fn does_contain_point(&self, point: Vec3) -> bool {
        if !self.bounding_box.contains_point(point) {
            return false;
        }

        let relative = point - self.position;

        match self.shape {
            TriggerShape::Sphere { radius } => relative.length_squared() < radius * radius,
            TriggerShape::Cylinder {
                radius,
                half_height,
            } => {
                relative.y.abs() < half_height
                    && relative.x * relative.x + relative.z * relative.z < radius * radius
            }
            TriggerShape::Box { half_size } => {
                let unrotated = match self.rotation {
                    Some(rotation) => rotation.yaw_to_local(relative),
                    None => relative,
                };
                unrotated.abs().cmplt(half_size).all()
            }
        }
    }
}

impl MinkowskiSum for SpatialTrigger {
    fn support(&self, dir: Vec3) -> Vec3 {
        Positioned::new(&self.collider, self.position, self.rotation).support(dir)
    }
}

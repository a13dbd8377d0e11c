use crate::{
    bounds::Bounds,
    contact::{Contact, ContactId, ContactPool},
    math_ext::RotationExt,
    mesh_collider::SurfaceType,
    shapes::{MinkowskiSum, Shape},
};
use bitflags::bitflags;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Steepest contact normal that still counts as ground, regardless of how
/// sticky the object type is.
const MAX_GROUND_THRESHOLD: f32 = 0.3;
const ONE_TICK: u8 = 2;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Reserved for "no entity", e.g. static geometry in a contact.
    pub const NONE: EntityId = EntityId(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CollisionLayers: u16 {
        const TANGIBLE = 1 << 0;
        const LIGHTING_TANGIBLE = 1 << 1;
        const DAMAGE_PLAYER = 1 << 2;
        const DAMAGE_ENEMY = 1 << 3;
        const Z_TARGET = 1 << 4;
        const LIGHTNING_BALL = 1 << 5;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ObjectFlags: u8 {
        /// Never moved by integration or by other objects.
        const FIXED = 1 << 0;
        const GRAVITY = 1 << 1;
        const OUT_OF_BOUNDS = 1 << 2;
        const HIT_KILL_PLANE = 1 << 3;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// A solid object that is pushed around.
    None,
    /// Only records what it touches, no contact normals are computed.
    Basic,
    /// Records contacts with normals but never pushes.
    Overlap,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityClass {
    Light,
    Medium,
    Neutral,
    Heavy,
}

impl DensityClass {
    /// Buoyant acceleration scale relative to gravity.
    pub fn buoyancy_divisor(self) -> f32 {
        match self {
            DensityClass::Light => 0.3,
            DensityClass::Medium => 0.6,
            DensityClass::Neutral => 1.0,
            DensityClass::Heavy => 1.4,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightClass {
    Ghost,
    Light,
    Medium,
    Heavy,
    SuperHeavy,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DynamicObjectType {
    pub shape: Shape,
    pub bounce: f32,
    pub friction: f32,
    /// 0 wont be stable on any slope, 1 will stick to anything not facing
    /// downward. Equivalent to `1 - cos(slope angle)`.
    pub max_stable_slope: f32,
}

impl DynamicObjectType {
    pub fn ground_threshold(&self) -> f32 {
        (1.0 - self.max_stable_slope).min(MAX_GROUND_THRESHOLD)
    }
}

pub fn should_slide(max_stable_slope: f32, normal_y: f32, surface_type: SurfaceType) -> bool {
    match surface_type {
        SurfaceType::Sticky => false,
        SurfaceType::Slippery => true,
        _ => normal_y < 1.0 - max_stable_slope,
    }
}

/// Closest contact in the list at `head` to `position`.
pub fn nearest_contact(pool: &ContactPool, head: Option<ContactId>, position: Vec3) -> Option<ContactId> {
    pool.iter(head)
        .map(|(id, contact)| (id, contact.point.distance_squared(position)))
        .fold(None, |best: Option<(ContactId, f32)>, (id, distance)| match best {
            Some((_, best_distance)) if best_distance <= distance => best,
            _ => Some((id, distance)),
        })
        .map(|(id, _)| id)
}

#[derive(Clone, Debug)]
pub struct DynamicObject {
    pub entity_id: EntityId,
    pub object_type: Arc<DynamicObjectType>,
    pub position: Vec3,
    /// Yaw as `(cos, sin)`.
    pub rotation: Option<Vec2>,
    /// Pitch about the local X axis as `(cos, sin)`, applied before yaw.
    pub pitch: Option<Vec2>,
    pub scale: f32,
    /// Offset of the shape from `position` in the object's local frame.
    pub center: Vec3,
    pub velocity: Vec3,
    pub bounding_box: Bounds,
    pub time_scalar: f32,
    pub flags: ObjectFlags,
    pub trigger_type: TriggerType,
    pub collision_layers: CollisionLayers,
    /// Objects sharing a non zero group never collide with each other.
    pub collision_group: u16,
    pub density_class: DensityClass,
    pub weight_class: WeightClass,
    pub is_pushed: u8,
    pub is_jumping: u8,
    pub disable_friction: u8,
    pub under_water: u8,
    pub has_ice_dash: u8,
    pub active_contacts: Option<ContactId>,
    pub shadow_contact: Option<ContactId>,
}

impl DynamicObject {
    pub fn new(
        entity_id: EntityId,
        object_type: Arc<DynamicObjectType>,
        collision_layers: CollisionLayers,
        position: Vec3,
        rotation: Option<Vec2>,
    ) -> Self {
        let mut object = Self {
            entity_id,
            object_type,
            position,
            rotation,
            pitch: None,
            scale: 1.0,
            center: Vec3::ZERO,
            velocity: Vec3::ZERO,
            bounding_box: Bounds::default(),
            time_scalar: 1.0,
            flags: ObjectFlags::GRAVITY,
            trigger_type: TriggerType::None,
            collision_layers,
            collision_group: 0,
            density_class: DensityClass::Neutral,
            weight_class: WeightClass::Medium,
            is_pushed: 0,
            is_jumping: 0,
            disable_friction: 0,
            under_water: 0,
            has_ice_dash: 0,
            active_contacts: None,
            shadow_contact: None,
        };
        object.recalc_bb();
        object
    }

    pub fn set_type(&mut self, object_type: Arc<DynamicObjectType>) {
        self.object_type = object_type;
        self.recalc_bb();
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
        self.recalc_bb();
    }

    /// Mutable access to the shape, cloning the shared type first if other
    /// objects use it. Call `recalc_bb` when done.
    pub fn shape_mut(&mut self) -> &mut Shape {
        &mut Arc::make_mut(&mut self.object_type).shape
    }

    pub fn is_fixed(&self) -> bool {
        self.flags.contains(ObjectFlags::FIXED)
    }

    pub fn is_trigger(&self) -> bool {
        self.trigger_type != TriggerType::None
    }

    /// Basic triggers only need to know they touched something.
    pub fn needs_overlap(&self) -> bool {
        self.trigger_type != TriggerType::Basic
    }

    pub fn should_push(&self) -> bool {
        self.trigger_type == TriggerType::None
    }

    /// Must be called after changing the shape, scale, rotation or position
    /// outside of `CollisionWorld::collide`.
    pub fn recalc_bb(&mut self) {
        self.bounding_box = match self.pitch {
            Some(_) => {
                // the extent along each world axis comes straight from the support
                Bounds::from_min_max(
                    Vec3::new(
                        self.support(-Vec3::X).x,
                        self.support(-Vec3::Y).y,
                        self.support(-Vec3::Z).z,
                    ),
                    Vec3::new(
                        self.support(Vec3::X).x,
                        self.support(Vec3::Y).y,
                        self.support(Vec3::Z).z,
                    ),
                )
            }
            None => {
                let local = self.object_type.shape.bounding_box(self.rotation);
                let center = match self.rotation {
                    Some(rotation) => rotation.yaw_to_world(self.center),
                    None => self.center,
                };
                let offset = self.position + center;
                Bounds::from_min_max(local.mins * self.scale + offset, local.maxs * self.scale + offset)
            }
        };
    }

    /// Steps one tick of motion. Velocity moves the object first, then
    /// gravity accelerates it.
    pub fn integrate(&mut self, dt: f32, gravity: f32) {
        if self.is_fixed() || self.is_trigger() {
            return;
        }

        let dt = dt * self.time_scalar;
        self.position += self.velocity * dt;

        if self.flags.contains(ObjectFlags::GRAVITY) {
            self.velocity.y += dt * gravity;
        }
    }

    pub fn tick_counters(&mut self) {
        self.is_pushed = self.is_pushed.saturating_sub(1);
        self.is_jumping = self.is_jumping.saturating_sub(1);
        self.disable_friction = self.disable_friction.saturating_sub(1);
        self.under_water = self.under_water.saturating_sub(1);
        self.has_ice_dash = self.has_ice_dash.saturating_sub(1);
    }

    pub fn mark_pushed(&mut self) {
        self.is_pushed = ONE_TICK;
    }

    pub fn mark_jumping(&mut self) {
        self.is_jumping = ONE_TICK;
    }

    pub fn mark_disable_friction(&mut self) {
        self.disable_friction = ONE_TICK;
    }

    pub fn mark_under_water(&mut self) {
        self.under_water = ONE_TICK;
    }

    pub fn mark_ice_dash(&mut self) {
        self.has_ice_dash = ONE_TICK;
    }

    pub fn contacts<'a>(&self, pool: &'a ContactPool) -> impl Iterator<Item = (ContactId, &'a Contact)> {
        pool.iter(self.active_contacts)
    }

    /// Grounded when any contact normal is flat enough to stand on, or when
    /// the shadow cast found ground just below the bounding box.
    pub fn is_grounded(&self, pool: &ContactPool, shadow_tolerance: f32) -> bool {
        self.get_ground(pool, shadow_tolerance).is_some()
    }

    /// The contact the object is standing on: the flattest qualifying active
    /// contact, falling back to a nearby shadow contact.
    pub fn get_ground(&self, pool: &ContactPool, shadow_tolerance: f32) -> Option<ContactId> {
        let threshold = self.object_type.ground_threshold();

        let mut ground: Option<(ContactId, f32)> = None;
        for (id, contact) in self.contacts(pool) {
            if contact.normal.y > threshold && ground.map_or(true, |(_, y)| contact.normal.y > y) {
                ground = Some((id, contact.normal.y));
            }
        }

        if let Some((id, _)) = ground {
            return Some(id);
        }

        let shadow = self.shadow_contact?;
        let contact = pool.get(shadow);
        if contact.normal.y > threshold && contact.point.y >= self.bounding_box.mins.y - shadow_tolerance {
            Some(shadow)
        } else {
            None
        }
    }

    pub fn find_contact(&self, pool: &ContactPool, other: EntityId) -> Option<ContactId> {
        self.contacts(pool)
            .find(|(_, contact)| contact.other_object == other)
            .map(|(id, _)| id)
    }

    pub fn nearest_contact(&self, pool: &ContactPool, position: Vec3) -> Option<ContactId> {
        nearest_contact(pool, self.active_contacts, position)
    }
}

/// Applies offset, scale, pitch, yaw and translation to the shape.
impl MinkowskiSum for DynamicObject {
    fn support(&self, dir: Vec3) -> Vec3 {
        let mut local_dir = dir;
        if let Some(rotation) = self.rotation {
            local_dir = rotation.yaw_to_local(local_dir);
        }
        if let Some(pitch) = self.pitch {
            local_dir = pitch.pitch_to_local(local_dir);
        }

        let mut result = self.object_type.shape.support(local_dir) * self.scale + self.center;

        if let Some(pitch) = self.pitch {
            result = pitch.pitch_to_world(result);
        }
        if let Some(rotation) = self.rotation {
            result = rotation.yaw_to_world(result);
        }

        result + self.position
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::math_ext::rotation_from_angle;

    pub(crate) fn make_type(shape: Shape, bounce: f32, friction: f32) -> Arc<DynamicObjectType> {
        Arc::new(DynamicObjectType {
            shape,
            bounce,
            friction,
            max_stable_slope: 0.25,
        })
    }

    pub(crate) fn make_object(id: u32, shape: Shape, position: Vec3) -> DynamicObject {
        DynamicObject::new(
            EntityId(id),
            make_type(shape, 0.0, 0.0),
            CollisionLayers::TANGIBLE,
            position,
            None,
        )
    }

    #[test]
    fn test_integrate() {
        let mut object = make_object(1, Shape::make_sphere(0.5), Vec3::ZERO);
        object.velocity = Vec3::new(1.0, 0.0, 0.0);
        object.integrate(0.5, -10.0);
        assert!(object.position.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
        assert!(object.velocity.abs_diff_eq(Vec3::new(1.0, -5.0, 0.0), 1e-6));

        object.time_scalar = 0.5;
        object.integrate(0.5, -10.0);
        assert!(object.position.abs_diff_eq(Vec3::new(0.75, -1.25, 0.0), 1e-6));

        object.flags |= ObjectFlags::FIXED;
        let before = object.position;
        object.integrate(0.5, -10.0);
        assert_eq!(object.position, before);
    }

    #[test]
    fn test_bounding_box_follows_transform() {
        let mut object = make_object(1, Shape::make_box(Vec3::new(2.0, 1.0, 0.5)), Vec3::new(0.0, 5.0, 0.0));
        object.center = Vec3::new(1.0, 0.0, 0.0);
        object.set_scale(2.0);
        assert!(object.bounding_box.mins.abs_diff_eq(Vec3::new(-3.0, 3.0, -1.0), 1e-5));
        assert!(object.bounding_box.maxs.abs_diff_eq(Vec3::new(5.0, 7.0, 1.0), 1e-5));

        object.rotation = Some(rotation_from_angle(0.3));
        object.pitch = Some(rotation_from_angle(-0.6));
        object.recalc_bb();
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            assert!((object.support(axis).dot(axis) - object.bounding_box.maxs.dot(axis)).abs() < 1e-4);
            assert!((object.support(-axis).dot(axis) - object.bounding_box.mins.dot(axis)).abs() < 1e-4);
        }

        object.pitch = None;
        object.recalc_bb();
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            assert!((object.support(axis).dot(axis) - object.bounding_box.maxs.dot(axis)).abs() < 1e-4);
            assert!((object.support(-axis).dot(axis) - object.bounding_box.mins.dot(axis)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_grounded() {
        let mut pool = ContactPool::new(4);
        let mut object = make_object(1, Shape::make_sphere(0.5), Vec3::ZERO);
        assert!(!object.is_grounded(&pool, 0.1));

        // a wall doesn't hold anything up
        pool.push_front(
            &mut object.active_contacts,
            Contact {
                normal: Vec3::X,
                ..Contact::default()
            },
        );
        assert!(!object.is_grounded(&pool, 0.1));

        let slope = pool.push_front(
            &mut object.active_contacts,
            Contact {
                normal: Vec3::new(0.0, 0.31, 0.95),
                ..Contact::default()
            },
        );
        assert!(object.is_grounded(&pool, 0.1));
        assert_eq!(object.get_ground(&pool, 0.1), slope);

        pool.return_contacts(&mut object.active_contacts);

        // shadow contact right under the box counts, one far below doesn't
        let shadow = pool.allocate(Contact {
            point: Vec3::new(0.0, -0.55, 0.0),
            ..Contact::default()
        });
        object.shadow_contact = shadow;
        assert!(object.is_grounded(&pool, 0.1));
        pool.get_mut(shadow.unwrap()).point.y = -2.0;
        assert!(!object.is_grounded(&pool, 0.1));
    }

    #[test]
    fn test_should_slide() {
        assert!(!should_slide(0.0, 0.2, SurfaceType::Sticky));
        assert!(should_slide(1.0, 1.0, SurfaceType::Slippery));
        assert!(should_slide(0.1, 0.8, SurfaceType::Default));
        assert!(!should_slide(0.1, 0.95, SurfaceType::Default));
    }

    #[test]
    fn test_contact_queries() {
        let mut pool = ContactPool::new(4);
        let mut object = make_object(1, Shape::make_sphere(0.5), Vec3::ZERO);
        for (other, x) in [(2, 5.0), (3, 1.0), (4, -3.0)] {
            pool.push_front(
                &mut object.active_contacts,
                Contact {
                    other_object: EntityId(other),
                    point: Vec3::new(x, 0.0, 0.0),
                    ..Contact::default()
                },
            );
        }

        let nearest = object.nearest_contact(&pool, Vec3::ZERO).unwrap();
        assert_eq!(pool.get(nearest).other_object, EntityId(3));

        let found = object.find_contact(&pool, EntityId(4)).unwrap();
        assert_eq!(pool.get(found).point.x, -3.0);
        assert!(object.find_contact(&pool, EntityId(9)).is_none());
    }

    #[test]
    fn test_one_tick_counters() {
        let mut object = make_object(1, Shape::make_sphere(0.5), Vec3::ZERO);
        object.mark_jumping();
        object.tick_counters();
        assert!(object.is_jumping > 0);
        object.tick_counters();
        assert_eq!(object.is_jumping, 0);
        object.tick_counters();
        assert_eq!(object.is_jumping, 0);
    }
}

use crate::{
    collide::correct_velocity,
    config::CollisionConfig,
    contact::ContactPool,
    dynamic_object::{DynamicObject, EntityId},
    math_ext::{lerp, move_towards},
    mesh_collider::SurfaceType,
};
use glam::Vec3;

/// Velocity kept each tick by a fully submerged object.
const SUBMERGED_DRAG: f32 = 0.9;

/// Buoyancy and drag for an object whose shadow falls on water. An object
/// with an active ice dash is instead lifted onto the surface and stands on
/// it.
pub fn apply_water(object: &mut DynamicObject, pool: &mut ContactPool, config: &CollisionConfig) {
    let shadow = match object.shadow_contact {
        Some(shadow) => shadow,
        None => return,
    };

    let water_top = {
        let contact = pool.get(shadow);
        if contact.surface_type != SurfaceType::Water {
            return;
        }
        contact.point.y
    };

    if object.bounding_box.mins.y >= water_top {
        return;
    }

    let dt = config.fixed_time_step;

    if object.has_ice_dash > 0 {
        object.shadow_contact = None;

        let contact = pool.get_mut(shadow);
        contact.normal = Vec3::Y;
        contact.other_object = EntityId::NONE;
        contact.point = Vec3::new(object.position.x, water_top, object.position.z);
        contact.surface_type = SurfaceType::Water;
        pool.link_front(&mut object.active_contacts, shadow);

        let target_y = water_top + object.position.y - object.bounding_box.mins.y;
        let new_y = move_towards(object.position.y, target_y, config.max_water_lift_speed * dt);
        let lift = new_y - object.position.y;
        object.position.y = new_y;
        object.bounding_box.translate(Vec3::new(0.0, lift, 0.0));

        correct_velocity(&mut object.velocity, Vec3::Y, 0.0, 0.0);
        return;
    }

    let bb = &object.bounding_box;
    let underwater_ratio = if bb.maxs.y <= water_top {
        1.0
    } else {
        (water_top - bb.mins.y) / (bb.maxs.y - bb.mins.y)
    };

    let density_level = config.gravity / object.density_class.buoyancy_divisor();

    object.velocity *= lerp(1.0, SUBMERGED_DRAG, underwater_ratio);
    object.velocity.y -= underwater_ratio * density_level * dt;

    if underwater_ratio > 0.5 {
        object.mark_under_water();
    }
}

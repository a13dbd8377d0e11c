use crate::{
    contact::{Contact, ContactPool},
    dynamic_object::{DynamicObject, EntityId},
    epa::{epa_solve, EpaResult},
    gjk::gjk_check_for_overlap,
    mesh_collider::{MeshCollider, SurfaceType},
    spatial_trigger::SpatialTrigger,
};
use glam::Vec3;
use std::cmp::Ordering;

/// Removes the part of `velocity` going into the surface, reflecting it
/// scaled by `bounce`, and scales what slides along the surface by
/// `1 - friction`. Velocity leaving the surface is untouched.
pub fn correct_velocity(velocity: &mut Vec3, normal: Vec3, bounce: f32, friction: f32) {
    let velocity_dot = velocity.dot(normal);
    if velocity_dot >= 0.0 {
        return;
    }

    let tangent_velocity = *velocity - normal * velocity_dot;
    *velocity = tangent_velocity * (1.0 - friction) - normal * (velocity_dot * bounce);
}

fn object_friction(object: &DynamicObject) -> f32 {
    if object.disable_friction > 0 {
        0.0
    } else {
        object.object_type.friction
    }
}

/// Moves the object and its cached bounding box together.
pub(crate) fn move_object(object: &mut DynamicObject, offset: Vec3) {
    object.position += offset;
    object.bounding_box.translate(offset);
}

fn collide_object_to_triangle(
    object: &mut DynamicObject,
    mesh: &MeshCollider,
    index: usize,
    pool: &mut ContactPool,
) {
    let triangle = mesh.triangle(index);

    let simplex = match gjk_check_for_overlap(&triangle, &*object, Vec3::X) {
        Some(simplex) => simplex,
        None => return,
    };

    let result = match epa_solve(&triangle, &*object, &simplex) {
        Some(result) => result,
        None => return,
    };

    if !mesh.filter_edge_contact(index, result.normal) {
        return;
    }

    move_object(object, result.normal * result.penetration);

    let friction = object_friction(object);
    correct_velocity(&mut object.velocity, result.normal, object.object_type.bounce, friction);

    pool.push_front(
        &mut object.active_contacts,
        Contact {
            normal: result.normal,
            point: result.contact_a,
            surface_type: triangle.triangle.surface_type,
            other_object: EntityId::NONE,
            next: None,
        },
    );
}

/// Pushes the object out of every triangle it overlaps.
pub fn collide_object_to_mesh(object: &mut DynamicObject, mesh: &MeshCollider, pool: &mut ContactPool) {
    let mut candidates = Vec::new();
    mesh.lookup(&object.bounding_box, object.collision_layers, |index| candidates.push(index));

    for index in candidates {
        collide_object_to_triangle(object, mesh, index, pool);
    }
}

/// Whether two registered objects should be tested against each other at all.
pub fn should_collide(a: &DynamicObject, b: &DynamicObject) -> bool {
    if a.entity_id.is_none() || b.entity_id.is_none() {
        return false;
    }

    if !a.collision_layers.intersects(b.collision_layers) {
        return false;
    }

    if a.collision_group != 0 && a.collision_group == b.collision_group {
        return false;
    }

    if a.is_trigger() && (b.is_trigger() || b.is_fixed()) {
        return false;
    }

    if b.is_trigger() && a.is_fixed() {
        return false;
    }

    !(a.is_fixed() && b.is_fixed())
}

/// Fraction of the separation each object takes on.
pub(crate) fn push_shares(a: &DynamicObject, b: &DynamicObject) -> (f32, f32) {
    if !a.should_push() || !b.should_push() {
        return (0.0, 0.0);
    }

    match (a.is_fixed(), b.is_fixed()) {
        (true, true) => (0.0, 0.0),
        (true, false) => (0.0, 1.0),
        (false, true) => (1.0, 0.0),
        (false, false) => match a.weight_class.cmp(&b.weight_class) {
            Ordering::Greater => (0.0, 1.0),
            Ordering::Less => (1.0, 0.0),
            Ordering::Equal => (0.5, 0.5),
        },
    }
}

/// Records a contact on both objects naming the other one. `result.normal`
/// points from `a` toward `b`.
pub(crate) fn record_pair_contacts(
    a: &mut DynamicObject,
    b: &mut DynamicObject,
    result: &EpaResult,
    pool: &mut ContactPool,
) {
    pool.push_front(
        &mut a.active_contacts,
        Contact {
            normal: -result.normal,
            point: result.contact_b,
            surface_type: SurfaceType::Default,
            other_object: b.entity_id,
            next: None,
        },
    );
    pool.push_front(
        &mut b.active_contacts,
        Contact {
            normal: result.normal,
            point: result.contact_a,
            surface_type: SurfaceType::Default,
            other_object: a.entity_id,
            next: None,
        },
    );
}

/// Direct overlap test between two objects. Assumes `should_collide` passed.
pub fn collide_object_to_object(a: &mut DynamicObject, b: &mut DynamicObject, pool: &mut ContactPool) {
    let simplex = match gjk_check_for_overlap(&*a, &*b, b.position - a.position) {
        Some(simplex) => simplex,
        None => return,
    };

    if !a.needs_overlap() || !b.needs_overlap() {
        // occupancy is all a basic trigger wants
        let normal = (b.position - a.position).normalize_or_zero();
        let result = EpaResult {
            contact_a: a.position,
            contact_b: b.position,
            normal: if normal == Vec3::ZERO { Vec3::Y } else { normal },
            ..EpaResult::default()
        };
        record_pair_contacts(a, b, &result, pool);
        return;
    }

    let result = match epa_solve(&*a, &*b, &simplex) {
        Some(result) => result,
        None => return,
    };

    let (a_share, b_share) = push_shares(a, b);

    if a_share > 0.0 {
        move_object(a, -result.normal * (result.penetration * a_share));
        let friction = object_friction(a);
        correct_velocity(&mut a.velocity, -result.normal, a.object_type.bounce, friction);
        a.mark_pushed();
    }

    if b_share > 0.0 {
        move_object(b, result.normal * (result.penetration * b_share));
        let friction = object_friction(b);
        correct_velocity(&mut b.velocity, result.normal, b.object_type.bounce, friction);
        b.mark_pushed();
    }

    record_pair_contacts(a, b, &result, pool);
}

/// Records the object in the trigger when they overlap.
pub fn collide_object_to_trigger(object: &DynamicObject, trigger: &mut SpatialTrigger, pool: &mut ContactPool) {
    if object.entity_id.is_none() || !object.collision_layers.intersects(trigger.collision_layers) {
        return;
    }

    if gjk_check_for_overlap(&*trigger, object, object.position - trigger.position).is_none() {
        return;
    }

    pool.push_front(
        &mut trigger.active_contacts,
        Contact {
            normal: Vec3::Y,
            point: object.position,
            surface_type: SurfaceType::Default,
            other_object: object.entity_id,
            next: None,
        },
    );
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dynamic_object::{test::make_object, CollisionLayers, ObjectFlags, TriggerType, WeightClass},
        mesh_collider::test::make_floor,
        shapes::Shape,
        spatial_trigger::TriggerShape,
    };

    #[test]
    fn test_floor_bounce_and_friction() {
        let mut velocity = Vec3::new(4.0, -10.0, 0.0);
        correct_velocity(&mut velocity, Vec3::Y, 0.5, 0.25);
        assert!(velocity.abs_diff_eq(Vec3::new(3.0, 5.0, 0.0), 1e-5));

        // moving away from the surface keeps everything
        let mut velocity = Vec3::new(4.0, 10.0, 0.0);
        correct_velocity(&mut velocity, Vec3::Y, 0.5, 0.25);
        assert_eq!(velocity, Vec3::new(4.0, 10.0, 0.0));
    }

    #[test]
    fn test_object_rests_on_floor() {
        let floor = make_floor(10.0, 0.0, SurfaceType::Sticky);
        let mut pool = ContactPool::new(16);
        let mut object = make_object(1, Shape::make_box(Vec3::splat(0.5)), Vec3::new(3.0, 0.3, -4.0));
        object.velocity = Vec3::new(2.0, -3.0, 0.0);

        collide_object_to_mesh(&mut object, &floor, &mut pool);

        assert!((object.position.y - 0.5).abs() < 1e-3, "{:?}", object.position);
        assert!((object.bounding_box.mins.y).abs() < 1e-3);
        assert!(object.velocity.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-4));

        let contacts: Vec<_> = object.contacts(&pool).map(|(_, contact)| *contact).collect();
        assert!(!contacts.is_empty());
        for contact in contacts {
            assert!(contact.normal.abs_diff_eq(Vec3::Y, 1e-4));
            assert_eq!(contact.surface_type, SurfaceType::Sticky);
            assert!(contact.other_object.is_none());
        }
        assert!(object.is_grounded(&pool, 0.1));
    }

    #[test]
    fn test_disabled_friction() {
        let floor = make_floor(10.0, 0.0, SurfaceType::Default);
        let mut pool = ContactPool::new(16);
        let mut object = make_object(1, Shape::make_sphere(0.5), Vec3::new(3.0, 0.4, -4.0));
        std::sync::Arc::make_mut(&mut object.object_type).friction = 0.5;
        object.velocity = Vec3::new(2.0, -1.0, 0.0);
        object.mark_disable_friction();

        collide_object_to_mesh(&mut object, &floor, &mut pool);
        assert!((object.velocity.x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_collision_gating() {
        let shape = Shape::make_sphere(1.0);
        let a = make_object(1, shape.clone(), Vec3::ZERO);
        let mut b = make_object(2, shape.clone(), Vec3::X);
        assert!(should_collide(&a, &b));

        b.collision_group = 3;
        assert!(should_collide(&a, &b));
        let mut c = a.clone();
        c.entity_id = EntityId(7);
        c.collision_group = 3;
        assert!(!should_collide(&c, &b));

        let mut trigger = make_object(4, shape.clone(), Vec3::ZERO);
        trigger.trigger_type = TriggerType::Overlap;
        let mut fixed = make_object(5, shape.clone(), Vec3::ZERO);
        fixed.flags |= ObjectFlags::FIXED;
        assert!(!should_collide(&trigger, &fixed));
        assert!(!should_collide(&fixed, &trigger));
        assert!(!should_collide(&fixed, &fixed.clone()));
        assert!(should_collide(&fixed, &a));

        let mut other_layer = make_object(6, shape, Vec3::ZERO);
        other_layer.collision_layers = CollisionLayers::DAMAGE_ENEMY;
        assert!(!should_collide(&a, &other_layer));
    }

    #[test]
    fn test_heavier_object_pushes() {
        let mut pool = ContactPool::new(16);
        let shape = Shape::make_sphere(1.0);
        let mut a = make_object(1, shape.clone(), Vec3::ZERO);
        let mut b = make_object(2, shape, Vec3::new(1.5, 0.0, 0.0));
        a.weight_class = WeightClass::Heavy;

        collide_object_to_object(&mut a, &mut b, &mut pool);

        assert_eq!(a.position, Vec3::ZERO);
        assert!((b.position.x - 2.0).abs() < 1e-2, "{:?}", b.position);
        assert!(b.is_pushed > 0);
        assert_eq!(a.is_pushed, 0);

        let a_contact = a.find_contact(&pool, EntityId(2)).unwrap();
        let b_contact = b.find_contact(&pool, EntityId(1)).unwrap();
        assert!(pool.get(a_contact).normal.x < -0.99);
        assert!(pool.get(b_contact).normal.x > 0.99);
    }

    #[test]
    fn test_equal_weights_share() {
        let mut pool = ContactPool::new(16);
        let shape = Shape::make_box(Vec3::splat(1.0));
        let mut a = make_object(1, shape.clone(), Vec3::ZERO);
        let mut b = make_object(2, shape, Vec3::new(1.0, 0.0, 0.0));

        collide_object_to_object(&mut a, &mut b, &mut pool);

        assert!((a.position.x + 0.5).abs() < 1e-3, "{:?}", a.position);
        assert!((b.position.x - 1.5).abs() < 1e-3, "{:?}", b.position);
    }

    #[test]
    fn test_overlap_trigger_doesnt_push() {
        let mut pool = ContactPool::new(16);
        let shape = Shape::make_sphere(1.0);
        let mut trigger = make_object(1, shape.clone(), Vec3::ZERO);
        trigger.trigger_type = TriggerType::Overlap;
        let mut b = make_object(2, shape, Vec3::new(1.0, 0.0, 0.0));

        collide_object_to_object(&mut trigger, &mut b, &mut pool);

        assert_eq!(b.position, Vec3::new(1.0, 0.0, 0.0));
        assert!(trigger.find_contact(&pool, EntityId(2)).is_some());
        assert!(b.find_contact(&pool, EntityId(1)).is_some());
    }

    #[test]
    fn test_spatial_trigger_records_object() {
        let mut pool = ContactPool::new(4);
        let mut trigger = SpatialTrigger::new(
            EntityId(9),
            TriggerShape::Box {
                half_size: Vec3::splat(2.0),
            },
            CollisionLayers::TANGIBLE,
            Vec3::ZERO,
            None,
        );
        let inside = make_object(1, Shape::make_sphere(0.5), Vec3::new(2.2, 0.0, 0.0));
        let outside = make_object(2, Shape::make_sphere(0.5), Vec3::new(3.0, 0.0, 0.0));

        collide_object_to_trigger(&inside, &mut trigger, &mut pool);
        collide_object_to_trigger(&outside, &mut trigger, &mut pool);

        let others: Vec<EntityId> = pool
            .iter(trigger.active_contacts)
            .map(|(_, contact)| contact.other_object)
            .collect();
        assert_eq!(others, vec![EntityId(1)]);
    }
}

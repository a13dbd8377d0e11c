use crate::{
    collide::{correct_velocity, move_object, push_shares, record_pair_contacts},
    contact::{Contact, ContactPool},
    dynamic_object::{DynamicObject, EntityId},
    epa::{epa_solve_swept, EpaResult},
    gjk::gjk_check_for_overlap,
    mesh_collider::{MeshCollider, SurfaceType},
    shapes::SweptOffset,
};
use glam::Vec3;
use log::debug;

const MIN_MOTION_SQ: f32 = 1e-8;
const CAP_VELOCITY_DAMPING: f32 = 0.9;
const FACE_NORMAL_COSINE: f32 = 0.999;
/// Motion within this cosine of the contact plane slides along it.
const GRAZING_COSINE: f32 = 1e-3;

/// True when the object moved farther than half its own size on some axis,
/// far enough that a direct overlap test could miss thin geometry.
pub fn needs_swept(object: &DynamicObject, prev_position: Vec3) -> bool {
    let half_extent = object.bounding_box.width() * 0.5;
    (object.position - prev_position).abs().cmpgt(half_extent).any()
}

/// Bounces only the part of the velocity heading into the surface.
fn bounce_velocity(velocity: &mut Vec3, normal: Vec3, bounce: f32) {
    let velocity_dot = velocity.dot(normal);
    if velocity_dot < 0.0 {
        *velocity -= normal * (velocity_dot * (1.0 + bounce));
    }
}

fn earliest_mesh_hit(
    object: &DynamicObject,
    motion: Vec3,
    meshes: &[MeshCollider],
) -> Option<(EpaResult, SurfaceType)> {
    // the hull of the object at both ends of the motion
    let swept = SweptOffset {
        inner: object,
        offset: -motion,
    };
    let swept_bounds = object.bounding_box.extend_direction(-motion);
    let motion_length = motion.length();

    let mut earliest: Option<(EpaResult, SurfaceType)> = None;

    for mesh in meshes {
        mesh.lookup(&swept_bounds, object.collision_layers, |index| {
            let triangle = mesh.triangle(index);
            if gjk_check_for_overlap(&triangle, &swept, motion).is_none() {
                return;
            }

            let mut hit = match epa_solve_swept(&triangle, object, motion) {
                Some(hit) => hit,
                None => return,
            };

            // closest points on a face are only approximate, take the face normal itself
            let face_normal = triangle.normal();
            if hit.normal.dot(face_normal) > FACE_NORMAL_COSINE {
                hit.normal = face_normal;
            }

            if -motion.dot(hit.normal) <= motion_length * GRAZING_COSINE {
                return;
            }

            if !mesh.filter_edge_contact(index, hit.normal) {
                return;
            }

            if earliest.map_or(true, |(best, _)| hit.time < best.time) {
                earliest = Some((hit, triangle.triangle.surface_type));
            }
        });
    }

    earliest
}

/// Walks the object from `prev_position` to where integration put it,
/// stopping at the first surface hit and sliding the rest of the motion
/// along it. Returns true when anything was hit.
pub fn collide_object_to_meshes_swept(
    object: &mut DynamicObject,
    prev_position: Vec3,
    meshes: &[MeshCollider],
    pool: &mut ContactPool,
    max_iterations: u32,
) -> bool {
    let mut safe_position = prev_position;
    let mut hit_any = false;

    for iteration in 0..=max_iterations {
        let motion = object.position - safe_position;
        if motion.length_squared() < MIN_MOTION_SQ {
            break;
        }

        let (hit, surface_type) = match earliest_mesh_hit(object, motion, meshes) {
            Some(hit) => hit,
            None => break,
        };

        if iteration == max_iterations {
            debug!(
                "{:?} still hitting after {} swept iterations, snapping back",
                object.entity_id, max_iterations
            );
            move_object(object, safe_position - object.position);
            object.velocity *= CAP_VELOCITY_DAMPING;
            break;
        }

        let remaining = motion * (1.0 - hit.time);
        safe_position = object.position - remaining;

        // whatever motion is left slides along the contact plane
        let into_surface = remaining.dot(hit.normal).min(0.0);
        let slide = remaining - hit.normal * into_surface;
        move_object(object, safe_position + slide - object.position);

        bounce_velocity(&mut object.velocity, hit.normal, object.object_type.bounce);

        pool.push_front(
            &mut object.active_contacts,
            Contact {
                normal: hit.normal,
                point: hit.contact_a,
                surface_type,
                other_object: EntityId::NONE,
                next: None,
            },
        );
        hit_any = true;
    }

    hit_any
}

/// Rolls both objects back to their time of impact. Returns false when the
/// sweep found nothing, the caller then runs the direct test.
pub fn collide_object_to_object_swept(
    a: &mut DynamicObject,
    a_prev: Vec3,
    b: &mut DynamicObject,
    b_prev: Vec3,
    pool: &mut ContactPool,
) -> bool {
    let a_motion = a.position - a_prev;
    let b_motion = b.position - b_prev;

    // b's motion as seen from a
    let relative_motion = b_motion - a_motion;
    if relative_motion.length_squared() < MIN_MOTION_SQ {
        return false;
    }

    let mut hit = match epa_solve_swept(&*a, &*b, relative_motion) {
        Some(hit) => hit,
        None => return false,
    };

    let rewind = 1.0 - hit.time;
    move_object(a, -a_motion * rewind);
    move_object(b, -b_motion * rewind);
    hit.contact_a -= a_motion * rewind;
    hit.contact_b -= a_motion * rewind;

    let (a_share, b_share) = push_shares(a, b);
    if a_share > 0.0 && b_share > 0.0 {
        a.velocity -= hit.normal * a.velocity.dot(hit.normal);
        b.velocity -= hit.normal * b.velocity.dot(hit.normal);
    } else if a_share > 0.0 {
        // the normal points from a toward b
        correct_velocity(&mut a.velocity, -hit.normal, 0.0, 0.0);
    } else if b_share > 0.0 {
        correct_velocity(&mut b.velocity, hit.normal, 0.0, 0.0);
    }

    if a_share > 0.0 {
        a.mark_pushed();
    }
    if b_share > 0.0 {
        b.mark_pushed();
    }

    record_pair_contacts(a, b, &hit, pool);
    true
}

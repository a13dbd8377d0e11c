use crate::{
    bounds::Bounds,
    broadphase::broadphase,
    collide::{
        collide_object_to_mesh, collide_object_to_object, collide_object_to_trigger, correct_velocity,
        move_object, should_collide,
    },
    collide_swept::{collide_object_to_meshes_swept, collide_object_to_object_swept, needs_swept},
    config::CollisionConfig,
    contact::{Contact, ContactIter, ContactPool},
    dynamic_object::{CollisionLayers, DynamicObject, EntityId, ObjectFlags},
    error::CollisionError,
    gjk::gjk_check_for_overlap,
    mesh_collider::{MeshCollider, ShadowCastResult},
    shapes::{Positioned, Shape},
    spatial_trigger::SpatialTrigger,
    water::apply_water,
};
use arrayvec::ArrayVec;
use glam::{Vec2, Vec3};
use log::{info, warn};
use std::{cmp::Ordering, collections::HashMap};

pub const MAX_STATIC_MESHES: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(u32);

#[derive(Debug)]
enum CollisionElement {
    Object(DynamicObject),
    Trigger(SpatialTrigger),
}

impl CollisionElement {
    fn bounding_box(&self) -> Bounds {
        match self {
            CollisionElement::Object(object) => object.bounding_box,
            CollisionElement::Trigger(trigger) => trigger.bounding_box,
        }
    }

    fn entity_id(&self) -> EntityId {
        match self {
            CollisionElement::Object(object) => object.entity_id,
            CollisionElement::Trigger(trigger) => trigger.entity_id,
        }
    }
}

fn get_element_pair_mut(
    elements: &mut [CollisionElement],
    index_a: usize,
    index_b: usize,
) -> Option<(&mut CollisionElement, &mut CollisionElement)> {
    match index_a.cmp(&index_b) {
        Ordering::Less => {
            let (head, tail) = elements.split_at_mut(index_b);
            Some((&mut head[index_a], &mut tail[0]))
        }
        Ordering::Greater => {
            let (head, tail) = elements.split_at_mut(index_a);
            Some((&mut tail[0], &mut head[index_b]))
        }
        Ordering::Equal => None,
    }
}

/// Highest upward facing surface below `point` across all meshes.
fn shadow_cast_meshes(meshes: &[MeshCollider], point: Vec3) -> Option<ShadowCastResult> {
    meshes
        .iter()
        .filter_map(|mesh| mesh.shadow_cast(point))
        .fold(None, |best: Option<ShadowCastResult>, hit| match best {
            Some(best) if best.y >= hit.y => Some(best),
            _ => Some(hit),
        })
}

/// Pulls an object that just walked off a ledge or down a slope back onto
/// the ground below, as long as the drop is shallow compared to how far it
/// moved sideways.
fn snap_to_ground(
    object: &mut DynamicObject,
    prev_position: Vec3,
    pool: &ContactPool,
    config: &CollisionConfig,
) {
    let shadow = match object.shadow_contact {
        Some(shadow) => *pool.get(shadow),
        None => return,
    };

    if shadow.normal.y <= object.object_type.ground_threshold() {
        return;
    }

    let drop = object.bounding_box.mins.y - shadow.point.y;
    if drop <= 0.0 {
        return;
    }

    let motion = object.position - prev_position;
    let horizontal = Vec2::new(motion.x, motion.z).length();
    if drop > horizontal * config.ground_snap_cone_degrees.to_radians().tan() {
        return;
    }

    move_object(object, Vec3::new(0.0, -drop, 0.0));
    correct_velocity(&mut object.velocity, shadow.normal, 0.0, 0.0);
}

/// Holds an object that fell through the world at the kill plane and flags
/// it. Returns true when the object should be despawned.
fn clamp_to_kill_plane(object: &mut DynamicObject, kill_plane: f32) -> bool {
    if object.position.y >= kill_plane {
        return false;
    }

    move_object(object, Vec3::new(0.0, kill_plane - object.position.y, 0.0));
    object.velocity.y = 0.0;
    object.flags.insert(ObjectFlags::HIT_KILL_PLANE);
    true
}

/// Owns every dynamic object, spatial trigger and static mesh and advances
/// them one fixed step at a time.
pub struct CollisionWorld {
    config: CollisionConfig,
    elements: Vec<CollisionElement>,
    entity_index: HashMap<EntityId, usize>,
    meshes: ArrayVec<MeshCollider, MAX_STATIC_MESHES>,
    mesh_handles: ArrayVec<MeshHandle, MAX_STATIC_MESHES>,
    next_mesh_handle: u32,
    pool: ContactPool,
    kill_plane: f32,
}

impl CollisionWorld {
    pub fn new(config: CollisionConfig) -> Self {
        let pool = ContactPool::new(config.contact_pool_capacity);
        Self {
            config,
            elements: Vec::new(),
            entity_index: HashMap::new(),
            meshes: ArrayVec::new(),
            mesh_handles: ArrayVec::new(),
            next_mesh_handle: 0,
            pool,
            kill_plane: f32::NEG_INFINITY,
        }
    }

    pub fn reset(&mut self) {
        self.elements.clear();
        self.entity_index.clear();
        self.meshes.clear();
        self.mesh_handles.clear();
        self.pool.clear();
        self.kill_plane = f32::NEG_INFINITY;
    }

    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    fn add_element(&mut self, element: CollisionElement) -> Result<(), CollisionError> {
        let entity_id = element.entity_id();
        if entity_id.is_none() {
            return Err(CollisionError::NullEntity);
        }

        if self.entity_index.contains_key(&entity_id) {
            warn!("rejected second registration of {:?}", entity_id);
            return Err(CollisionError::DuplicateEntity(entity_id));
        }

        self.entity_index.insert(entity_id, self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    fn remove_element(&mut self, entity_id: EntityId) -> Option<CollisionElement> {
        let index = self.entity_index.remove(&entity_id)?;
        let mut element = self.elements.swap_remove(index);

        if let Some(moved) = self.elements.get(index) {
            self.entity_index.insert(moved.entity_id(), index);
        }

        match &mut element {
            CollisionElement::Object(object) => {
                self.pool.return_contacts(&mut object.active_contacts);
                if let Some(shadow) = object.shadow_contact.take() {
                    self.pool.release(shadow);
                }
            }
            CollisionElement::Trigger(trigger) => {
                self.pool.return_contacts(&mut trigger.active_contacts);
            }
        }

        Some(element)
    }

    pub fn add_object(&mut self, mut object: DynamicObject) -> Result<(), CollisionError> {
        object.recalc_bb();
        object.active_contacts = None;
        object.shadow_contact = None;
        self.add_element(CollisionElement::Object(object))
    }

    pub fn remove_object(&mut self, entity_id: EntityId) -> Option<DynamicObject> {
        self.find_object(entity_id)?;
        match self.remove_element(entity_id)? {
            CollisionElement::Object(object) => Some(object),
            CollisionElement::Trigger(_) => None,
        }
    }

    pub fn add_trigger(&mut self, mut trigger: SpatialTrigger) -> Result<(), CollisionError> {
        trigger.recalc_bb();
        trigger.active_contacts = None;
        self.add_element(CollisionElement::Trigger(trigger))
    }

    pub fn remove_trigger(&mut self, entity_id: EntityId) -> Option<SpatialTrigger> {
        self.find_trigger(entity_id)?;
        match self.remove_element(entity_id)? {
            CollisionElement::Trigger(trigger) => Some(trigger),
            CollisionElement::Object(_) => None,
        }
    }

    /// Registers a static mesh. Panics when `MAX_STATIC_MESHES` are already
    /// loaded, that's a level content problem not a runtime one.
    pub fn add_static_mesh(&mut self, mesh: MeshCollider) -> MeshHandle {
        assert!(
            self.meshes.len() < MAX_STATIC_MESHES,
            "at most {} static meshes can be loaded at once",
            MAX_STATIC_MESHES
        );

        let handle = MeshHandle(self.next_mesh_handle);
        self.next_mesh_handle += 1;
        self.meshes.push(mesh);
        self.mesh_handles.push(handle);
        self.update_kill_plane();
        handle
    }

    pub fn remove_static_mesh(&mut self, handle: MeshHandle) -> Option<MeshCollider> {
        let index = self.mesh_handles.iter().position(|h| *h == handle)?;
        self.mesh_handles.remove(index);
        let mesh = self.meshes.remove(index);
        self.update_kill_plane();
        Some(mesh)
    }

    pub fn static_meshes(&self) -> &[MeshCollider] {
        &self.meshes
    }

    fn update_kill_plane(&mut self) {
        let margin = self.config.kill_plane_margin;
        self.kill_plane = self
            .meshes
            .iter()
            .map(MeshCollider::lowest_point)
            .reduce(f32::min)
            .map_or(f32::NEG_INFINITY, |lowest| lowest - margin);
    }

    /// Objects falling below this height are despawned.
    pub fn kill_plane(&self) -> f32 {
        self.kill_plane
    }

    pub fn find_object(&self, entity_id: EntityId) -> Option<&DynamicObject> {
        match self.elements.get(*self.entity_index.get(&entity_id)?)? {
            CollisionElement::Object(object) => Some(object),
            CollisionElement::Trigger(_) => None,
        }
    }

    pub fn find_object_mut(&mut self, entity_id: EntityId) -> Option<&mut DynamicObject> {
        match self.elements.get_mut(*self.entity_index.get(&entity_id)?)? {
            CollisionElement::Object(object) => Some(object),
            CollisionElement::Trigger(_) => None,
        }
    }

    pub fn find_trigger(&self, entity_id: EntityId) -> Option<&SpatialTrigger> {
        match self.elements.get(*self.entity_index.get(&entity_id)?)? {
            CollisionElement::Trigger(trigger) => Some(trigger),
            CollisionElement::Object(_) => None,
        }
    }

    pub fn find_trigger_mut(&mut self, entity_id: EntityId) -> Option<&mut SpatialTrigger> {
        match self.elements.get_mut(*self.entity_index.get(&entity_id)?)? {
            CollisionElement::Trigger(trigger) => Some(trigger),
            CollisionElement::Object(_) => None,
        }
    }

    pub fn objects(&self) -> impl Iterator<Item = &DynamicObject> {
        self.elements.iter().filter_map(|element| match element {
            CollisionElement::Object(object) => Some(object),
            CollisionElement::Trigger(_) => None,
        })
    }

    pub fn triggers(&self) -> impl Iterator<Item = &SpatialTrigger> {
        self.elements.iter().filter_map(|element| match element {
            CollisionElement::Trigger(trigger) => Some(trigger),
            CollisionElement::Object(_) => None,
        })
    }

    pub fn contacts(&self) -> &ContactPool {
        &self.pool
    }

    /// Contacts recorded for an object or trigger during the last tick.
    pub fn contacts_of(&self, entity_id: EntityId) -> ContactIter<'_> {
        let head = self
            .entity_index
            .get(&entity_id)
            .and_then(|index| self.elements.get(*index))
            .and_then(|element| match element {
                CollisionElement::Object(object) => object.active_contacts,
                CollisionElement::Trigger(trigger) => trigger.active_contacts,
            });
        self.pool.iter(head)
    }

    pub fn is_grounded(&self, entity_id: EntityId) -> bool {
        self.find_object(entity_id)
            .map_or(false, |object| object.is_grounded(&self.pool, self.config.shadow_ground_tolerance))
    }

    pub fn shadow_cast(&self, point: Vec3) -> Option<ShadowCastResult> {
        shadow_cast_meshes(&self.meshes, point)
    }

    /// Calls `callback` for every object on a shared layer that overlaps
    /// `shape` placed at `center`.
    pub fn query(
        &self,
        shape: &Shape,
        center: Vec3,
        collision_layers: CollisionLayers,
        mut callback: impl FnMut(&DynamicObject),
    ) {
        let positioned = Positioned::new(shape, center, None);
        let bounds = positioned.bounding_box();

        for object in self.objects() {
            if object.entity_id.is_none()
                || !object.collision_layers.intersects(collision_layers)
                || !object.bounding_box.intersects(&bounds)
            {
                continue;
            }

            if gjk_check_for_overlap(&positioned, object, object.position - center).is_some() {
                callback(object);
            }
        }
    }

    /// Calls `callback` for every trigger on a shared layer containing `point`.
    pub fn query_trigger(
        &self,
        point: Vec3,
        collision_layers: CollisionLayers,
        mut callback: impl FnMut(&SpatialTrigger),
    ) {
        for trigger in self.triggers() {
            if trigger.collision_layers.intersects(collision_layers) && trigger.does_contain_point(point) {
                callback(trigger);
            }
        }
    }

    /// Advances the world by one fixed step. Returns the objects that fell
    /// below the kill plane, they have already been removed.
    pub fn collide(&mut self) -> Vec<EntityId> {
        let dt = self.config.fixed_time_step;
        let gravity = self.config.gravity;
        let ground_tolerance = self.config.shadow_ground_tolerance;

        let mut prev_positions = Vec::with_capacity(self.elements.len());
        let mut was_grounded = Vec::with_capacity(self.elements.len());

        for element in self.elements.iter_mut() {
            match element {
                CollisionElement::Object(object) => {
                    prev_positions.push(object.position);
                    was_grounded.push(object.is_grounded(&self.pool, ground_tolerance));

                    self.pool.return_contacts(&mut object.active_contacts);
                    if let Some(shadow) = object.shadow_contact.take() {
                        self.pool.release(shadow);
                    }

                    object.tick_counters();
                    object.integrate(dt, gravity);
                    object.recalc_bb();
                }
                CollisionElement::Trigger(trigger) => {
                    prev_positions.push(trigger.position);
                    was_grounded.push(false);

                    self.pool.return_contacts(&mut trigger.active_contacts);
                    trigger.recalc_bb();
                }
            }
        }

        // fast objects enter the broad phase with everything they passed through
        let bounds: Vec<Bounds> = self
            .elements
            .iter()
            .zip(&prev_positions)
            .map(|(element, prev_position)| match element {
                CollisionElement::Object(object) if !object.is_trigger() && needs_swept(object, *prev_position) => {
                    object.bounding_box.extend_direction(*prev_position - object.position)
                }
                _ => element.bounding_box(),
            })
            .collect();

        for pair in broadphase(&bounds) {
            let (element_a, element_b) = match get_element_pair_mut(&mut self.elements, pair.a, pair.b) {
                Some(elements) => elements,
                None => continue,
            };

            match (element_a, element_b) {
                (CollisionElement::Object(a), CollisionElement::Object(b)) => {
                    if !should_collide(a, b) {
                        continue;
                    }

                    let a_prev = prev_positions[pair.a];
                    let b_prev = prev_positions[pair.b];
                    let swept = !a.is_trigger()
                        && !b.is_trigger()
                        && (needs_swept(a, a_prev) || needs_swept(b, b_prev));

                    if !swept || !collide_object_to_object_swept(a, a_prev, b, b_prev, &mut self.pool) {
                        collide_object_to_object(a, b, &mut self.pool);
                    }
                }
                (CollisionElement::Object(object), CollisionElement::Trigger(trigger))
                | (CollisionElement::Trigger(trigger), CollisionElement::Object(object)) => {
                    collide_object_to_trigger(object, trigger, &mut self.pool);
                }
                (CollisionElement::Trigger(_), CollisionElement::Trigger(_)) => {}
            }
        }

        let mut despawned = Vec::new();

        for (index, element) in self.elements.iter_mut().enumerate() {
            let object = match element {
                CollisionElement::Object(object) if !object.is_fixed() && !object.is_trigger() => object,
                _ => continue,
            };
            let prev_position = prev_positions[index];

            if needs_swept(object, prev_position) {
                collide_object_to_meshes_swept(
                    object,
                    prev_position,
                    &self.meshes,
                    &mut self.pool,
                    self.config.max_swept_iterations,
                );
            }

            for mesh in &self.meshes {
                collide_object_to_mesh(object, mesh, &mut self.pool);
            }

            match shadow_cast_meshes(&self.meshes, object.position) {
                Some(hit) => {
                    object.flags.remove(ObjectFlags::OUT_OF_BOUNDS);
                    object.shadow_contact = self.pool.allocate(Contact {
                        normal: hit.normal,
                        point: Vec3::new(object.position.x, hit.y, object.position.z),
                        surface_type: hit.surface_type,
                        other_object: EntityId::NONE,
                        next: None,
                    });
                }
                None => object.flags.insert(ObjectFlags::OUT_OF_BOUNDS),
            }

            apply_water(object, &mut self.pool, &self.config);

            if was_grounded[index]
                && object.is_jumping == 0
                && !object.is_grounded(&self.pool, ground_tolerance)
            {
                snap_to_ground(object, prev_position, &self.pool, &self.config);
            }

            if clamp_to_kill_plane(object, self.kill_plane) {
                info!("{:?} fell below the kill plane at {}", object.entity_id, self.kill_plane);
                despawned.push(object.entity_id);
            }
        }

        for entity_id in &despawned {
            self.remove_element(*entity_id);
        }

        despawned
    }
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new(CollisionConfig::default())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dynamic_object::{
            test::{make_object, make_type},
            TriggerType,
        },
        mesh_collider::{test::make_floor, MeshTriangleIndices, SurfaceType},
        spatial_trigger::TriggerShape,
    };

    /// Floor at y = 0 with a wall at x = 24 facing back toward the origin.
    fn make_floor_and_wall() -> MeshCollider {
        let vertices = vec![
            Vec3::new(-50.0, 0.0, -50.0),
            Vec3::new(-50.0, 0.0, 50.0),
            Vec3::new(50.0, 0.0, 50.0),
            Vec3::new(50.0, 0.0, -50.0),
            Vec3::new(24.0, 0.0, -50.0),
            Vec3::new(24.0, 0.0, 50.0),
            Vec3::new(24.0, 60.0, 50.0),
            Vec3::new(24.0, 60.0, -50.0),
        ];
        let triangles = [[0, 1, 2], [0, 2, 3], [4, 5, 6], [4, 6, 7]]
            .iter()
            .map(|indices| MeshTriangleIndices::new(*indices))
            .collect();
        MeshCollider::new(vertices, triangles).unwrap()
    }

    fn assert_pool_accounted(world: &CollisionWorld) {
        let mut listed = 0;
        for element in &world.elements {
            match element {
                CollisionElement::Object(object) => {
                    listed += world.pool.iter(object.active_contacts).count();
                    listed += object.shadow_contact.map_or(0, |_| 1);
                }
                CollisionElement::Trigger(trigger) => {
                    listed += world.pool.iter(trigger.active_contacts).count();
                }
            }
        }
        assert_eq!(listed + world.pool.free_count(), world.pool.capacity());
    }

    #[test]
    fn test_registration() {
        let mut world = CollisionWorld::default();
        let shape = Shape::make_sphere(0.5);

        assert!(matches!(
            world.add_object(make_object(0, shape.clone(), Vec3::ZERO)),
            Err(CollisionError::NullEntity)
        ));
        world.add_object(make_object(1, shape.clone(), Vec3::ZERO)).unwrap();
        world.add_object(make_object(2, shape.clone(), Vec3::X)).unwrap();
        assert!(matches!(
            world.add_object(make_object(1, shape, Vec3::ZERO)),
            Err(CollisionError::DuplicateEntity(EntityId(1)))
        ));

        let trigger = SpatialTrigger::new(
            EntityId(3),
            TriggerShape::Sphere { radius: 1.0 },
            CollisionLayers::TANGIBLE,
            Vec3::ZERO,
            None,
        );
        world.add_trigger(trigger).unwrap();

        assert!(world.remove_trigger(EntityId(1)).is_none());
        assert!(world.remove_object(EntityId(3)).is_none());
        assert!(world.remove_object(EntityId(1)).is_some());

        // the swapped element is still reachable
        assert_eq!(world.find_object(EntityId(2)).unwrap().position, Vec3::X);
        assert!(world.find_trigger(EntityId(3)).is_some());
        assert!(world.find_object(EntityId(1)).is_none());

        world.reset();
        assert!(world.find_object(EntityId(2)).is_none());
    }

    #[test]
    #[should_panic]
    fn test_too_many_meshes() {
        let mut world = CollisionWorld::default();
        for i in 0..=MAX_STATIC_MESHES {
            world.add_static_mesh(make_floor(1.0, i as f32, SurfaceType::Default));
        }
    }

    #[test]
    fn test_kill_plane_follows_meshes() {
        let mut world = CollisionWorld::default();
        assert_eq!(world.kill_plane(), f32::NEG_INFINITY);

        let high = world.add_static_mesh(make_floor(5.0, 3.0, SurfaceType::Default));
        let low = world.add_static_mesh(make_floor(5.0, -4.0, SurfaceType::Default));
        assert_eq!(world.kill_plane(), -14.0);

        world.remove_static_mesh(low).unwrap();
        assert_eq!(world.kill_plane(), -7.0);
        world.remove_static_mesh(high).unwrap();
        assert!(world.remove_static_mesh(high).is_none());
        assert_eq!(world.kill_plane(), f32::NEG_INFINITY);
    }

    #[test]
    fn test_resting_objects_keep_pool_balanced() {
        let mut world = CollisionWorld::new(CollisionConfig {
            contact_pool_capacity: 32,
            ..CollisionConfig::default()
        });
        world.add_static_mesh(make_floor(20.0, 0.0, SurfaceType::Default));
        for i in 1..=6 {
            let position = Vec3::new(i as f32 * 1.5 - 10.0, 0.6 + i as f32 * 0.5, -5.0);
            world
                .add_object(make_object(i, Shape::make_box(Vec3::splat(0.5)), position))
                .unwrap();
        }

        for _ in 0..90 {
            assert!(world.collide().is_empty());
            assert_pool_accounted(&world);
        }

        for i in 1..=6 {
            let object = world.find_object(EntityId(i)).unwrap();
            assert!(world.is_grounded(EntityId(i)), "{:?}", object.position);
            assert!((object.position.y - 0.5).abs() < 0.05, "{:?}", object.position);
        }
    }

    #[test]
    fn test_falling_off_the_world() {
        let mut world = CollisionWorld::default();
        world.add_static_mesh(make_floor(10.0, 0.0, SurfaceType::Default));
        let mut object = make_object(7, Shape::make_sphere(0.5), Vec3::new(100.0, -9.9, 100.0));
        object.velocity.y = -30.0;
        world.add_object(object).unwrap();

        let despawned = world.collide();
        assert_eq!(despawned, vec![EntityId(7)]);
        assert!(world.find_object(EntityId(7)).is_none());
        assert_eq!(world.contacts().free_count(), world.contacts().capacity());
    }

    #[test]
    fn test_kill_plane_clamp() {
        let mut object = make_object(7, Shape::make_sphere(0.5), Vec3::new(1.0, -25.0, 2.0));
        object.velocity = Vec3::new(3.0, -40.0, 0.0);

        assert!(clamp_to_kill_plane(&mut object, -20.0));
        assert_eq!(object.position, Vec3::new(1.0, -20.0, 2.0));
        assert!((object.bounding_box.center().y + 20.0).abs() < 1e-5);
        assert_eq!(object.velocity, Vec3::new(3.0, 0.0, 0.0));
        assert!(object.flags.contains(ObjectFlags::HIT_KILL_PLANE));

        let mut resting = make_object(8, Shape::make_sphere(0.5), Vec3::new(0.0, 0.5, 0.0));
        assert!(!clamp_to_kill_plane(&mut resting, -20.0));
        assert!(!resting.flags.contains(ObjectFlags::HIT_KILL_PLANE));
    }

    /// Ground at y = 0 for x < 0 and a lower level at `-drop` for x > 0.
    fn make_step_down(drop: f32) -> MeshCollider {
        let vertices = vec![
            Vec3::new(-10.0, 0.0, -10.0),
            Vec3::new(-10.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, -10.0),
            Vec3::new(0.0, -drop, -10.0),
            Vec3::new(0.0, -drop, 10.0),
            Vec3::new(10.0, -drop, 10.0),
            Vec3::new(10.0, -drop, -10.0),
        ];
        let triangles = [[0, 1, 2], [0, 2, 3], [4, 5, 6], [4, 6, 7]]
            .iter()
            .map(|indices| MeshTriangleIndices::new(*indices))
            .collect();
        MeshCollider::new(vertices, triangles).unwrap()
    }

    /// Walks a box off the upper level at 0.4 units per tick and returns it
    /// on the first tick it is fully past the edge.
    fn walk_off_step(drop: f32) -> CollisionWorld {
        let mut world = CollisionWorld::default();
        let dt = world.config().fixed_time_step;
        world.add_static_mesh(make_step_down(drop));

        let mut object = make_object(1, Shape::make_box(Vec3::splat(0.5)), Vec3::new(-0.75, 0.5, -4.0));
        object.velocity.x = 0.4 / dt;
        world.add_object(object).unwrap();

        for _ in 0..4 {
            world.collide();
        }

        let object = world.find_object(EntityId(1)).unwrap();
        assert!((object.position.x - 0.85).abs() < 1e-3, "{:?}", object.position);
        world
    }

    #[test]
    fn test_snaps_down_small_step() {
        let world = walk_off_step(0.3);
        let object = world.find_object(EntityId(1)).unwrap();
        assert!((object.position.y - 0.2).abs() < 1e-3, "{:?}", object.position);
        assert!(object.velocity.y.abs() < 1e-5, "{:?}", object.velocity);
        assert!(world.is_grounded(EntityId(1)));
        assert_pool_accounted(&world);
    }

    #[test]
    fn test_no_snap_off_a_cliff() {
        // the drop is steeper than the snap cone allows, so the box just falls
        let world = walk_off_step(3.0);
        let object = world.find_object(EntityId(1)).unwrap();
        assert!(object.position.y > 0.45, "{:?}", object.position);
        assert!(!world.is_grounded(EntityId(1)));
    }

    /// Fires a small box along +x at a fixed block whose near face is at
    /// x = 1.75, covering `per_tick` units each tick.
    fn fire_at_fixed_block(per_tick: f32) {
        let mut world = CollisionWorld::default();
        let dt = world.config().fixed_time_step;

        let mut bullet = make_object(1, Shape::make_box(Vec3::splat(0.25)), Vec3::ZERO);
        bullet.flags.remove(ObjectFlags::GRAVITY);
        bullet.velocity = Vec3::new(per_tick / dt, 0.0, 0.0);
        world.add_object(bullet).unwrap();

        let mut block = make_object(2, Shape::make_box(Vec3::new(0.25, 2.0, 2.0)), Vec3::new(2.0, 0.0, 0.0));
        block.flags.insert(ObjectFlags::FIXED);
        world.add_object(block).unwrap();

        world.collide();
        {
            let bullet = world.find_object(EntityId(1)).unwrap();
            assert!(bullet.position.x < 1.51, "{:?}", bullet.position);
            assert!(bullet.velocity.x.abs() < 0.1, "{:?}", bullet.velocity);
            assert!(world.contacts_of(EntityId(1)).any(|(_, c)| c.other_object == EntityId(2)));
        }

        for _ in 0..10 {
            world.collide();
        }

        let bullet = world.find_object(EntityId(1)).unwrap();
        assert!(bullet.position.x < 1.51, "{:?}", bullet.position);
        assert!(bullet.velocity.x.abs() < 0.1, "{:?}", bullet.velocity);
        assert_eq!(world.find_object(EntityId(2)).unwrap().position, Vec3::new(2.0, 0.0, 0.0));
        assert_pool_accounted(&world);
    }

    #[test]
    fn test_fast_object_stops_at_fixed_object() {
        // ends the tick overlapping the block
        fire_at_fixed_block(2.0);
    }

    #[test]
    fn test_fast_object_cannot_jump_fixed_object() {
        // ends the tick entirely past the block
        fire_at_fixed_block(3.0);
    }

    #[test]
    fn test_driven_into_wall_then_corner() {
        let mut world = CollisionWorld::default();
        let dt = world.config().fixed_time_step;
        world.add_static_mesh(make_floor_and_wall());

        let cube = Shape::make_box(Vec3::splat(0.05));
        let mut object = make_object(1, cube.clone(), Vec3::new(0.0, 30.0, 0.0));
        object.set_type(make_type(cube.clone(), 0.5, 0.0));
        object.velocity = Vec3::new(40.0 / dt, 0.0, 0.0);
        world.add_object(object).unwrap();

        // a single tick covers 40 units, well past the wall
        world.collide();
        {
            let object = world.find_object(EntityId(1)).unwrap();
            assert!(object.position.x < 24.0, "{:?}", object.position);
            assert!(object.velocity.x < 0.0, "{:?}", object.velocity);
        }

        {
            let object = world.find_object_mut(EntityId(1)).unwrap();
            object.set_type(make_type(cube, 0.0, 0.0));
            object.position = Vec3::new(0.0, 40.0, 15.0);
            object.velocity = Vec3::new(80.0 / dt, -80.0 / dt, 0.0);
            object.recalc_bb();
        }

        world.collide();
        {
            let object = world.find_object(EntityId(1)).unwrap();
            assert!(object.position.x < 24.0, "{:?}", object.position);
            assert!(object.position.y > 0.0, "{:?}", object.position);
            assert!(object.velocity.x.abs() < 1e-3, "{:?}", object.velocity);
            assert!(object.velocity.y.abs() < 1e-3, "{:?}", object.velocity);
        }
        assert!(world.is_grounded(EntityId(1)));
        assert_pool_accounted(&world);

        // and it stays in the corner
        for _ in 0..60 {
            world.collide();
        }
        let object = world.find_object(EntityId(1)).unwrap();
        assert!(object.position.x < 24.0, "{:?}", object.position);
        assert!(object.position.y > 0.0, "{:?}", object.position);
        assert!(object.velocity.x.abs() < 1e-3, "{:?}", object.velocity);
    }

    #[test]
    fn test_triggers_and_queries() {
        let mut world = CollisionWorld::default();
        world.add_static_mesh(make_floor(10.0, 0.0, SurfaceType::Default));

        let mut crate_object = make_object(1, Shape::make_box(Vec3::splat(0.5)), Vec3::new(2.0, 0.5, 2.0));
        crate_object.flags.remove(ObjectFlags::GRAVITY);
        world.add_object(crate_object).unwrap();

        let mut sensor = make_object(2, Shape::make_sphere(1.0), Vec3::new(2.0, 1.0, 3.0));
        sensor.trigger_type = TriggerType::Basic;
        world.add_object(sensor).unwrap();

        world
            .add_trigger(SpatialTrigger::new(
                EntityId(3),
                TriggerShape::Cylinder {
                    radius: 2.0,
                    half_height: 2.0,
                },
                CollisionLayers::TANGIBLE,
                Vec3::new(1.0, 0.0, 1.0),
                None,
            ))
            .unwrap();

        world.collide();

        let in_trigger: Vec<EntityId> = world.contacts_of(EntityId(3)).map(|(_, c)| c.other_object).collect();
        assert!(in_trigger.contains(&EntityId(1)));
        assert!(world.contacts_of(EntityId(2)).any(|(_, c)| c.other_object == EntityId(1)));
        // basic triggers never push
        assert!((world.find_object(EntityId(1)).unwrap().position - Vec3::new(2.0, 0.5, 2.0)).length() < 1e-3);

        let mut hits = Vec::new();
        world.query(&Shape::make_sphere(0.5), Vec3::new(2.0, 0.5, 1.2), CollisionLayers::TANGIBLE, |object| {
            hits.push(object.entity_id)
        });
        assert_eq!(hits, vec![EntityId(1)]);

        let mut triggers = Vec::new();
        world.query_trigger(Vec3::new(1.5, 1.0, 1.5), CollisionLayers::all(), |trigger| {
            triggers.push(trigger.entity_id)
        });
        assert_eq!(triggers, vec![EntityId(3)]);

        let shadow = world.shadow_cast(Vec3::new(1.0, 5.0, -3.0)).unwrap();
        assert_eq!(shadow.y, 0.0);
    }
}

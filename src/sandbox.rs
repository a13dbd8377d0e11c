use collision::{
    rotation_from_angle, CollisionConfig, CollisionError, CollisionLayers, CollisionWorld, DensityClass,
    DynamicObject, DynamicObjectType, EntityId, MeshCollider, MeshTriangleIndices, ObjectFlags, Shape,
    SpatialTrigger, SurfaceType, TriggerShape, TriggerType, WeightClass,
};
use glam::{Vec2, Vec3};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{error::Error, fs::File, io::BufReader, path::Path, sync::Arc};

const ARENA_HALF_SIZE: f32 = 20.0;
const WALL_HEIGHT: f32 = 6.0;

fn all_layers() -> CollisionLayers {
    CollisionLayers::all()
}

/// A dynamic object as written in a world file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectDesc {
    pub entity_id: EntityId,
    pub object_type: DynamicObjectType,
    pub position: Vec3,
    #[serde(default)]
    pub velocity: Vec3,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default = "all_layers")]
    pub collision_layers: CollisionLayers,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default = "default_trigger_type")]
    pub trigger_type: TriggerType,
    #[serde(default = "default_weight_class")]
    pub weight_class: WeightClass,
    #[serde(default = "default_density_class")]
    pub density_class: DensityClass,
}

fn default_trigger_type() -> TriggerType {
    TriggerType::None
}

fn default_weight_class() -> WeightClass {
    WeightClass::Medium
}

fn default_density_class() -> DensityClass {
    DensityClass::Neutral
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriggerDesc {
    pub entity_id: EntityId,
    pub shape: TriggerShape,
    pub position: Vec3,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default = "all_layers")]
    pub collision_layers: CollisionLayers,
}

/// Everything needed to rebuild a world: tunables, static geometry and the
/// initial state of every object and trigger.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorldDesc {
    #[serde(default)]
    pub config: CollisionConfig,
    pub meshes: Vec<MeshCollider>,
    #[serde(default)]
    pub objects: Vec<ObjectDesc>,
    #[serde(default)]
    pub triggers: Vec<TriggerDesc>,
}

fn yaw_rotation(yaw: f32) -> Option<Vec2> {
    if yaw == 0.0 {
        None
    } else {
        Some(rotation_from_angle(yaw.to_radians()))
    }
}

impl WorldDesc {
    pub fn build(self) -> Result<CollisionWorld, CollisionError> {
        let mut world = CollisionWorld::new(self.config);

        for mesh in self.meshes {
            mesh.validate()?;
            world.add_static_mesh(mesh);
        }

        for desc in self.objects {
            let mut object = DynamicObject::new(
                desc.entity_id,
                Arc::new(desc.object_type),
                desc.collision_layers,
                desc.position,
                yaw_rotation(desc.yaw),
            );
            object.velocity = desc.velocity;
            object.trigger_type = desc.trigger_type;
            object.weight_class = desc.weight_class;
            object.density_class = desc.density_class;
            if desc.fixed {
                object.flags.insert(ObjectFlags::FIXED);
            }
            world.add_object(object)?;
        }

        for desc in self.triggers {
            world.add_trigger(SpatialTrigger::new(
                desc.entity_id,
                desc.shape,
                desc.collision_layers,
                desc.position,
                yaw_rotation(desc.yaw),
            ))?;
        }

        Ok(world)
    }
}

pub fn load_world<P: AsRef<Path>>(path: P) -> Result<CollisionWorld, Box<dyn Error>> {
    let reader = BufReader::new(File::open(path)?);
    let desc: WorldDesc = serde_json::from_reader(reader)?;
    Ok(desc.build()?)
}

#[derive(Default)]
struct MeshBuilder {
    vertices: Vec<Vec3>,
    triangles: Vec<MeshTriangleIndices>,
}

impl MeshBuilder {
    /// Adds a quad as two triangles. Corners wind counter clockwise seen
    /// from the side the quad faces.
    fn add_quad(&mut self, corners: [Vec3; 4], surface_type: SurfaceType, collision_layers: CollisionLayers) {
        let base = self.vertices.len() as u16;
        self.vertices.extend_from_slice(&corners);
        for indices in [[base, base + 1, base + 2], [base, base + 2, base + 3]] {
            let mut triangle = MeshTriangleIndices::new(indices);
            triangle.surface_type = surface_type;
            triangle.collision_layers = collision_layers;
            self.triangles.push(triangle);
        }
    }

    fn build(self) -> Result<MeshCollider, CollisionError> {
        MeshCollider::new(self.vertices, self.triangles)
    }
}

fn make_arena() -> Result<MeshCollider, CollisionError> {
    const S: f32 = ARENA_HALF_SIZE;
    const H: f32 = WALL_HEIGHT;
    let solid = CollisionLayers::all();
    let mut builder = MeshBuilder::default();

    // ground
    builder.add_quad(
        [
            Vec3::new(-S, 0.0, -S),
            Vec3::new(-S, 0.0, S),
            Vec3::new(S, 0.0, S),
            Vec3::new(S, 0.0, -S),
        ],
        SurfaceType::Default,
        solid,
    );

    // walls facing inward
    builder.add_quad(
        [
            Vec3::new(S, 0.0, -S),
            Vec3::new(S, 0.0, S),
            Vec3::new(S, H, S),
            Vec3::new(S, H, -S),
        ],
        SurfaceType::Default,
        solid,
    );
    builder.add_quad(
        [
            Vec3::new(-S, 0.0, S),
            Vec3::new(-S, 0.0, -S),
            Vec3::new(-S, H, -S),
            Vec3::new(-S, H, S),
        ],
        SurfaceType::Default,
        solid,
    );
    builder.add_quad(
        [
            Vec3::new(S, 0.0, S),
            Vec3::new(-S, 0.0, S),
            Vec3::new(-S, H, S),
            Vec3::new(S, H, S),
        ],
        SurfaceType::Default,
        solid,
    );
    builder.add_quad(
        [
            Vec3::new(-S, 0.0, -S),
            Vec3::new(S, 0.0, -S),
            Vec3::new(S, H, -S),
            Vec3::new(-S, H, -S),
        ],
        SurfaceType::Default,
        solid,
    );

    // icy ramp rising toward +x
    builder.add_quad(
        [
            Vec3::new(-15.0, 0.0, 5.0),
            Vec3::new(-15.0, 0.0, 12.0),
            Vec3::new(-5.0, 3.0, 12.0),
            Vec3::new(-5.0, 3.0, 5.0),
        ],
        SurfaceType::Slippery,
        solid,
    );

    builder.build()
}

/// Water surface over part of the arena. It only shows up in shadow casts,
/// nothing collides with it.
fn make_pool() -> Result<MeshCollider, CollisionError> {
    let mut builder = MeshBuilder::default();
    builder.add_quad(
        [
            Vec3::new(10.0, 1.5, -8.0),
            Vec3::new(10.0, 1.5, 0.0),
            Vec3::new(18.0, 1.5, 0.0),
            Vec3::new(18.0, 1.5, -8.0),
        ],
        SurfaceType::Water,
        CollisionLayers::empty(),
    );
    builder.build()
}

fn make_type(shape: Shape, bounce: f32, friction: f32) -> Arc<DynamicObjectType> {
    Arc::new(DynamicObjectType {
        shape,
        bounce,
        friction,
        max_stable_slope: 0.25,
    })
}

struct EntityIds(u32);

impl EntityIds {
    fn next(&mut self) -> EntityId {
        self.0 += 1;
        EntityId(self.0)
    }
}

fn add_box_stack(world: &mut CollisionWorld, ids: &mut EntityIds) -> Result<(), CollisionError> {
    let crate_type = make_type(Shape::make_box(Vec3::splat(0.5)), 0.0, 0.5);

    const STACK_HEIGHT: usize = 5;
    for y in 0..STACK_HEIGHT {
        let offset = if y & 1 == 0 { 0.0 } else { 0.15 };
        let position = Vec3::new(offset, 0.52 + y as f32 * 1.04, offset);
        world.add_object(DynamicObject::new(
            ids.next(),
            crate_type.clone(),
            CollisionLayers::TANGIBLE,
            position,
            None,
        ))?;
    }

    Ok(())
}

fn add_dynamic_balls(world: &mut CollisionWorld, ids: &mut EntityIds) -> Result<(), CollisionError> {
    let ball_type = make_type(Shape::make_sphere(0.5), 0.5, 0.1);

    for x in 0..4 {
        for z in 0..4 {
            let position = Vec3::new(-8.0 + x as f32 * 1.5, 8.0, -8.0 + z as f32 * 1.5);
            let mut ball = DynamicObject::new(
                ids.next(),
                ball_type.clone(),
                CollisionLayers::TANGIBLE,
                position,
                None,
            );
            ball.weight_class = WeightClass::Light;
            world.add_object(ball)?;
        }
    }

    Ok(())
}

fn add_teleportation_fix(world: &mut CollisionWorld, ids: &mut EntityIds) -> Result<(), CollisionError> {
    // fast enough to skip the wall entirely without the swept pass
    let mut bullet = DynamicObject::new(
        ids.next(),
        make_type(Shape::make_sphere(0.25), 0.5, 0.0),
        CollisionLayers::TANGIBLE,
        Vec3::new(0.0, 3.0, -10.0),
        None,
    );
    bullet.velocity = Vec3::new(300.0, 0.0, 0.0);
    world.add_object(bullet)
}

fn add_swimmers(world: &mut CollisionWorld, ids: &mut EntityIds) -> Result<(), CollisionError> {
    let barrel_type = make_type(Shape::make_cylinder(0.4, 0.6), 0.0, 0.2);

    for (i, density_class) in [DensityClass::Light, DensityClass::Neutral, DensityClass::Heavy]
        .iter()
        .enumerate()
    {
        let mut barrel = DynamicObject::new(
            ids.next(),
            barrel_type.clone(),
            CollisionLayers::TANGIBLE,
            Vec3::new(12.0 + i as f32 * 2.0, 4.0, -4.0),
            None,
        );
        barrel.density_class = *density_class;
        world.add_object(barrel)?;
    }

    Ok(())
}

fn add_ramp_slider(world: &mut CollisionWorld, ids: &mut EntityIds) -> Result<(), CollisionError> {
    let capsule = DynamicObject::new(
        ids.next(),
        make_type(Shape::make_capsule(0.3, 0.4), 0.0, 0.3),
        CollisionLayers::TANGIBLE,
        Vec3::new(-6.0, 4.5, 8.0),
        Some(rotation_from_angle(0.5)),
    );
    world.add_object(capsule)
}

fn add_goal_zone(world: &mut CollisionWorld, ids: &mut EntityIds) -> Result<(), CollisionError> {
    world.add_trigger(SpatialTrigger::new(
        ids.next(),
        TriggerShape::Box {
            half_size: Vec3::new(2.0, 1.0, 2.0),
        },
        CollisionLayers::TANGIBLE,
        Vec3::new(-12.0, 1.0, 8.5),
        Some(rotation_from_angle(0.3)),
    ))
}

/// The default scene: an arena with a box stack, a grid of falling balls,
/// a bullet fired at a wall, a ramp, a pool and a trigger zone.
pub fn demo_world(config: CollisionConfig) -> Result<CollisionWorld, CollisionError> {
    let mut world = CollisionWorld::new(config);
    world.add_static_mesh(make_arena()?);
    world.add_static_mesh(make_pool()?);

    let mut ids = EntityIds(0);
    add_box_stack(&mut world, &mut ids)?;
    add_dynamic_balls(&mut world, &mut ids)?;
    add_teleportation_fix(&mut world, &mut ids)?;
    add_swimmers(&mut world, &mut ids)?;
    add_ramp_slider(&mut world, &mut ids)?;
    add_goal_zone(&mut world, &mut ids)?;

    Ok(world)
}

pub fn log_world(world: &CollisionWorld) {
    for object in world.objects() {
        info!(
            "{:?} position {:?} velocity {:?} grounded {} under water {}",
            object.entity_id,
            object.position,
            object.velocity,
            world.is_grounded(object.entity_id),
            object.under_water > 0,
        );
        for (_, contact) in world.contacts_of(object.entity_id) {
            debug!(
                "  contact with {:?} normal {:?} surface {:?}",
                contact.other_object, contact.normal, contact.surface_type
            );
        }
    }

    for trigger in world.triggers() {
        let inside: Vec<EntityId> = world
            .contacts_of(trigger.entity_id)
            .map(|(_, contact)| contact.other_object)
            .collect();
        info!("trigger {:?} contains {:?}", trigger.entity_id, inside);
    }

    debug!(
        "{} of {} contacts in use",
        world.contacts().active_count(),
        world.contacts().capacity()
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_demo_world_settles() {
        let mut world = demo_world(CollisionConfig::default()).unwrap();
        let count = world.objects().count();

        for _ in 0..150 {
            assert!(world.collide().is_empty());
        }

        assert_eq!(world.objects().count(), count);
        for object in world.objects() {
            let p = object.position;
            assert!(p.x.abs() < ARENA_HALF_SIZE && p.z.abs() < ARENA_HALF_SIZE, "{:?}", object);
            assert!(p.y > 0.0, "{:?}", object);
        }
    }

    #[test]
    fn test_world_file_round_trip() {
        let desc = WorldDesc {
            config: CollisionConfig::default(),
            meshes: vec![make_arena().unwrap()],
            objects: vec![ObjectDesc {
                entity_id: EntityId(4),
                object_type: DynamicObjectType {
                    shape: Shape::make_sphere(0.5),
                    bounce: 0.2,
                    friction: 0.1,
                    max_stable_slope: 0.25,
                },
                position: Vec3::new(1.0, 3.0, 1.0),
                velocity: Vec3::ZERO,
                yaw: 0.0,
                collision_layers: CollisionLayers::TANGIBLE,
                fixed: false,
                trigger_type: TriggerType::None,
                weight_class: WeightClass::Medium,
                density_class: DensityClass::Neutral,
            }],
            triggers: Vec::new(),
        };

        let json = serde_json::to_string(&desc).unwrap();
        let loaded: WorldDesc = serde_json::from_str(&json).unwrap();
        let mut world = loaded.build().unwrap();
        world.collide();
        assert!(world.find_object(EntityId(4)).is_some());
    }

    #[test]
    fn test_minimal_world_file() {
        let json = r#"{
            "meshes": [],
            "objects": [{
                "entity_id": 1,
                "object_type": {
                    "shape": { "type": "box", "half_size": [0.5, 0.5, 0.5] },
                    "bounce": 0.0,
                    "friction": 0.5,
                    "max_stable_slope": 0.25
                },
                "position": [0.0, 2.0, 0.0]
            }]
        }"#;
        let desc: WorldDesc = serde_json::from_str(json).unwrap();
        let world = desc.build().unwrap();
        let object = world.find_object(EntityId(1)).unwrap();
        assert_eq!(object.collision_layers, CollisionLayers::all());
        assert_eq!(object.weight_class, WeightClass::Medium);
    }
}

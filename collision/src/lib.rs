pub mod bounds;
mod broadphase;
mod collide;
mod collide_swept;
pub mod config;
pub mod contact;
pub mod dynamic_object;
pub mod epa;
pub mod error;
pub mod gjk;
pub mod kd_tree;
mod math_ext;
pub mod mesh_collider;
pub mod scene;
pub mod shapes;
pub mod spatial_trigger;
mod water;

pub use broadphase::{broadphase, CollisionPair};
pub use collide::correct_velocity;
pub use config::{load_config, CollisionConfig};
pub use dynamic_object::{
    should_slide, CollisionLayers, DensityClass, DynamicObject, DynamicObjectType, EntityId, ObjectFlags,
    TriggerType, WeightClass,
};
pub use error::CollisionError;
pub use math_ext::{complex_mul, rotation_from_angle, RotationExt};
pub use mesh_collider::{MeshCollider, MeshTriangleIndices, ShadowCastResult, SurfaceType};
pub use scene::{CollisionWorld, MeshHandle, MAX_STATIC_MESHES};
pub use shapes::{MinkowskiSum, Shape};
pub use spatial_trigger::{SpatialTrigger, TriggerShape};

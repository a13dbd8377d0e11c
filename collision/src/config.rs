use crate::error::CollisionError;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

/// Tunables for a `CollisionWorld`. Every field has a default so partial
/// json files are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Seconds advanced by each call to `collide`.
    pub fixed_time_step: f32,
    /// Vertical acceleration applied to objects with gravity enabled.
    pub gravity: f32,
    pub contact_pool_capacity: usize,
    /// Hits resolved per object per tick before the swept pass gives up.
    pub max_swept_iterations: u32,
    /// Largest angle between an object's horizontal motion and the drop to
    /// the ground below for which it is snapped back down.
    pub ground_snap_cone_degrees: f32,
    /// How far below the bounding box a shadow contact still counts as ground.
    pub shadow_ground_tolerance: f32,
    pub max_water_lift_speed: f32,
    /// Distance below the lowest static mesh point at which objects are
    /// caught by the kill plane.
    pub kill_plane_margin: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            fixed_time_step: 1.0 / 30.0,
            gravity: -9.8,
            contact_pool_capacity: 256,
            max_swept_iterations: 5,
            ground_snap_cone_degrees: 45.0,
            shadow_ground_tolerance: 0.1,
            max_water_lift_speed: 10.0,
            kill_plane_margin: 10.0,
        }
    }
}

impl CollisionConfig {
    pub fn from_json(json: &str) -> Result<Self, CollisionError> {
        Ok(serde_json::from_str(json)?)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CollisionConfig, CollisionError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

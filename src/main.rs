mod sandbox;
mod time_accumulator;

use clap::Parser;
use collision::{load_config, CollisionConfig, CollisionWorld};
use log::info;
use std::{error::Error, path::PathBuf, time::Duration};
use time_accumulator::TimeAccumulator;

const FRAME_TIME: Duration = Duration::from_nanos(16_666_667);

/// Runs the collision world headless and logs what every object is doing.
#[derive(Parser, Debug)]
#[command(version)]
struct Options {
    /// World description to load instead of the built in demo
    #[arg(long)]
    world: Option<PathBuf>,

    /// Collision config overriding the one the world carries
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of 60 Hz frames to simulate
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Scales frame time before it is turned into collision steps
    #[arg(long = "dilation", default_value_t = 1.0)]
    time_dilation: f64,
}

fn build_world(options: &Options) -> Result<CollisionWorld, Box<dyn Error>> {
    let mut world = match &options.world {
        Some(path) => sandbox::load_world(path)?,
        None => sandbox::demo_world(CollisionConfig::default())?,
    };

    // a separate config file overrides whatever the world carried
    if let Some(path) = &options.config {
        let config = load_config(path)?;
        let mut rebuilt = CollisionWorld::new(config);
        for mesh in world.static_meshes() {
            rebuilt.add_static_mesh(mesh.clone());
        }
        for object in world.objects() {
            rebuilt.add_object(object.clone())?;
        }
        for trigger in world.triggers() {
            rebuilt.add_trigger(trigger.clone())?;
        }
        world = rebuilt;
    }

    Ok(world)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let options = Options::parse();
    let mut world = build_world(&options)?;

    let mut accum = TimeAccumulator::new(world.config().fixed_time_step);
    accum.set_time_dilation(options.time_dilation);

    info!(
        "simulating {} frames with {} objects, {} triggers and {} meshes",
        options.frames,
        world.objects().count(),
        world.triggers().count(),
        world.static_meshes().len()
    );

    for _ in 0..options.frames {
        accum.update(FRAME_TIME);
        for _ in 0..accum.num_steps() {
            for entity_id in world.collide() {
                info!("frame {}: {:?} fell out of the world", accum.frame_number(), entity_id);
            }
        }

        if accum.frame_number() % 60 == 0 {
            info!("frame {}", accum.frame_number());
            sandbox::log_world(&world);
        }
    }

    sandbox::log_world(&world);
    Ok(())
}

//! Pool allocator demo
//!
//! Simulates a few frames of a renderer that draws a varying number of
//! bindings per frame from a pool allocator and recycles them at the end of
//! each frame. Growth happens in the busy frames and is kept afterwards.
//!
//! Usage: `pool_demo [config.toml | config.ron]`

use pool_allocator::foundation::logging;
use pool_allocator::prelude::*;

/// Bindings requested in each simulated frame
const FRAME_WORKLOAD: [usize; 6] = [3, 5, 12, 12, 4, 30];

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("allocator: {0}")]
    Allocator(#[from] AllocatorError),
}

fn load_config() -> Result<AllocatorConfig, ConfigError> {
    let config = match std::env::args().nth(1) {
        Some(path) => AllocatorConfig::load_from_file(&path)?,
        None => AllocatorConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run_frames(allocator: &mut PoolAllocator<MemoryPoolFactory>) -> Result<(), DemoError> {
    let request = MemoryRequest::single();

    for (frame, &bindings) in FRAME_WORKLOAD.iter().enumerate() {
        for _ in 0..bindings {
            allocator.allocate(&request)?;
        }

        log::info!(
            "Frame {}: {} bindings, {} pools, active pool {}, total capacity {}",
            frame,
            bindings,
            allocator.pool_count(),
            allocator.active_index(),
            allocator.total_capacity()
        );

        allocator.clear()?;
    }

    Ok(())
}

fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            logging::init_with_level("info");
            log::error!("Failed to load configuration: {}", err);
            std::process::exit(1);
        }
    };
    logging::init_with_level(&config.log_level);

    let mut allocator = PoolAllocator::new(MemoryPoolFactory::new());
    let result = allocator
        .init_with_config(MemoryCategory::Uniform, &config)
        .map_err(DemoError::from)
        .and_then(|()| run_frames(&mut allocator));

    if let Err(err) = result {
        log::error!("Demo failed: {}", err);
        std::process::exit(1);
    }

    for info in allocator.pools() {
        log::info!(
            "Pool {}: capacity {}, flags {:?}",
            info.index,
            info.capacity,
            info.flags
        );
    }
    log::info!("Final stats: {:?}", allocator.stats());

    if let Err(err) = allocator.destroy() {
        log::error!("Teardown failed: {}", err);
        std::process::exit(1);
    }
}

//! Conway's Game of Life on a toroidal grid, double-buffered, stepped on the
//! CPU with rayon or on a GPU with a wgpu compute shader.

pub mod config;
pub mod grid;
pub mod patterns;
pub mod rendering;
pub mod sim;
pub mod util;

pub use config::LifeConfig;
pub use grid::{Generation, GridError, GridSize};
pub use sim::{
    Backend, CpuLife, GpuLife, LifeEngine, Seeding, Simulation, SimulationStatistics,
    create_engine,
};

/// Install the global logger: timestamp, level and target, to stdout.
pub fn init_logging(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // wgpu is chatty at info
        .level_for("wgpu_core", log::LevelFilter::Warn)
        .level_for("wgpu_hal", log::LevelFilter::Warn)
        .level_for("naga", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()
}

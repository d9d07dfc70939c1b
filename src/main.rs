use std::{thread, time::Duration};

use anyhow::Context;
use lifesim::{LifeConfig, Simulation, create_engine};

/// Lower bound on how long to wait for a requested capture.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> anyhow::Result<()> {
    let config = LifeConfig::from_env().context("invalid LIFESIM_* configuration")?;
    lifesim::init_logging(config.log_level)?;

    let mut rng = config.rng();
    let engine = create_engine(&config, &mut rng)?;
    let sim = Simulation::spawn(engine, config.tick_rate, rng)?;

    for frame in 0..config.frames {
        thread::sleep(config.capture_interval);
        let Some(generation) = sim.capture(config.capture_interval.max(CAPTURE_TIMEOUT)) else {
            log::warn!("frame {frame}: capture timed out");
            continue;
        };
        println!(
            "frame {frame} (step {}, {} alive)\n{generation}",
            sim.steps(),
            generation.population()
        );
    }

    let stats = sim.stop();
    println!(
        "{} steps, average step execution time {}μs",
        stats.steps,
        stats.average_step_exec_time.as_micros()
    );
    let longest_name = stats.segments.iter().map(|s| s.0.len()).max().unwrap_or(0);
    for (name, time) in stats.segments {
        println!("{name:<width$} {}μs", time.as_micros(), width = longest_name + 2);
    }
    Ok(())
}

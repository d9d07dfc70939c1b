//! Background step loop.
//!
//! The engine lives on its own thread. The handle never touches the buffers:
//! it raises flags (capture, reset, pause, stop) that the loop picks up
//! between steps, and reads back published generations through an `ArcSwap`.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;

use crate::{
    grid::Generation,
    sim::{LifeEngine, Seeding},
};

/// How long a paused loop sleeps before looking at its flags again.
const PAUSE_POLL: Duration = Duration::from_millis(5);

#[non_exhaustive]
#[derive(Debug, Default)]
pub struct SimulationStatistics {
    /// Steps run by the loop, across resets.
    pub steps: u64,
    pub average_step_exec_time: Duration,
    /// Average time per loop iteration spent in each named segment.
    pub segments: Vec<(&'static str, Duration)>,
}

pub struct Simulation {
    stop: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    wants_new_frame: Arc<AtomicBool>,
    steps: Arc<AtomicU64>,
    pending_reset: Arc<Mutex<Option<Seeding>>>,
    latest_frame: Arc<ArcSwap<Generation>>,
    join_handle: thread::JoinHandle<SimulationStatistics>,
}

impl Simulation {
    /// Move `engine` onto a new thread and start stepping it `tick_rate` times
    /// per second. A `tick_rate` of 0 steps as fast as possible.
    pub fn spawn(
        mut engine: Box<dyn LifeEngine>,
        tick_rate: u32,
        rng: fastrand::Rng,
    ) -> anyhow::Result<Simulation> {
        let first = engine.snapshot()?;
        let stop = Arc::new(AtomicBool::new(false));
        let paused = Arc::new(AtomicBool::new(false));
        let wants_new_frame = Arc::new(AtomicBool::new(false));
        let steps = Arc::new(AtomicU64::new(0));
        let pending_reset = Arc::new(Mutex::new(None));
        let latest_frame = Arc::new(ArcSwap::from_pointee(first));

        let shared = SimShared {
            stop: Arc::clone(&stop),
            paused: Arc::clone(&paused),
            wants_new_frame: Arc::clone(&wants_new_frame),
            steps: Arc::clone(&steps),
            pending_reset: Arc::clone(&pending_reset),
            latest_frame: Arc::clone(&latest_frame),
        };
        let join_handle = thread::Builder::new()
            .name(format!("lifesim-{}", engine.backend_name()))
            .spawn(move || sim_thread(&mut *engine, shared, tick_rate, rng))?;

        Ok(Simulation {
            stop,
            paused,
            wants_new_frame,
            steps,
            pending_reset,
            latest_frame,
            join_handle,
        })
    }

    /// The last generation published by the loop.
    pub fn latest_frame(&self) -> Arc<Generation> {
        self.latest_frame.load_full()
    }

    /// Ask the loop to publish the current generation once it is between steps.
    pub fn request_capture(&self) {
        self.wants_new_frame.store(true, Ordering::Release);
    }

    /// Request a capture and wait for it to be published.
    pub fn capture(&self, timeout: Duration) -> Option<Arc<Generation>> {
        let previous = self.latest_frame.load_full();
        self.request_capture();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let current = self.latest_frame.load_full();
            if !Arc::ptr_eq(&previous, &current) {
                return Some(current);
            }
            if self.join_handle.is_finished() {
                return None;
            }
            thread::sleep(Duration::from_millis(1));
        }
        None
    }

    /// Reset the engine before its next step. The fresh generation is published.
    pub fn request_reset(&self, seeding: Seeding) {
        let mut pending = self
            .pending_reset
            .lock()
            .expect("the simulation thread panicked while holding the reset lock");
        *pending = Some(seeding);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Steps run so far, across resets.
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Acquire)
    }

    pub fn stop(self) -> SimulationStatistics {
        self.stop.store(true, Ordering::Release);
        self.join_handle
            .join()
            .expect("the simulation thread panicked")
    }
}

struct SimShared {
    stop: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    wants_new_frame: Arc<AtomicBool>,
    steps: Arc<AtomicU64>,
    pending_reset: Arc<Mutex<Option<Seeding>>>,
    latest_frame: Arc<ArcSwap<Generation>>,
}

impl SimShared {
    fn publish(&self, engine: &dyn LifeEngine) {
        match engine.snapshot() {
            Ok(generation) => {
                log::debug!(
                    "published generation {} ({} live cells)",
                    engine.steps(),
                    generation.population()
                );
                self.latest_frame.store(Arc::new(generation));
            }
            Err(e) => log::error!("failed to capture generation: {e:#}"),
        }
    }
}

/// Time each named block of a loop body and return the per-iteration average
/// of every block.
macro_rules! segment_bench_while {
    (while ($cond:expr) { $({$name:literal : $($contents:stmt)*}),+ $(,)? }) => {{
        let mut segments = vec![$(($name, std::time::Duration::ZERO)),+];
        let mut iter_count: u64 = 0;

        while $cond {
            let mut segment_idx = 0;
            $(
                let segment_start = std::time::Instant::now();
                $($contents)*
                segments[segment_idx].1 += segment_start.elapsed();
                segment_idx += 1;
            )+
            let _ = segment_idx;
            iter_count += 1;
        }

        for s in segments.iter_mut() {
            s.1 = mean(s.1, iter_count);
        }
        segments
    }}
}

/// `total / count`, zero when nothing was counted.
fn mean(total: Duration, count: u64) -> Duration {
    match count {
        0 => Duration::ZERO,
        n => total.div_f64(n as f64),
    }
}

fn sim_thread(
    engine: &mut dyn LifeEngine,
    shared: SimShared,
    tick_rate: u32,
    mut rng: fastrand::Rng,
) -> SimulationStatistics {
    let tick = (tick_rate > 0).then(|| Duration::from_secs_f64(1.0 / tick_rate as f64));
    let mut total_steps: u64 = 0;
    let mut total_step_time = Duration::ZERO;
    let mut end_of_last_step = Instant::now();

    log::info!(
        "simulation thread started ({} engine, {} grid, {} ticks/s)",
        engine.backend_name(),
        engine.size(),
        tick_rate
    );

    #[allow(redundant_semicolons)]
    let segments = segment_bench_while!(
    while (!shared.stop.load(Ordering::Acquire)) {
        {
            "reset":
            let pending = shared
                .pending_reset
                .lock()
                .map(|mut p| p.take())
                .unwrap_or_else(|poisoned| poisoned.into_inner().take());
            if let Some(seeding) = pending {
                match engine.reset(&seeding, &mut rng) {
                    Ok(()) => shared.publish(engine),
                    Err(e) => log::error!("ignoring reset request: {e}"),
                }
            }
        },
        {
            "step":
            let running = !shared.paused.load(Ordering::Acquire);
            if running {
                let step_start = Instant::now();
                engine.step();
                total_step_time += step_start.elapsed();
                total_steps += 1;
                shared.steps.fetch_add(1, Ordering::AcqRel);
            }
        },
        {
            "publish":
            if shared.wants_new_frame.swap(false, Ordering::AcqRel) {
                shared.publish(engine);
            }
        },
        {
            "pace":
            if !running {
                thread::sleep(PAUSE_POLL);
            } else if let Some(tick) = tick {
                if let Some(to_wait) = tick.checked_sub(end_of_last_step.elapsed()) {
                    thread::sleep(to_wait);
                }
            }
            end_of_last_step = Instant::now();
        }
    }
    );

    log::info!("simulation thread stopped after {total_steps} steps");
    SimulationStatistics {
        steps: total_steps,
        average_step_exec_time: mean(total_step_time, total_steps),
        segments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grid::GridSize, sim::CpuLife};

    const WAIT: Duration = Duration::from_secs(5);

    fn blinker() -> Generation {
        Generation::parse(".....\n.....\n.###.\n.....\n.....\n").unwrap()
    }

    fn spawn(start: Generation, tick_rate: u32) -> Simulation {
        let engine = Box::new(CpuLife::from_generation(start));
        Simulation::spawn(engine, tick_rate, fastrand::Rng::with_seed(1)).unwrap()
    }

    #[test]
    fn mean_handles_counts_past_u32() {
        assert_eq!(mean(Duration::from_secs(3), 0), Duration::ZERO);
        assert_eq!(mean(Duration::from_millis(10), 4), Duration::from_micros(2500));
        let count = u64::from(u32::MAX) * 4;
        assert_eq!(mean(Duration::from_secs(count), count), Duration::from_secs(1));
    }

    #[test]
    fn initial_generation_is_published() {
        let sim = spawn(blinker(), 100);
        assert_eq!(*sim.latest_frame(), blinker());
        sim.stop();
    }

    #[test]
    fn capture_publishes_a_blinker_phase() {
        let sim = spawn(blinker(), 0);
        let frame = sim.capture(WAIT).expect("capture timed out");
        let mut vertical = CpuLife::from_generation(blinker());
        vertical.step();
        let vertical = vertical.snapshot().unwrap();
        assert!(*frame == blinker() || *frame == vertical, "{frame}");
        sim.stop();
    }

    #[test]
    fn capture_matches_a_stepped_engine() {
        let start = Generation::parse(
            ".#......\n\
             ..#.....\n\
             ###.....\n\
             ........\n\
             ........\n\
             ........\n",
        )
        .unwrap();
        let sim = spawn(start.clone(), 0);
        sim.pause();
        // Let any step that was in flight when pausing land first.
        thread::sleep(Duration::from_millis(50));
        let frame = sim.capture(WAIT).expect("capture timed out");
        let steps = sim.steps();

        let mut reference = CpuLife::from_generation(start);
        reference.step_n(steps);
        assert_eq!(*frame, reference.snapshot().unwrap());
        sim.stop();
    }

    #[test]
    fn pause_holds_the_step_counter() {
        let sim = spawn(blinker(), 0);
        sim.pause();
        assert!(sim.is_paused());
        thread::sleep(Duration::from_millis(50));
        let before = sim.steps();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sim.steps(), before);
        sim.resume();
        let deadline = Instant::now() + WAIT;
        while sim.steps() == before && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(sim.steps() > before);
        sim.stop();
    }

    #[test]
    fn reset_to_blank_clears_the_grid() {
        let sim = spawn(blinker(), 0);
        sim.request_reset(Seeding::Blank);
        let deadline = Instant::now() + WAIT;
        while sim.latest_frame().population() != 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(
            *sim.latest_frame(),
            Generation::blank(GridSize::square(5).unwrap())
        );
        sim.stop();
    }

    #[test]
    fn stop_reports_statistics() {
        let sim = spawn(blinker(), 0);
        let deadline = Instant::now() + WAIT;
        while sim.steps() < 10 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        let stats = sim.stop();
        assert!(stats.steps >= 10);
        let names: Vec<_> = stats.segments.iter().map(|s| s.0).collect();
        assert_eq!(names, ["reset", "step", "publish", "pace"]);
    }
}

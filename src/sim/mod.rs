use std::{fmt, str::FromStr};

use rayon::{iter::IndexedParallelIterator, iter::ParallelIterator, slice::ParallelSliceMut};

use crate::{
    config::LifeConfig,
    grid::{Generation, GridError, GridSize},
};

pub mod gpucompute;
pub mod runner;

pub use gpucompute::{GpuError, GpuLife};
pub use runner::{Simulation, SimulationStatistics};

/// How a reset fills the first generation buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum Seeding {
    /// Draw only every `stride`-th flat index, alive with `alive_probability`.
    /// Every other cell stays dead.
    Strided { stride: usize, alive_probability: f32 },
    /// Every cell is alive with probability `density`.
    Uniform { density: f32 },
    /// All dead.
    Blank,
    /// Load a fixed generation. Its size must match the grid.
    Pattern(Generation),
}

impl Default for Seeding {
    fn default() -> Self {
        Seeding::Strided {
            stride: 3,
            alive_probability: 1.0 / 3.0,
        }
    }
}

impl Seeding {
    /// Produce the cells of a fresh generation for `size`.
    pub fn generate(&self, size: GridSize, rng: &mut fastrand::Rng) -> Result<Vec<u8>, GridError> {
        let mut cells = vec![0; size.len()];
        match self {
            Seeding::Strided {
                stride,
                alive_probability,
            } => {
                for i in (0..cells.len()).step_by((*stride).max(1)) {
                    cells[i] = (rng.f32() < *alive_probability) as u8;
                }
            }
            Seeding::Uniform { density } => {
                for cell in cells.iter_mut() {
                    *cell = (rng.f32() < *density) as u8;
                }
            }
            Seeding::Blank => {}
            Seeding::Pattern(generation) => {
                if generation.size() != size {
                    return Err(GridError::SizeMismatch {
                        expected: size,
                        actual: generation.size(),
                    });
                }
                cells.copy_from_slice(generation.cells());
            }
        }
        Ok(cells)
    }
}

/// Conway's decision table. Two neighbours keep the cell as it is, three make
/// it alive, anything else kills it.
#[inline(always)]
pub fn next_state(current: u8, live_neighbors: u8) -> u8 {
    match live_neighbors {
        2 => current,
        3 => 1,
        _ => 0,
    }
}

/// Sum of the 8 neighbours of `(x, y)` on the torus.
#[inline(always)]
pub fn live_neighbors(cells: &[u8], size: GridSize, x: usize, y: usize) -> u8 {
    const N: [(isize, isize); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];

    let (width, height) = (size.width(), size.height());
    let mut live = 0;
    for (dx, dy) in N {
        let nx = GridSize::wrap(x, dx, width);
        let ny = GridSize::wrap(y, dy, height);
        live += cells[ny * width + nx];
    }
    live
}

/// Compute the next generation of `read` into `write`, one rayon task per row.
///
/// `read` is never modified. Panics if either buffer is not `size.len()` long.
pub fn step(read: &[u8], write: &mut [u8], size: GridSize) {
    assert_eq!(read.len(), size.len(), "read buffer does not match grid");
    assert_eq!(write.len(), size.len(), "write buffer does not match grid");
    write
        .par_chunks_mut(size.width())
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let current = read[y * size.width() + x];
                *out = next_state(current, live_neighbors(read, size, x, y));
            }
        });
}

/// A double-buffered Game of Life.
///
/// Buffer `steps % 2` is the read side of the next step. `flipped_bufs`
/// tracks that parity, so the current generation is always the buffer that
/// was written last.
pub trait LifeEngine: Send {
    fn size(&self) -> GridSize;
    /// Steps completed since creation or the last reset.
    fn steps(&self) -> u64;
    /// Advance exactly one generation.
    fn step(&mut self);
    fn step_n(&mut self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }
    /// Seed the first buffer, zero the second and restart the step counter.
    fn reset(&mut self, seeding: &Seeding, rng: &mut fastrand::Rng) -> Result<(), GridError>;
    /// Copy out the current generation.
    fn snapshot(&self) -> anyhow::Result<Generation>;
    fn backend_name(&self) -> &'static str;
}

/// The CPU engine: two owned `Vec<u8>` buffers and a rayon step.
pub struct CpuLife {
    size: GridSize,
    buf_1: Vec<u8>,
    buf_2: Vec<u8>,
    flipped_bufs: bool,
    steps: u64,
}

impl CpuLife {
    /// An all-dead grid.
    pub fn new(size: GridSize) -> Self {
        Self::from_generation(Generation::blank(size))
    }

    pub fn from_generation(start: Generation) -> Self {
        let size = start.size();
        Self {
            size,
            buf_1: start.into_cells(),
            buf_2: vec![0; size.len()],
            flipped_bufs: false,
            steps: 0,
        }
    }

    /// The buffer holding the current generation.
    pub fn current(&self) -> &[u8] {
        if self.flipped_bufs {
            &self.buf_2
        } else {
            &self.buf_1
        }
    }

    fn population(&self) -> usize {
        self.current().iter().map(|&c| c as usize).sum()
    }
}

impl LifeEngine for CpuLife {
    fn size(&self) -> GridSize {
        self.size
    }

    fn steps(&self) -> u64 {
        self.steps
    }

    fn step(&mut self) {
        let (read, write) = if self.flipped_bufs {
            (&self.buf_2, &mut self.buf_1)
        } else {
            (&self.buf_1, &mut self.buf_2)
        };
        step(read, write, self.size);
        self.flipped_bufs = !self.flipped_bufs;
        self.steps += 1;
    }

    fn reset(&mut self, seeding: &Seeding, rng: &mut fastrand::Rng) -> Result<(), GridError> {
        self.buf_1 = seeding.generate(self.size, rng)?;
        self.buf_2.fill(0);
        self.flipped_bufs = false;
        self.steps = 0;
        log::info!("cpu engine reset ({} live cells)", self.population());
        Ok(())
    }

    fn snapshot(&self) -> anyhow::Result<Generation> {
        Ok(Generation::from_cells(self.size, self.current().to_vec())?)
    }

    fn backend_name(&self) -> &'static str {
        "cpu"
    }
}

/// Which engine runs the simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Cpu,
    Gpu,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Backend::Cpu),
            "gpu" => Ok(Backend::Gpu),
            other => Err(anyhow::anyhow!("unknown backend `{other}`, expected `cpu` or `gpu`")),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Cpu => "cpu",
            Backend::Gpu => "gpu",
        })
    }
}

/// Build the engine the configuration asks for, seeded from `config.seeding`.
///
/// A GPU request that cannot be satisfied falls back to the CPU when
/// `config.gpu_fallback` is set.
pub fn create_engine(
    config: &LifeConfig,
    rng: &mut fastrand::Rng,
) -> anyhow::Result<Box<dyn LifeEngine>> {
    let size = config.grid_size()?;
    let start = Generation::from_cells(size, config.seeding.generate(size, rng)?)?;
    log::info!(
        "starting {size} grid on {} with {} live cells",
        config.backend,
        start.population()
    );
    match config.backend {
        Backend::Cpu => Ok(Box::new(CpuLife::from_generation(start))),
        Backend::Gpu => match pollster::block_on(GpuLife::create(&start)) {
            Ok(gpu) => Ok(Box::new(gpu)),
            Err(e) if config.gpu_fallback => {
                log::warn!("gpu engine unavailable ({e}), falling back to cpu");
                Ok(Box::new(CpuLife::from_generation(start)))
            }
            Err(e) => Err(e.into()),
        },
    }
}

use std::time::Duration;

use anyhow::{Context, bail};

use crate::{
    grid::{GridError, GridSize},
    sim::{Backend, Seeding},
};

/// Everything the driver needs to build and run a simulation.
#[derive(Clone, Debug)]
pub struct LifeConfig {
    pub width: usize,
    pub height: usize,
    pub backend: Backend,
    /// Run on the CPU when the GPU backend cannot be created.
    pub gpu_fallback: bool,
    pub seeding: Seeding,
    /// Seed for the random number generator. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Steps per second. 0 runs unpaced.
    pub tick_rate: u32,
    /// Number of snapshots the driver prints before stopping.
    pub frames: u32,
    pub capture_interval: Duration,
    pub log_level: log::LevelFilter,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            backend: Backend::Cpu,
            gpu_fallback: true,
            seeding: Seeding::default(),
            seed: None,
            tick_rate: 10,
            frames: 10,
            capture_interval: Duration::from_millis(500),
            log_level: log::LevelFilter::Info,
        }
    }
}

impl LifeConfig {
    /// Read `LIFESIM_*` variables from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from a key lookup, starting from the defaults.
    ///
    /// Recognised keys: `LIFESIM_SIZE` (square grid), `LIFESIM_WIDTH`,
    /// `LIFESIM_HEIGHT`, `LIFESIM_BACKEND` (`cpu`/`gpu`),
    /// `LIFESIM_GPU_FALLBACK`, `LIFESIM_DENSITY` (switches to uniform
    /// seeding), `LIFESIM_SEED`, `LIFESIM_TICK_RATE`, `LIFESIM_FRAMES`,
    /// `LIFESIM_CAPTURE_INTERVAL` (e.g. `250ms`) and `LIFESIM_LOG`.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LIFESIM_SIZE") {
            let side = parse_num(&v, "LIFESIM_SIZE")?;
            config.width = side;
            config.height = side;
        }
        if let Some(v) = get("LIFESIM_WIDTH") {
            config.width = parse_num(&v, "LIFESIM_WIDTH")?;
        }
        if let Some(v) = get("LIFESIM_HEIGHT") {
            config.height = parse_num(&v, "LIFESIM_HEIGHT")?;
        }
        if let Some(v) = get("LIFESIM_BACKEND") {
            config.backend = v.parse().context("LIFESIM_BACKEND")?;
        }
        if let Some(v) = get("LIFESIM_GPU_FALLBACK") {
            config.gpu_fallback = parse_bool(&v).context("LIFESIM_GPU_FALLBACK")?;
        }
        if let Some(v) = get("LIFESIM_DENSITY") {
            config.seeding = Seeding::Uniform {
                density: parse_num(&v, "LIFESIM_DENSITY")?,
            };
        }
        if let Some(v) = get("LIFESIM_SEED") {
            config.seed = Some(parse_num(&v, "LIFESIM_SEED")?);
        }
        if let Some(v) = get("LIFESIM_TICK_RATE") {
            config.tick_rate = parse_num(&v, "LIFESIM_TICK_RATE")?;
        }
        if let Some(v) = get("LIFESIM_FRAMES") {
            config.frames = parse_num(&v, "LIFESIM_FRAMES")?;
        }
        if let Some(v) = get("LIFESIM_CAPTURE_INTERVAL") {
            config.capture_interval = humantime::parse_duration(v.trim())
                .with_context(|| format!("LIFESIM_CAPTURE_INTERVAL: invalid duration `{v}`"))?;
        }
        if let Some(v) = get("LIFESIM_LOG") {
            config.log_level = v
                .trim()
                .parse()
                .with_context(|| format!("LIFESIM_LOG: invalid level `{v}`"))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn grid_size(&self) -> Result<GridSize, GridError> {
        GridSize::new(self.width, self.height)
    }

    /// Reject configurations that cannot describe a valid grid or seeding.
    pub fn validate(&self) -> anyhow::Result<()> {
        let size = self.grid_size()?;
        match &self.seeding {
            Seeding::Strided {
                stride,
                alive_probability,
            } => {
                if *stride == 0 {
                    bail!("seeding stride must be positive");
                }
                check_probability(*alive_probability)?;
            }
            Seeding::Uniform { density } => check_probability(*density)?,
            Seeding::Blank => {}
            Seeding::Pattern(generation) => {
                if generation.size() != size {
                    return Err(GridError::SizeMismatch {
                        expected: size,
                        actual: generation.size(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// A random number generator honouring `seed`.
    pub fn rng(&self) -> fastrand::Rng {
        match self.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        }
    }
}

fn parse_num<T>(value: &str, key: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{key}: invalid number `{value}`"))
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("invalid boolean `{other}`"),
    }
}

fn check_probability(p: f32) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&p) {
        bail!("probability {p} is outside 0..=1");
    }
    Ok(())
}

use lifesim::{
    Backend, CpuLife, Generation, GpuLife, GridSize, LifeConfig, LifeEngine, Seeding,
    create_engine, patterns,
};

const SEED: u64 = 42;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_generation(size: GridSize, seed: u64) -> Generation {
    let mut rng = fastrand::Rng::with_seed(seed);
    let cells = Seeding::Uniform { density: 0.35 }
        .generate(size, &mut rng)
        .unwrap();
    Generation::from_cells(size, cells).unwrap()
}

/// `None` when the machine has no usable compute adapter.
fn gpu(start: &Generation) -> Option<GpuLife> {
    match pollster::block_on(GpuLife::create(start)) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("skipping gpu test: {e}");
            None
        }
    }
}

fn assert_generations_equal(cpu: &Generation, gpu: &Generation) {
    assert_eq!(cpu.size(), gpu.size());
    if cpu == gpu {
        return;
    }
    let size = cpu.size();
    let mut picture = String::new();
    for y in 0..size.height() {
        picture.push('|');
        picture.extend((0..size.width()).map(|x| if cpu.is_alive(x, y) { '#' } else { ' ' }));
        picture.push('|');
        picture.extend((0..size.width()).map(|x| if gpu.is_alive(x, y) { '#' } else { ' ' }));
        picture.push_str("|\n");
    }
    panic!("cpu and gpu generations differ (cpu left, gpu right):\n{picture}");
}

#[test]
fn gpu_matches_cpu_step_for_step() {
    init_logger();
    for (w, h) in [(32, 32), (64, 64), (37, 19)] {
        let size = GridSize::new(w, h).unwrap();
        let start = random_generation(size, SEED);
        let Some(mut gpu) = gpu(&start) else {
            return;
        };
        let mut cpu = CpuLife::from_generation(start);
        for _ in 0..12 {
            cpu.step();
            gpu.step();
            assert_generations_equal(&cpu.snapshot().unwrap(), &gpu.snapshot().unwrap());
        }
        assert_eq!(gpu.steps(), 12);
    }
}

#[test]
fn gpu_wraps_on_grids_not_aligned_to_workgroups() {
    init_logger();
    for (w, h) in [(5, 3), (9, 9), (10, 10), (37, 19)] {
        let size = GridSize::new(w, h).unwrap();
        let start = random_generation(size, SEED + w as u64);
        let Some(mut gpu) = gpu(&start) else {
            return;
        };
        let mut cpu = CpuLife::from_generation(start);
        cpu.step();
        gpu.step();
        assert_generations_equal(&cpu.snapshot().unwrap(), &gpu.snapshot().unwrap());
    }
}

#[test]
fn gpu_blinker_across_the_corner() {
    init_logger();
    let size = GridSize::new(9, 7).unwrap();
    // Occupies (8, 0), (0, 0) and (1, 0); the vertical phase spans rows 6, 0 and 1.
    let horizontal = patterns::BLINKER.place(size, (8, 0));
    let Some(mut gpu) = gpu(&horizontal) else {
        return;
    };
    gpu.step();
    let vertical = gpu.snapshot().unwrap();
    assert_eq!(vertical.population(), 3);
    assert!(vertical.is_alive(0, 6) && vertical.is_alive(0, 0) && vertical.is_alive(0, 1));
    gpu.step();
    assert_eq!(gpu.snapshot().unwrap(), horizontal);
}

#[test]
fn gpu_blinker_and_lone_cell() {
    init_logger();
    let size = GridSize::square(5).unwrap();
    let horizontal = patterns::BLINKER.centered(size);
    let Some(mut gpu) = gpu(&horizontal) else {
        return;
    };
    gpu.step();
    assert_ne!(gpu.snapshot().unwrap(), horizontal);
    gpu.step();
    assert_eq!(gpu.snapshot().unwrap(), horizontal);

    let lone = Generation::parse("...\n.#.\n...\n").unwrap();
    let Some(mut gpu) = self::gpu(&lone) else {
        return;
    };
    gpu.step();
    assert_eq!(gpu.snapshot().unwrap().population(), 0);
}

#[test]
fn gpu_reset_zeroes_counter_and_reseeds() {
    init_logger();
    let size = GridSize::square(16).unwrap();
    let Some(mut gpu) = gpu(&random_generation(size, 1)) else {
        return;
    };
    gpu.step_n(5);
    let glider = patterns::GLIDER.place(size, (3, 3));
    gpu.reset(
        &Seeding::Pattern(glider.clone()),
        &mut fastrand::Rng::with_seed(SEED),
    )
    .unwrap();
    assert_eq!(gpu.steps(), 0);
    assert_eq!(gpu.snapshot().unwrap(), glider);

    let mut cpu = CpuLife::from_generation(glider);
    gpu.step_n(9);
    cpu.step_n(9);
    assert_generations_equal(&cpu.snapshot().unwrap(), &gpu.snapshot().unwrap());
}

#[test]
fn engines_agree_after_snapshot_round_trip() {
    init_logger();
    let size = GridSize::new(20, 12).unwrap();
    let mut cpu = CpuLife::from_generation(random_generation(size, 7));
    cpu.step_n(3);
    let snapshot = cpu.snapshot().unwrap();

    let mut restarted = CpuLife::from_generation(snapshot.clone());
    cpu.step();
    restarted.step();
    assert_eq!(cpu.snapshot().unwrap(), restarted.snapshot().unwrap());

    if let Some(mut gpu) = gpu(&snapshot) {
        gpu.step();
        assert_generations_equal(&cpu.snapshot().unwrap(), &gpu.snapshot().unwrap());
    }
}

#[test]
fn create_engine_falls_back_to_cpu() {
    init_logger();
    let config = LifeConfig {
        width: 24,
        height: 24,
        backend: Backend::Gpu,
        gpu_fallback: true,
        seed: Some(SEED),
        ..LifeConfig::default()
    };
    let mut rng = config.rng();
    let engine = create_engine(&config, &mut rng).unwrap();
    assert!(["cpu", "gpu"].contains(&engine.backend_name()));
    assert_eq!(engine.size(), GridSize::square(24).unwrap());
    assert_eq!(engine.steps(), 0);

    let start = engine.snapshot().unwrap();
    assert!(
        start
            .cells()
            .iter()
            .enumerate()
            .all(|(i, &c)| c == 0 || i % 3 == 0)
    );
}

#[test]
fn oversized_gpu_grid_is_a_setup_error() {
    init_logger();
    // 75000 workgroups along x, over the downlevel dispatch limit.
    let config = LifeConfig {
        width: 600_000,
        height: 1,
        backend: Backend::Gpu,
        gpu_fallback: false,
        seeding: Seeding::Blank,
        ..LifeConfig::default()
    };
    assert!(create_engine(&config, &mut config.rng()).is_err());

    let config = LifeConfig {
        gpu_fallback: true,
        ..config
    };
    let mut engine = create_engine(&config, &mut config.rng()).unwrap();
    assert_eq!(engine.backend_name(), "cpu");
    engine.step();
    assert_eq!(engine.snapshot().unwrap().population(), 0);
}

#[test]
fn create_engine_is_reproducible_with_a_seed() {
    let config = LifeConfig {
        seed: Some(SEED),
        seeding: Seeding::Uniform { density: 0.5 },
        ..LifeConfig::default()
    };
    let a = create_engine(&config, &mut config.rng()).unwrap();
    let b = create_engine(&config, &mut config.rng()).unwrap();
    assert_eq!(a.snapshot().unwrap(), b.snapshot().unwrap());
}

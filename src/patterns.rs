use crate::grid::{Generation, GridSize};

/// A named set of live cells, as `(x, y)` offsets from the pattern's top-left corner.
pub struct Pattern {
    pub name: &'static str,
    pub cells: &'static [(usize, usize)],
}

pub const BLINKER: Pattern = Pattern {
    name: "Blinker",
    cells: &[(0, 0), (1, 0), (2, 0)],
};

pub const TOAD: Pattern = Pattern {
    name: "Toad",
    cells: &[(1, 0), (2, 0), (3, 0), (0, 1), (1, 1), (2, 1)],
};

pub const BEACON: Pattern = Pattern {
    name: "Beacon",
    cells: &[(0, 0), (1, 0), (0, 1), (1, 1), (2, 2), (3, 2), (2, 3), (3, 3)],
};

pub const GLIDER: Pattern = Pattern {
    name: "Glider",
    cells: &[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)],
};

pub const R_PENTOMINO: Pattern = Pattern {
    name: "R-pentomino",
    cells: &[(1, 0), (2, 0), (0, 1), (1, 1), (1, 2)],
};

pub const PATTERNS: &[Pattern] = &[BLINKER, TOAD, BEACON, GLIDER, R_PENTOMINO];

impl Pattern {
    /// Look a pattern up by name, ignoring case.
    pub fn find(name: &str) -> Option<&'static Pattern> {
        PATTERNS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Bounding box as `(width, height)`.
    pub fn extent(&self) -> (usize, usize) {
        self.cells.iter().fold((0, 0), |(w, h), &(x, y)| {
            (w.max(x + 1), h.max(y + 1))
        })
    }

    /// A blank generation with the pattern's top-left corner at `origin`.
    /// Cells falling off an edge wrap around.
    pub fn place(&self, size: GridSize, origin: (usize, usize)) -> Generation {
        let mut generation = Generation::blank(size);
        for &(x, y) in self.cells {
            generation.set(origin.0 + x, origin.1 + y, true);
        }
        generation
    }

    /// Like [`Pattern::place`], roughly centred in the grid.
    pub fn centered(&self, size: GridSize) -> Generation {
        let (w, h) = self.extent();
        let origin = (
            size.width().saturating_sub(w) / 2,
            size.height().saturating_sub(h) / 2,
        );
        self.place(size, origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{CpuLife, LifeEngine};

    fn run(generation: Generation, steps: u64) -> Generation {
        let mut life = CpuLife::from_generation(generation);
        life.step_n(steps);
        life.snapshot().unwrap()
    }

    #[test]
    fn oscillators_have_period_two() {
        let size = GridSize::square(10).unwrap();
        for pattern in [&BLINKER, &TOAD, &BEACON] {
            let start = pattern.centered(size);
            let once = run(start.clone(), 1);
            assert_ne!(once, start, "{} did not move", pattern.name);
            assert_eq!(run(start.clone(), 2), start, "{}", pattern.name);
        }
    }

    #[test]
    fn glider_returns_shifted_after_four_steps() {
        let size = GridSize::square(8).unwrap();
        let start = GLIDER.place(size, (1, 1));
        assert_eq!(run(start, 4), GLIDER.place(size, (2, 2)));
    }

    #[test]
    fn glider_wraps_around_the_torus() {
        let size = GridSize::square(6).unwrap();
        // One full lap diagonally takes 4 steps per cell.
        let start = GLIDER.place(size, (0, 0));
        assert_eq!(run(start.clone(), 24), start);
    }

    #[test]
    fn place_wraps_offsets() {
        let size = GridSize::square(4).unwrap();
        let g = BLINKER.place(size, (3, 3));
        assert!(g.is_alive(3, 3));
        assert!(g.is_alive(0, 3));
        assert!(g.is_alive(1, 3));
        assert_eq!(g.population(), 3);
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(Pattern::find("glider").map(|p| p.name), Some("Glider"));
        assert_eq!(Pattern::find("r-PENTOMINO").map(|p| p.extent()), Some((3, 3)));
        assert!(Pattern::find("spaceship").is_none());
    }
}

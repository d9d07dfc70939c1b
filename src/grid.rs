//! Grid dimensions and immutable generation snapshots.
//!
//! A [`Generation`] is a flat, row-major buffer of cells (`0` dead, `1` alive)
//! together with the [`GridSize`] it was taken from. Index of `(x, y)` is
//! `y * width + x`. Coordinates wrap around both edges.

use std::fmt;

/// Precondition violations raised while setting up a grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    ZeroDimension { width: usize, height: usize },
    #[error("grid of {width}x{height} cells is too large to index with u32")]
    TooLarge { width: usize, height: usize },
    #[error("cell buffer holds {actual} cells but the grid needs {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("cell {index} has value {value}, expected 0 or 1")]
    InvalidCell { index: usize, value: u8 },
    #[error("generation is {actual} but the grid is {expected}")]
    SizeMismatch { expected: GridSize, actual: GridSize },
    #[error("pattern row {row} has {actual} cells, expected {expected}")]
    RaggedPattern {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("unknown glyph {glyph:?} at row {row}, column {column}")]
    UnknownGlyph {
        glyph: char,
        row: usize,
        column: usize,
    },
    #[error("pattern contains no rows")]
    EmptyPattern,
}

/// Dimensions of a toroidal grid. Always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridSize {
    width: usize,
    height: usize,
}

impl GridSize {
    pub fn new(width: usize, height: usize) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::ZeroDimension { width, height });
        }
        match width.checked_mul(height) {
            Some(len) if u32::try_from(len).is_ok() => Ok(Self { width, height }),
            _ => Err(GridError::TooLarge { width, height }),
        }
    }

    pub fn square(side: usize) -> Result<Self, GridError> {
        Self::new(side, side)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells, `width * height`.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Flat index of `(x, y)` after wrapping both coordinates onto the torus.
    #[inline(always)]
    pub fn index(&self, x: usize, y: usize) -> usize {
        (y % self.height) * self.width + (x % self.width)
    }

    /// Move `coord` by `delta` along an axis of length `dim`, wrapping at both ends.
    #[inline(always)]
    pub fn wrap(coord: usize, delta: isize, dim: usize) -> usize {
        (coord as isize + delta).rem_euclid(dim as isize) as usize
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A point-in-time copy of one generation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Generation {
    size: GridSize,
    cells: Vec<u8>,
}

impl Generation {
    /// An all-dead generation.
    pub fn blank(size: GridSize) -> Self {
        Self {
            size,
            cells: vec![0; size.len()],
        }
    }

    /// Wrap an existing cell buffer, checking its length and that every cell is 0 or 1.
    pub fn from_cells(size: GridSize, cells: Vec<u8>) -> Result<Self, GridError> {
        if cells.len() != size.len() {
            return Err(GridError::LengthMismatch {
                expected: size.len(),
                actual: cells.len(),
            });
        }
        if let Some((index, &value)) = cells.iter().enumerate().find(|(_, c)| **c > 1) {
            return Err(GridError::InvalidCell { index, value });
        }
        Ok(Self { size, cells })
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<u8> {
        self.cells
    }

    /// State of `(x, y)`; coordinates wrap.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.cells[self.size.index(x, y)]
    }

    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        self.get(x, y) == 1
    }

    pub fn set(&mut self, x: usize, y: usize, alive: bool) {
        let idx = self.size.index(x, y);
        self.cells[idx] = alive as u8;
    }

    /// Number of live cells.
    pub fn population(&self) -> usize {
        self.cells.iter().map(|&c| c as usize).sum()
    }

    /// One line per row, `dead`/`alive` glyph per cell.
    pub fn to_text(&self, dead: char, alive: char) -> String {
        let mut out = String::with_capacity((self.size.width + 1) * self.size.height);
        for row in self.cells.chunks(self.size.width) {
            out.extend(row.iter().map(|&c| if c == 0 { dead } else { alive }));
            out.push('\n');
        }
        out
    }

    /// Parse a plain-text picture.
    ///
    /// `.`, `0` and space are dead; `O`, `#`, `*` and `1` are alive. Lines
    /// starting with `!` are comments and trailing empty lines are ignored; a
    /// line of spaces is a row of dead cells.
    /// Every row must have the same width.
    pub fn parse(text: &str) -> Result<Self, GridError> {
        let mut rows: Vec<&str> = text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.starts_with('!'))
            .collect();
        while rows.last().is_some_and(|l| l.is_empty()) {
            rows.pop();
        }
        let Some(first) = rows.first() else {
            return Err(GridError::EmptyPattern);
        };
        let width = first.chars().count();
        let size = GridSize::new(width, rows.len())?;

        let mut cells = Vec::with_capacity(size.len());
        for (row, line) in rows.iter().enumerate() {
            let actual = line.chars().count();
            if actual != width {
                return Err(GridError::RaggedPattern {
                    row,
                    expected: width,
                    actual,
                });
            }
            for (column, glyph) in line.chars().enumerate() {
                cells.push(match glyph {
                    '.' | '0' | ' ' => 0,
                    'O' | '#' | '*' | '1' => 1,
                    _ => {
                        return Err(GridError::UnknownGlyph { glyph, row, column });
                    }
                });
            }
        }
        Ok(Self { size, cells })
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text('.', '#'))
    }
}

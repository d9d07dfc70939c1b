//! Pixel colours for rendered generations.

/// An opaque colour, stored as its three channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn grey(level: u8) -> Self {
        Self::rgb(level, level, level)
    }

    /// Inverse of [`Color::as_u32`]; the top byte is ignored.
    pub const fn from_u32(packed: u32) -> Self {
        Self::rgb((packed >> 16) as u8, (packed >> 8) as u8, packed as u8)
    }

    /// Packed as `0x00RRGGBB`.
    pub const fn as_u32(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | (self.b as u32)
    }
}

/// Packed pixels for the two cell states, resolved once per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellPalette {
    pub alive: u32,
    pub dead: u32,
}

impl CellPalette {
    pub const fn new(alive: Color, dead: Color) -> Self {
        Self {
            alive: alive.as_u32(),
            dead: dead.as_u32(),
        }
    }

    pub fn pixel(&self, alive: bool) -> u32 {
        if alive { self.alive } else { self.dead }
    }
}

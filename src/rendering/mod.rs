//! Turning generations into pixels for an external surface.

use crate::grid::Generation;
use crate::util::{CellPalette, Color};

pub const ALIVE_COLOR: Color = Color::grey(230);
pub const DEAD_COLOR: Color = Color::rgb(30, 30, 40);
pub const PALETTE: CellPalette = CellPalette::new(ALIVE_COLOR, DEAD_COLOR);

/// Scale `generation` onto a `width * height` pixel buffer, nearest cell per pixel.
pub fn display_generation(generation: &Generation, buf: &mut [u32], width: usize, height: usize) {
    display_generation_with(&PALETTE, generation, buf, width, height);
}

/// [`display_generation`] with custom cell colours.
pub fn display_generation_with(
    palette: &CellPalette,
    generation: &Generation,
    buf: &mut [u32],
    width: usize,
    height: usize,
) {
    let size = generation.size();
    let ratio_x = size.width() as f32 / width as f32;
    let ratio_y = size.height() as f32 / height as f32;
    for y in 0..height {
        let cell_y = ((y as f32 * ratio_y) as usize).min(size.height() - 1);
        for x in 0..width {
            let cell_x = ((x as f32 * ratio_x) as usize).min(size.width() - 1);
            buf[x + y * width] = palette.pixel(generation.is_alive(cell_x, cell_y));
        }
    }
}

pub struct RenderSurfaceSize {
    pub w_px: usize,
    pub h_px: usize,
}

/// Anything that can show a frame of packed `0x00RRGGBB` pixels.
pub trait RenderSurface {
    fn query_size(&self) -> RenderSurfaceSize;
    fn present_frame(&mut self, frame: &[u32]);
}

/// Draw `generation` at the surface's current size and present it.
pub fn present(generation: &Generation, surface: &mut dyn RenderSurface) {
    let RenderSurfaceSize { w_px, h_px } = surface.query_size();
    if w_px == 0 || h_px == 0 {
        return;
    }
    let mut buf = vec![0; w_px * h_px];
    display_generation(generation, &mut buf, w_px, h_px);
    surface.present_frame(&buf);
}

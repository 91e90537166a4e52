// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The compositor: one full pass over the histogram that overwrites
//! every pixel of the image.  Cheap next to accumulation, so the driver
//! only calls it every so many chunks.

use crate::color::{get_color_data, get_low_quality_point};
use crate::error::{check_buffer, BufferKind, Result};
use crate::params::AttractorParameters;
use crate::planes::PlaneMapper;

/// Composites `density` into `image` as a finished frame.  Unvisited
/// pixels get the background; visited ones get either the
/// density-weighted color (`high_quality`) or the flat attractor color.
pub fn render(
    density: &[u32],
    max_density: u32,
    plane: &PlaneMapper,
    high_quality: bool,
    params: &AttractorParameters,
    image: &mut [u32],
) -> Result<()> {
    render_with_progress(density, max_density, plane, high_quality, params, 1.0, image)
}

/// As [`render`], but the alpha of visited pixels follows the opacity
/// curve at `progress` instead of being fully opaque.  Flat coloring
/// is always opaque.
pub fn render_with_progress(
    density: &[u32],
    max_density: u32,
    plane: &PlaneMapper,
    high_quality: bool,
    params: &AttractorParameters,
    progress: f64,
    image: &mut [u32],
) -> Result<()> {
    let (width, height) = (plane.width(), plane.height());
    check_buffer(BufferKind::Density, density.len(), width, height, 1)?;
    check_buffer(BufferKind::Image, image.len(), width, height, 1)?;

    let shader = Shader::new(max_density, high_quality, params, progress);
    for (pixel, &hits) in image.iter_mut().zip(density) {
        *pixel = shader.color(hits);
    }
    Ok(())
}

/// As [`render_with_progress`], but writes straight into an
/// `[R, G, B, A]` byte buffer of four bytes per pixel, the layout a
/// canvas or image encoder takes.
pub fn render_bytes(
    density: &[u32],
    max_density: u32,
    plane: &PlaneMapper,
    high_quality: bool,
    params: &AttractorParameters,
    progress: f64,
    image: &mut [u8],
) -> Result<()> {
    let (width, height) = (plane.width(), plane.height());
    check_buffer(BufferKind::Density, density.len(), width, height, 1)?;
    check_buffer(BufferKind::ImageBytes, image.len(), width, height, 4)?;

    let shader = Shader::new(max_density, high_quality, params, progress);
    for (pixel, &hits) in image.chunks_exact_mut(4).zip(density) {
        pixel.copy_from_slice(&shader.color(hits).to_le_bytes());
    }
    Ok(())
}

// Per-render constants, worked out once rather than per pixel.
struct Shader<'a> {
    params: &'a AttractorParameters,
    background: u32,
    flat: u32,
    max_density: f64,
    high_quality: bool,
    progress: f64,
}

impl<'a> Shader<'a> {
    fn new(
        max_density: u32,
        high_quality: bool,
        params: &'a AttractorParameters,
        progress: f64,
    ) -> Self {
        Shader {
            params,
            background: params.background.packed(),
            flat: get_low_quality_point(params.hue, params.saturation, params.brightness),
            max_density: f64::from(max_density),
            high_quality,
            progress,
        }
    }

    fn color(&self, hits: u32) -> u32 {
        if hits == 0 {
            self.background
        } else if self.high_quality {
            get_color_data(
                f64::from(hits),
                self.max_density,
                self.params.hue,
                self.params.saturation,
                self.params.brightness,
                self.progress,
                &self.params.background,
            )
        } else {
            self.flat
        }
    }
}

/// Unpacks a rendered image into `[R, G, B, A]` bytes, row-major, the
/// layout image encoders and canvases take.
pub fn to_rgba_bytes(image: &[u32]) -> Vec<u8> {
    image.iter().flat_map(|pixel| pixel.to_le_bytes().to_vec()).collect()
}

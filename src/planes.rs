// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the PlaneMapper struct, which describes a relationship
//! between the attractor's own unbounded real plane and a rectangle of
//! pixels with an origin at 0,0.  Attractor coordinates are multiplied
//! by a scale and shifted to a center; anything that lands outside the
//! pixel rectangle is simply not there.

use crate::error::{KernelError, Result};
use crate::params::AttractorParameters;

/// Describes the column, row of a pixel on the canvas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pixel(pub usize, pub usize);

/// Maps attractor-space points onto a `width` by `height` canvas.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlaneMapper {
    width: usize,
    height: usize,
    // Where the attractor origin lands, in (fractional) pixels.
    center: (f64, f64),
    // Pixels per attractor unit.
    scale: f64,
}

impl PlaneMapper {
    /// Constructor.  Places the attractor origin at
    /// `(center_x, center_y)` on the canvas, `scale` pixels per unit.
    /// The canvas must be at least one pixel and small enough that its
    /// RGBA bytes can be addressed.
    pub fn new(
        width: usize,
        height: usize,
        center_x: f64,
        center_y: f64,
        scale: f64,
    ) -> Result<PlaneMapper> {
        let addressable = width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(4))
            .is_some();
        if width == 0 || height == 0 || !addressable {
            return Err(KernelError::InvalidDimensions { width, height });
        }
        Ok(PlaneMapper {
            width,
            height,
            center: (center_x, center_y),
            scale,
        })
    }

    /// The usual mapping: the origin sits in the middle of the canvas,
    /// shifted by the parameters' `left` and `top` pixel offsets.
    pub fn centered(width: usize, height: usize, params: &AttractorParameters) -> Result<PlaneMapper> {
        PlaneMapper::new(
            width,
            height,
            width as f64 / 2.0 + params.left,
            height as f64 / 2.0 + params.top,
            params.scale,
        )
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixels per attractor unit.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The total number of pixels on the canvas.  Used to size
    /// buffers.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// A mapper always covers at least one pixel.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Given a point on the attractor plane, find the pixel it falls
    /// in, or `None` if that pixel is off the canvas.  Non-finite
    /// points are never on the canvas.
    pub fn point_to_pixel(&self, x: f64, y: f64) -> Option<Pixel> {
        let left = (self.center.0 + x * self.scale).floor();
        let top = (self.center.1 + y * self.scale).floor();
        if left >= 0.0 && left < self.width as f64 && top >= 0.0 && top < self.height as f64 {
            Some(Pixel(left as usize, top as usize))
        } else {
            None
        }
    }

    /// As `point_to_pixel`, but returns the row-major offset of the
    /// pixel into a canvas-sized buffer.
    pub fn point_to_offset(&self, x: f64, y: f64) -> Option<usize> {
        self.point_to_pixel(x, y)
            .map(|Pixel(column, row)| row * self.width + column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planemapper_fails_on_empty_canvas() {
        assert!(PlaneMapper::new(0, 4, 0.0, 0.0, 1.0).is_err());
        assert!(PlaneMapper::new(4, 0, 0.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn planemapper_fails_on_unaddressable_canvas() {
        let huge = usize::max_value();
        assert_eq!(
            PlaneMapper::new(huge, 2, 0.0, 0.0, 1.0),
            Err(KernelError::InvalidDimensions {
                width: huge,
                height: 2
            })
        );
        assert!(PlaneMapper::new(huge / 4, 2, 0.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn planemapper_passes_on_good_shape() {
        let pm = PlaneMapper::new(4, 3, 2.0, 1.5, 1.0).unwrap();
        assert_eq!(pm.len(), 12);
        assert!(!pm.is_empty());
    }

    #[test]
    fn centered_uses_offsets_and_scale() {
        let params = AttractorParameters {
            left: 10.0,
            top: -5.0,
            scale: 20.0,
            ..AttractorParameters::default()
        };
        let pm = PlaneMapper::centered(100, 80, &params).unwrap();
        assert_eq!(pm.point_to_pixel(0.0, 0.0), Some(Pixel(60, 35)));
        assert_eq!(pm.point_to_pixel(1.0, 1.0), Some(Pixel(80, 55)));
        assert_eq!(pm.scale(), 20.0);
    }

    #[test]
    fn point_to_pixel_floors_toward_negative_infinity() {
        let pm = PlaneMapper::new(10, 10, 5.0, 5.0, 1.0).unwrap();
        assert_eq!(pm.point_to_pixel(-0.5, -0.5), Some(Pixel(4, 4)));
        assert_eq!(pm.point_to_pixel(0.99, 0.0), Some(Pixel(5, 5)));
        assert_eq!(pm.point_to_pixel(-5.0, -5.0), Some(Pixel(0, 0)));
        assert_eq!(pm.point_to_pixel(-5.01, 0.0), None);
    }

    #[test]
    fn point_to_pixel_drops_points_past_the_far_edges() {
        let pm = PlaneMapper::new(10, 10, 5.0, 5.0, 1.0).unwrap();
        assert_eq!(pm.point_to_pixel(4.99, 4.99), Some(Pixel(9, 9)));
        assert_eq!(pm.point_to_pixel(5.0, 0.0), None);
        assert_eq!(pm.point_to_pixel(0.0, 5.0), None);
    }

    #[test]
    fn point_to_pixel_rejects_non_finite_points() {
        let pm = PlaneMapper::new(10, 10, 5.0, 5.0, 1.0).unwrap();
        assert_eq!(pm.point_to_pixel(std::f64::NAN, 0.0), None);
        assert_eq!(pm.point_to_pixel(std::f64::INFINITY, 0.0), None);
        assert_eq!(pm.point_to_pixel(0.0, std::f64::NEG_INFINITY), None);
        let huge = PlaneMapper::new(10, 10, 5.0, 5.0, std::f64::MAX).unwrap();
        assert_eq!(huge.point_to_pixel(1.0, 1.0), None);
    }

    #[test]
    fn point_to_offset_is_row_major() {
        let pm = PlaneMapper::new(7, 5, 0.0, 0.0, 1.0).unwrap();
        assert_eq!(pm.point_to_offset(3.5, 2.5), Some(2 * 7 + 3));
        assert_eq!(pm.point_to_offset(6.5, 4.5), Some(34));
        assert_eq!(pm.point_to_offset(7.5, 0.0), None);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The color model.  A density value is turned into a color by taking
//! its logarithm relative to the brightest pixel seen so far, bending
//! that ratio through a handful of cubic Bezier easing curves, and
//! using the results to wash out the saturation of the target color
//! and to blend it over the background.
//!
//! Every packed color in this crate is `0xAABBGGRR`: red in the low
//! byte, alpha in the high byte, which is what a little-endian RGBA
//! canvas expects.

use num::clamp;

/// An 8-bit-per-channel color with no alpha.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rgb {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

/// Packs four channels into the `0xAABBGGRR` layout.
#[inline]
pub fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (u32::from(a) << 24) | (u32::from(b) << 16) | (u32::from(g) << 8) | u32::from(r)
}

fn channel(unit: f64) -> u8 {
    clamp((unit * 255.0).round(), 0.0, 255.0) as u8
}

/// Converts hue (degrees), saturation (percent) and value (percent)
/// to RGB.  Out-of-range inputs are clamped to `[0, 359]`, `[0, 100]`
/// and `[0, 100]` rather than rejected.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgb {
    let h = clamp(h, 0.0, 359.0);
    let s = clamp(s, 0.0, 100.0) / 100.0;
    let v = clamp(v, 0.0, 100.0) / 100.0;

    if s == 0.0 {
        let gray = channel(v);
        return Rgb {
            r: gray,
            g: gray,
            b: gray,
        };
    }

    let h = h / 60.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector as u32 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    Rgb {
        r: channel(r),
        g: channel(g),
        b: channel(b),
    }
}

// Fixed Newton-Raphson step count for inverting the x curve.  The
// rendered gradients were tuned against exactly this many steps.
const NEWTON_ITERATIONS: usize = 4;

/// A cubic Bezier easing curve through `(0,0)` and `(1,1)` with control
/// points `(x1, y1)` and `(x2, y2)`, in the familiar CSS
/// `cubic-bezier()` argument order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BezierEasing {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl BezierEasing {
    /// Builds a curve from the two control points.
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        BezierEasing { x1, y1, x2, y2 }
    }

    fn a(c1: f64, c2: f64) -> f64 {
        1.0 - 3.0 * c2 + 3.0 * c1
    }

    fn b(c1: f64, c2: f64) -> f64 {
        3.0 * c2 - 6.0 * c1
    }

    fn c(c1: f64) -> f64 {
        3.0 * c1
    }

    fn bezier(t: f64, c1: f64, c2: f64) -> f64 {
        ((Self::a(c1, c2) * t + Self::b(c1, c2)) * t + Self::c(c1)) * t
    }

    fn slope(t: f64, c1: f64, c2: f64) -> f64 {
        3.0 * Self::a(c1, c2) * t * t + 2.0 * Self::b(c1, c2) * t + Self::c(c1)
    }

    fn t_for_x(&self, x: f64) -> f64 {
        let mut t = x;
        for _ in 0..NEWTON_ITERATIONS {
            let slope = Self::slope(t, self.x1, self.x2);
            if slope == 0.0 {
                return t;
            }
            t -= (Self::bezier(t, self.x1, self.x2) - x) / slope;
        }
        t
    }

    /// Evaluates the curve.  Pinned to exactly 0 at or below `x = 0`
    /// and exactly 1 at or above `x = 1`; in between the result may
    /// overshoot `[0, 1]` when a control point lies outside it.
    pub fn ease(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        Self::bezier(self.t_for_x(x), self.y1, self.y2)
    }
}

/// Returns the curve as a plain closure.
pub fn bezier_easing(x1: f64, y1: f64, x2: f64, y2: f64) -> impl Fn(f64) -> f64 {
    let curve = BezierEasing::new(x1, y1, x2, y2);
    move |x| curve.ease(x)
}

/// How quickly dense pixels lose saturation.
pub const SATURATION_CURVE: BezierEasing = BezierEasing::new(0.79, -0.34, 0.54, 1.18);
/// How quickly dense pixels cover the background.
pub const DENSITY_CURVE: BezierEasing = BezierEasing::new(0.75, 0.38, 0.24, 1.33);
/// How opaque a frame is at a given fraction of the point budget.
pub const OPACITY_CURVE: BezierEasing = BezierEasing::new(0.24, 0.27, 0.13, 0.89);

/// The color behind the attractor.  Built from up to four integer
/// components; each is clamped to `[0, 255]`, missing color channels
/// default to 0 and a missing alpha defaults to 255.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Background {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Background {
    /// Builds a background from an RGBA component list of any length.
    /// Components past the fourth are ignored.
    pub fn from_components(components: &[i64]) -> Self {
        let get = |i: usize, fallback: u8| {
            components
                .get(i)
                .map(|&c| clamp(c, 0, 255) as u8)
                .unwrap_or(fallback)
        };
        Background {
            r: get(0, 0),
            g: get(1, 0),
            b: get(2, 0),
            a: get(3, 255),
        }
    }

    /// The background as a packed `0xAABBGGRR` pixel.
    pub fn packed(&self) -> u32 {
        pack_rgba(self.r, self.g, self.b, self.a)
    }
}

impl Default for Background {
    fn default() -> Self {
        Background {
            r: 0,
            g: 0,
            b: 0,
            a: 255,
        }
    }
}

fn lerp(from: u8, to: u8, t: f64) -> u8 {
    clamp((f64::from(to) * t + f64::from(from) * (1.0 - t)).round(), 0.0, 255.0) as u8
}

/// Colors one pixel of a high-quality render.
///
/// `density` is the pixel's visit count and `max_density` the largest
/// count on the canvas.  The log ratio between them drives both the
/// saturation falloff and how strongly the attractor color covers the
/// background.  `progress` selects the frame opacity along
/// [`OPACITY_CURVE`]; anything at or below zero means a finished frame.
/// Empty pixels return 0, fully transparent black.
pub fn get_color_data(
    density: f64,
    max_density: f64,
    h: f64,
    s: f64,
    v: f64,
    progress: f64,
    background: &Background,
) -> u32 {
    if !(density > 0.0) {
        return 0;
    }
    let max_density = if max_density <= 1.0 {
        1.01
    } else {
        max_density
    };

    let ratio = density.ln() / max_density.ln();

    let washout = clamp(SATURATION_CURVE.ease(ratio), 0.0, 1.0);
    let rgb = hsv_to_rgb(h, s - washout * s, v);

    let coverage = clamp(DENSITY_CURVE.ease(ratio), 0.0, 1.0);
    let r = lerp(background.r, rgb.r, coverage);
    let g = lerp(background.g, rgb.g, coverage);
    let b = lerp(background.b, rgb.b, coverage);

    let progress = if progress <= 0.0 { 1.0 } else { progress };
    let alpha = channel(clamp(OPACITY_CURVE.ease(progress), 0.0, 1.0));

    pack_rgba(r, g, b, alpha)
}

/// The flat, fully opaque color used when high-quality blending is off.
pub fn get_low_quality_point(h: f64, s: f64, v: f64) -> u32 {
    let rgb = hsv_to_rgb(h, s, v);
    pack_rgba(rgb.r, rgb.g, rgb.b, 255)
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The two point maps.  Each takes the current iterate and the four
//! coefficients and returns the next iterate; neither ever escapes, as
//! both are bounded sums of sines and cosines.

use rand::Rng;
use std::fmt;
use std::str::FromStr;

use crate::error::KernelError;

/// Which recurrence to iterate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AttractorKind {
    /// `x' = sin(a·y) + c·cos(a·x)`, `y' = sin(b·x) + d·cos(b·y)`
    Clifford,
    /// `x' = sin(a·y) − cos(b·x)`, `y' = sin(c·x) − cos(d·y)`
    DeJong,
}

impl AttractorKind {
    /// Advances `(x, y)` one step with this kind's formula.
    #[inline]
    pub fn step(self, x: f64, y: f64, a: f64, b: f64, c: f64, d: f64) -> (f64, f64) {
        match self {
            AttractorKind::Clifford => clifford(x, y, a, b, c, d),
            AttractorKind::DeJong => dejong(x, y, a, b, c, d),
        }
    }

    /// The name the host uses for this kind.
    pub fn name(self) -> &'static str {
        match self {
            AttractorKind::Clifford => "clifford",
            AttractorKind::DeJong => "dejong",
        }
    }
}

impl FromStr for AttractorKind {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clifford" => Ok(AttractorKind::Clifford),
            "dejong" => Ok(AttractorKind::DeJong),
            _ => Err(KernelError::InvalidAttractorKind(s.to_string())),
        }
    }
}

impl fmt::Display for AttractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The Clifford map.
#[inline]
pub fn clifford(x: f64, y: f64, a: f64, b: f64, c: f64, d: f64) -> (f64, f64) {
    (
        (a * y).sin() + c * (a * x).cos(),
        (b * x).sin() + d * (b * y).cos(),
    )
}

/// The Peter de Jong map.
#[inline]
pub fn dejong(x: f64, y: f64, a: f64, b: f64, c: f64, d: f64) -> (f64, f64) {
    (
        (a * y).sin() - (b * x).cos(),
        (c * x).sin() - (d * y).cos(),
    )
}

/// Magnitude of the smoothing jitter, in pixels.
pub const SMOOTHING_FACTOR: f64 = 0.2;

/// Nudges `value` by a fifth of a pixel, up or down with equal odds,
/// where a pixel is `1 / scale` units.  Breaks up the moiré that forms
/// when many iterates land on the same sub-pixel positions.
#[inline]
pub fn smoothing<R: Rng>(value: f64, scale: f64, rng: &mut R) -> f64 {
    let offset = if rng.gen_bool(0.5) {
        -SMOOTHING_FACTOR
    } else {
        SMOOTHING_FACTOR
    };
    value + offset * (1.0 / scale)
}

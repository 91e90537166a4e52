// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! What to draw, and where a drawing currently stands.

use rand::Rng;

use crate::color::Background;
use crate::maps::AttractorKind;

/// Default pixels per attractor unit.
pub const DEFAULT_SCALE: f64 = 150.0;

/// The immutable description of one attractor image.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AttractorParameters {
    /// Which recurrence to iterate.
    pub kind: AttractorKind,
    /// First coefficient.
    pub a: f64,
    /// Second coefficient.
    pub b: f64,
    /// Third coefficient.
    pub c: f64,
    /// Fourth coefficient.
    pub d: f64,
    /// Target hue in degrees, `[0, 360)`.
    pub hue: f64,
    /// Target saturation in percent.
    pub saturation: f64,
    /// Target brightness (HSV value) in percent.
    pub brightness: f64,
    /// Color of pixels no iterate has visited.
    pub background: Background,
    /// Pixels per attractor unit.  Must be positive.
    pub scale: f64,
    /// Horizontal offset of the attractor origin from the canvas
    /// center, in pixels.
    pub left: f64,
    /// Vertical offset of the attractor origin from the canvas center,
    /// in pixels.
    pub top: f64,
}

impl AttractorParameters {
    /// Applies this attractor's map once.
    #[inline]
    pub fn step(&self, x: f64, y: f64) -> (f64, f64) {
        self.kind.step(x, y, self.a, self.b, self.c, self.d)
    }
}

impl Default for AttractorParameters {
    fn default() -> Self {
        AttractorParameters {
            kind: AttractorKind::Clifford,
            a: 2.0,
            b: -2.0,
            c: 1.0,
            d: -1.0,
            hue: 333.0,
            saturation: 100.0,
            brightness: 100.0,
            background: Background::default(),
            scale: DEFAULT_SCALE,
            left: 0.0,
            top: 0.0,
        }
    }
}

/// Where an accumulation run has got to.  The host owns this and hands
/// it back on every call so that a long run can be cut into chunks.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RunState {
    /// Current iterate, in attractor units.
    pub x: f64,
    /// Current iterate, in attractor units.
    pub y: f64,
    /// Largest histogram bin seen so far in this run.  Never decreases.
    pub max_density: u32,
}

impl RunState {
    /// A fresh run starting from `(x, y)`.
    pub fn new(x: f64, y: f64) -> Self {
        RunState {
            x,
            y,
            max_density: 0,
        }
    }

    /// A fresh run starting from a uniformly random point in `[-1, 1]²`.
    pub fn random_start<R: Rng>(rng: &mut R) -> Self {
        RunState::new(rng.gen_range(-1.0, 1.0), rng.gen_range(-1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn defaults_match_the_application() {
        let p = AttractorParameters::default();
        assert_eq!(p.kind, AttractorKind::Clifford);
        assert_eq!((p.a, p.b, p.c, p.d), (2.0, -2.0, 1.0, -1.0));
        assert_eq!(p.background.packed(), 0xFF00_0000);
        assert_eq!(p.scale, DEFAULT_SCALE);
    }

    #[test]
    fn step_uses_own_coefficients() {
        let p = AttractorParameters {
            kind: AttractorKind::DeJong,
            ..AttractorParameters::default()
        };
        assert_eq!(p.step(0.4, -0.2), crate::maps::dejong(0.4, -0.2, 2.0, -2.0, 1.0, -1.0));
    }

    #[test]
    fn fresh_state_has_no_density() {
        let s = RunState::new(0.1, 0.1);
        assert_eq!(s.max_density, 0);
        assert_eq!(RunState::default(), RunState::new(0.0, 0.0));
    }

    #[test]
    fn random_start_stays_in_unit_square() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let s = RunState::random_start(&mut rng);
            assert!(s.x >= -1.0 && s.x < 1.0);
            assert!(s.y >= -1.0 && s.y < 1.0);
            assert_eq!(s.max_density, 0);
        }
    }
}

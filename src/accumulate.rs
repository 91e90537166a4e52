// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The density accumulator.  Iterates the point map, drops each iterate
//! onto the canvas, and counts how often every pixel is hit.  The
//! histogram is only ever added to, so a run can be cut into as many
//! calls as the host likes, and a zoomed view can keep building on the
//! density it already has.

use itertools::{Itertools, MinMaxResult};
use rand::Rng;

use crate::driver::CancellationToken;
use crate::error::{check_buffer, BufferKind, Result};
use crate::maps::smoothing;
use crate::params::{AttractorParameters, RunState};
use crate::planes::PlaneMapper;

/// How many points are computed between two cancellation checks.  A
/// cancelled call does at most this many points of extra work.
pub const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// What one accumulation call did.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Accumulation {
    /// The state to pass to the next call.
    pub state: RunState,
    /// How many points were iterated, whether or not they landed on the
    /// canvas.
    pub points_processed: u64,
    /// Whether the call stopped early because the host cancelled.
    pub cancelled: bool,
}

/// Iterates `params` for up to `budget` points starting from `state`,
/// incrementing `density` at every pixel an iterate lands on.
///
/// Each iterate is jittered by [`smoothing`] before it is both carried
/// forward and projected, so the jitter compounds from step to step.
/// Points that project off the canvas are skipped.  `cancel` is polled
/// before the first point and then every [`CANCEL_CHECK_INTERVAL`]
/// points; whatever was accumulated before it fired is kept.
///
/// Fails without touching `density` if it is not exactly canvas-sized.
pub fn accumulate<C, R>(
    state: RunState,
    params: &AttractorParameters,
    plane: &PlaneMapper,
    budget: u64,
    density: &mut [u32],
    cancel: &C,
    rng: &mut R,
) -> Result<Accumulation>
where
    C: CancellationToken + ?Sized,
    R: Rng,
{
    check_buffer(
        BufferKind::Density,
        density.len(),
        plane.width(),
        plane.height(),
        1,
    )?;

    let RunState {
        mut x,
        mut y,
        mut max_density,
    } = state;
    let mut processed = 0;
    let mut cancelled = false;

    while processed < budget {
        if processed % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let (nx, ny) = params.step(x, y);
        x = smoothing(nx, params.scale, rng);
        y = smoothing(ny, params.scale, rng);

        if let Some(offset) = plane.point_to_offset(x, y) {
            let bin = &mut density[offset];
            *bin = bin.saturating_add(1);
            if *bin > max_density {
                max_density = *bin;
            }
        }
        processed += 1;
    }

    Ok(Accumulation {
        state: RunState { x, y, max_density },
        points_processed: processed,
        cancelled,
    })
}

/// A summary of a density histogram, for logs and sanity checks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DensityStats {
    /// Pixels visited at least once.
    pub lit_pixels: usize,
    /// Sum of all bins.
    pub total_hits: u64,
    /// Smallest non-zero bin, or 0 if nothing is lit.
    pub min_density: u32,
    /// Largest bin.
    pub max_density: u32,
}

impl DensityStats {
    /// Scans a histogram.
    pub fn from_buffer(density: &[u32]) -> Self {
        let lit = density.iter().cloned().filter(|&d| d > 0);
        let (min_density, max_density) = match lit.clone().minmax() {
            MinMaxResult::NoElements => (0, 0),
            MinMaxResult::OneElement(d) => (d, d),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };
        DensityStats {
            lit_pixels: lit.clone().count(),
            total_hits: lit.map(u64::from).sum(),
            min_density,
            max_density,
        }
    }
}

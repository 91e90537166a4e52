// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The single-call entry point for hosts that keep their own loop:
//! accumulate a batch of points into a histogram they own, then
//! optionally composite it.  Everything arrives as plain values, the
//! attractor kind as a string, and is validated before either buffer
//! is touched.

use rand::Rng;

use crate::accumulate::accumulate;
use crate::color::Background;
use crate::driver::{CancellationToken, Progress, ProgressSink};
use crate::error::{check_buffer, BufferKind, Result};
use crate::params::{AttractorParameters, RunState};
use crate::planes::PlaneMapper;
use crate::render::render;

/// How many points `compute_chunk` iterates between progress reports.
pub const KERNEL_PROGRESS_INTERVAL: u64 = 100_000;

/// One batch of work, as a host describes it.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkRequest<'a> {
    /// `"clifford"` or `"dejong"`.
    pub attractor: &'a str,
    /// First coefficient.
    pub a: f64,
    /// Second coefficient.
    pub b: f64,
    /// Third coefficient.
    pub c: f64,
    /// Fourth coefficient.
    pub d: f64,
    /// Target hue in degrees.
    pub hue: f64,
    /// Target saturation in percent.
    pub saturation: f64,
    /// Target brightness in percent.
    pub brightness: f64,
    /// Up to four RGBA components.
    pub background: &'a [i64],
    /// Pixels per attractor unit.
    pub scale: f64,
    /// Horizontal offset from the canvas center, in pixels.
    pub left: f64,
    /// Vertical offset from the canvas center, in pixels.
    pub top: f64,
    /// Canvas width in pixels.
    pub width: usize,
    /// Canvas height in pixels.
    pub height: usize,
    /// Current iterate; `0` to start fresh.
    pub x: f64,
    /// Current iterate; `0` to start fresh.
    pub y: f64,
    /// Maximum density carried over from earlier batches.
    pub max_density: u32,
    /// Points to iterate in this batch.
    pub points_to_calculate: u64,
    /// Density-weighted rather than flat coloring.
    pub high_quality: bool,
    /// Composite the image after accumulating.
    pub should_draw: bool,
}

impl<'a> ChunkRequest<'a> {
    /// Parses the request's attractor description.
    pub fn parameters(&self) -> Result<AttractorParameters> {
        Ok(AttractorParameters {
            kind: self.attractor.parse()?,
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
            hue: self.hue,
            saturation: self.saturation,
            brightness: self.brightness,
            background: Background::from_components(self.background),
            scale: self.scale,
            left: self.left,
            top: self.top,
        })
    }

    /// The run state the request resumes from.
    pub fn state(&self) -> RunState {
        RunState {
            x: self.x,
            y: self.y,
            max_density: self.max_density,
        }
    }
}

/// What a batch did.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChunkResult {
    /// Iterate to pass back in as `x`.
    pub x: f64,
    /// Iterate to pass back in as `y`.
    pub y: f64,
    /// Maximum density to pass back in.
    pub max_density: u32,
    /// Points iterated in this batch.
    pub points_added: u64,
    /// Whether the host cancelled before the batch finished.  The image
    /// is not composited for a cancelled batch.
    pub cancelled: bool,
}

/// Runs one batch with the thread-local random generator.
pub fn compute_chunk<P, C>(
    request: &ChunkRequest<'_>,
    density: &mut [u32],
    image: &mut [u32],
    progress: &mut P,
    cancel: &C,
) -> Result<ChunkResult>
where
    P: ProgressSink + ?Sized,
    C: CancellationToken + ?Sized,
{
    compute_chunk_with_rng(
        request,
        density,
        image,
        progress,
        cancel,
        &mut rand::thread_rng(),
    )
}

/// Runs one batch: accumulates `points_to_calculate` points into
/// `density`, reporting progress every [`KERNEL_PROGRESS_INTERVAL`]
/// points and at the end, then composites into `image` if the request
/// asks for it.  `image` is only checked and touched when drawing.
pub fn compute_chunk_with_rng<P, C, R>(
    request: &ChunkRequest<'_>,
    density: &mut [u32],
    image: &mut [u32],
    progress: &mut P,
    cancel: &C,
    rng: &mut R,
) -> Result<ChunkResult>
where
    P: ProgressSink + ?Sized,
    C: CancellationToken + ?Sized,
    R: Rng,
{
    let params = request.parameters()?;
    let plane = PlaneMapper::centered(request.width, request.height, &params)?;
    check_buffer(
        BufferKind::Density,
        density.len(),
        request.width,
        request.height,
        1,
    )?;
    if request.should_draw {
        check_buffer(
            BufferKind::Image,
            image.len(),
            request.width,
            request.height,
            1,
        )?;
    }

    let total = request.points_to_calculate;
    let mut state = request.state();
    let mut added = 0;
    let mut cancelled = false;

    while added < total {
        let budget = KERNEL_PROGRESS_INTERVAL.min(total - added);
        let acc = accumulate(state, &params, &plane, budget, density, cancel, rng)?;
        state = acc.state;
        added += acc.points_processed;
        if acc.cancelled {
            cancelled = true;
            break;
        }
        progress.report(Progress::new(added, total));
    }

    if request.should_draw && !cancelled {
        render(
            density,
            state.max_density,
            &plane,
            request.high_quality,
            &params,
            image,
        )?;
    }

    Ok(ChunkResult {
        x: state.x,
        y: state.y,
        max_density: state.max_density,
        points_added: added,
        cancelled,
    })
}

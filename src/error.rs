// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Everything that can go wrong at the kernel boundary.  All of these
//! are contract violations detected before a buffer is touched;
//! cancellation is not an error and lives in `driver::Outcome`.

use failure::Fail;
use std::fmt;

use crate::driver::RunPhase;

/// Names the buffer that failed a size check.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferKind {
    /// The per-pixel visit histogram.
    Density,
    /// The packed RGBA output image.
    Image,
    /// A byte-granular RGBA image (four bytes per pixel).
    ImageBytes,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BufferKind::Density => "density",
            BufferKind::Image => "image",
            BufferKind::ImageBytes => "image byte",
        })
    }
}

/// The kernel's error taxonomy.
#[derive(Clone, Debug, Fail, PartialEq)]
pub enum KernelError {
    /// The attractor name was neither `clifford` nor `dejong`.
    #[fail(
        display = "Invalid attractor type: {}. Must be 'clifford' or 'dejong'.",
        _0
    )]
    InvalidAttractorKind(String),

    /// A caller-supplied buffer does not cover the canvas exactly.
    #[fail(
        display = "{} buffer holds {} elements, expected {}",
        buffer, actual, expected
    )]
    BufferSizeMismatch {
        /// Which buffer was wrong.
        buffer: BufferKind,
        /// Its actual length.
        actual: usize,
        /// The length the canvas requires.
        expected: usize,
    },

    /// Width or height was zero.
    #[fail(display = "canvas must be at least 1x1, got {}x{}", width, height)]
    InvalidDimensions {
        /// Requested width in pixels.
        width: usize,
        /// Requested height in pixels.
        height: usize,
    },

    /// A driver tunable would make the run ill-defined.
    #[fail(display = "invalid render configuration: {}", _0)]
    InvalidConfig(String),

    /// A progressive run was started from a phase other than idle.
    #[fail(display = "cannot start a run from the {} phase", _0)]
    InvalidPhase(RunPhase),

    /// A host worker thread panicked before reporting back.
    #[fail(display = "a render worker panicked")]
    WorkerPanicked,
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Checks that `actual` elements cover a `width` by `height` canvas at
/// `per_pixel` elements per pixel.  A canvas too large to address is
/// reported as `InvalidDimensions`.
pub(crate) fn check_buffer(
    buffer: BufferKind,
    actual: usize,
    width: usize,
    height: usize,
    per_pixel: usize,
) -> Result<()> {
    let expected = width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(per_pixel))
        .ok_or(KernelError::InvalidDimensions { width, height })?;
    if actual != expected {
        return Err(KernelError::BufferSizeMismatch {
            buffer,
            actual,
            expected,
        });
    }
    Ok(())
}

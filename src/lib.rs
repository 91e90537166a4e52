#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Attractor renderer
//!
//! The Clifford and Peter de Jong attractors are two-dimensional maps
//! built out of nothing but sines and cosines.  Start anywhere, apply
//! the map over and over, and the iterates never settle down and never
//! escape; they wander forever over a bounded, tangled, fractal set.
//! Mapping each iterate to the nearest pixel and counting how often
//! every pixel is visited gives a density histogram, and coloring that
//! histogram by the logarithm of its density gives the familiar
//! smoke-and-silk images.
//!
//! The work is split the way a host wants to consume it:
//!
//! * `accumulate` iterates the map into a histogram the host owns,
//!   and can be called again and again to keep adding points;
//! * `render` composites the histogram into a packed RGBA image;
//! * `ProgressiveRenderer` alternates the two over a large point
//!   budget, reporting progress, handing over intermediate frames and
//!   honoring cancellation;
//! * `compute_chunk` is the all-in-one call for hosts that run their
//!   own loop and speak in strings and plain numbers.
//!
//! The kernel itself never starts a thread.  `worker` has helpers for
//! hosts that want the work off their own thread, or spread over
//! several.

pub mod accumulate;
pub mod color;
pub mod driver;
pub mod error;
pub mod kernel;
pub mod maps;
pub mod params;
pub mod planes;
pub mod render;
pub mod worker;

pub use accumulate::{accumulate, Accumulation, DensityStats, CANCEL_CHECK_INTERVAL};
pub use color::{get_color_data, get_low_quality_point, hsv_to_rgb, Background, BezierEasing, Rgb};
pub use driver::{
    CancelFlag, CancellationToken, DriverConfig, FrameInfo, ImageSink, NeverCancel, Outcome,
    Progress, ProgressSink, ProgressiveRenderer, RunPhase, RunSummary, Silent,
};
pub use error::{BufferKind, KernelError, Result};
pub use kernel::{compute_chunk, compute_chunk_with_rng, ChunkRequest, ChunkResult};
pub use maps::{clifford, dejong, smoothing, AttractorKind};
pub use params::{AttractorParameters, RunState};
pub use planes::{Pixel, PlaneMapper};
pub use render::{render, render_bytes, render_with_progress, to_rgba_bytes};
pub use worker::{accumulate_parallel, PoolAccumulation, RenderEvent, RenderTask};

/// The crate version, for hosts that want to report which kernel they
/// are running.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

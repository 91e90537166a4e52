// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The progressive driver.  A full-quality attractor wants tens of
//! millions of points, which is far too long to run without showing
//! anything.  The driver cuts the budget into chunks, accumulates one
//! chunk at a time, and every so often composites the histogram into
//! the image and hands it to the host.  Between chunks (and inside
//! them) it asks the host whether to give up.
//!
//! The host is reached only through three small capabilities:
//! [`ProgressSink`], [`CancellationToken`] and [`ImageSink`].  Plain
//! closures implement all three.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::accumulate::accumulate;
use crate::error::{check_buffer, BufferKind, KernelError, Result};
use crate::params::{AttractorParameters, RunState};
use crate::planes::PlaneMapper;
use crate::render::render_with_progress;

/// Lets the host stop a computation.  Polled synchronously and
/// cooperatively; returning `true` is a request, honored at the next
/// check.
pub trait CancellationToken {
    /// Whether the host wants the computation to stop.
    fn is_cancelled(&self) -> bool;
}

impl<F> CancellationToken for F
where
    F: Fn() -> bool,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// A token that never fires.
#[derive(Copy, Clone, Debug, Default)]
pub struct NeverCancel;

impl CancellationToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A cancellation flag that can be shared with another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that has not fired.
    pub fn new() -> Self {
        CancelFlag::default()
    }

    /// Fires the flag.  Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl CancellationToken for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How far a computation has got.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Progress {
    /// `points_processed / total_points`, in `[0, 1]`.
    pub fraction: f64,
    /// Points iterated so far.
    pub points_processed: u64,
    /// Points the computation was asked for.
    pub total_points: u64,
}

impl Progress {
    pub(crate) fn new(points_processed: u64, total_points: u64) -> Self {
        let fraction = if total_points == 0 {
            1.0
        } else {
            points_processed as f64 / total_points as f64
        };
        Progress {
            fraction,
            points_processed,
            total_points,
        }
    }
}

/// Receives progress reports.  Called on the computation's own thread,
/// so it must return promptly.
pub trait ProgressSink {
    /// Records a progress report.
    fn report(&mut self, progress: Progress);
}

impl<F> ProgressSink for F
where
    F: FnMut(Progress),
{
    fn report(&mut self, progress: Progress) {
        self(progress)
    }
}

/// Describes a frame handed to an [`ImageSink`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameInfo {
    /// Canvas width.
    pub width: usize,
    /// Canvas height.
    pub height: usize,
    /// Points accumulated when the frame was drawn.
    pub points_processed: u64,
    /// Maximum density the frame was normalised against.
    pub max_density: u32,
    /// Whether this is the last frame of a completed run.
    pub is_final: bool,
}

/// Receives freshly composited frames.  The pixel slice is only valid
/// for the duration of the call; copy it to keep it.
pub trait ImageSink {
    /// Takes delivery of a frame.
    fn image_ready(&mut self, pixels: &[u32], info: FrameInfo);
}

impl<F> ImageSink for F
where
    F: FnMut(&[u32], FrameInfo),
{
    fn image_ready(&mut self, pixels: &[u32], info: FrameInfo) {
        self(pixels, info)
    }
}

/// Discards progress reports and frames alike.
#[derive(Copy, Clone, Debug, Default)]
pub struct Silent;

impl ProgressSink for Silent {
    fn report(&mut self, _: Progress) {}
}

impl ImageSink for Silent {
    fn image_ready(&mut self, _: &[u32], _: FrameInfo) {}
}

/// Points in a full-quality image.
pub const DEFAULT_POINTS: u64 = 20_000_000;
/// Points per chunk of the low-quality preview.
pub const LOW_QUALITY_POINTS: u64 = 5_000;
/// Chunks between frames of the low-quality preview.
pub const LOW_QUALITY_INTERVAL: u64 = 25;

/// Tunables of a progressive run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DriverConfig {
    /// Points to accumulate over the whole run.
    pub total_points: u64,
    /// Points per chunk.
    pub points_per_iteration: u64,
    /// A frame is drawn every this many chunks (and after the second
    /// and the last).
    pub draw_interval: u64,
    /// Progress is reported every this many chunks (and after the last).
    pub progress_interval: u64,
    /// Density-weighted blending rather than flat color.
    pub high_quality: bool,
    /// Let intermediate frames fade in along the opacity curve as the
    /// run proceeds, instead of drawing every frame opaque.
    pub fade_in: bool,
    /// Seeds the smoothing jitter.  `None` draws a seed from the OS.
    pub seed: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            total_points: DEFAULT_POINTS,
            points_per_iteration: 100_000,
            draw_interval: 10,
            progress_interval: 1,
            high_quality: true,
            fade_in: false,
            seed: None,
        }
    }
}

impl DriverConfig {
    /// The quick, flat-colored preview used while the user is still
    /// dragging things around.
    pub fn preview() -> Self {
        DriverConfig {
            points_per_iteration: LOW_QUALITY_POINTS,
            draw_interval: LOW_QUALITY_INTERVAL,
            high_quality: false,
            ..DriverConfig::default()
        }
    }

    /// Rejects settings under which a run would never finish or would
    /// divide by zero.
    pub fn validate(&self) -> Result<()> {
        if self.points_per_iteration == 0 {
            return Err(KernelError::InvalidConfig(
                "points per iteration must be positive".to_string(),
            ));
        }
        if self.draw_interval == 0 {
            return Err(KernelError::InvalidConfig(
                "draw interval must be positive".to_string(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(KernelError::InvalidConfig(
                "progress interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Where a [`ProgressiveRenderer`] is in its life.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunPhase {
    /// Ready to run.
    Idle,
    /// Inside `run`.
    Running,
    /// The whole budget was accumulated.
    Completed,
    /// The host cancelled; buffers hold whatever was done.
    Cancelled,
    /// A contract violation stopped the run.
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunPhase::Idle => "idle",
            RunPhase::Running => "running",
            RunPhase::Completed => "completed",
            RunPhase::Cancelled => "cancelled",
            RunPhase::Failed => "failed",
        })
    }
}

/// What a finished run did.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// State to resume from, if the host wants more points.
    pub state: RunState,
    /// Points iterated.
    pub points_processed: u64,
    /// Chunks accumulated, including a partial last one.
    pub chunks: u64,
    /// Frames handed to the image sink.
    pub frames: u64,
}

/// How a run ended.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Every point in the budget was accumulated.
    Completed(RunSummary),
    /// The host cancelled first.
    Cancelled(RunSummary),
}

impl Outcome {
    /// The summary, however the run ended.
    pub fn summary(&self) -> &RunSummary {
        match self {
            Outcome::Completed(summary) | Outcome::Cancelled(summary) => summary,
        }
    }

    /// Whether the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Outcome::Cancelled(_) => true,
            Outcome::Completed(_) => false,
        }
    }
}

/// Drives chunked, cancellable, progress-reporting accumulation and
/// compositing of one attractor onto one canvas.
#[derive(Debug)]
pub struct ProgressiveRenderer {
    params: AttractorParameters,
    plane: PlaneMapper,
    config: DriverConfig,
    phase: RunPhase,
}

impl ProgressiveRenderer {
    /// Prepares a renderer.  Fails on an invalid configuration.
    pub fn new(
        params: AttractorParameters,
        plane: PlaneMapper,
        config: DriverConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(ProgressiveRenderer {
            params,
            plane,
            config,
            phase: RunPhase::Idle,
        })
    }

    /// The canvas this renderer draws on.
    pub fn plane(&self) -> &PlaneMapper {
        &self.plane
    }

    /// The current phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Returns a finished renderer to `Idle` so it can run again.  To
    /// add more points to an image, pass the previous summary's state
    /// and the same density buffer to the next `run`.
    pub fn reset(&mut self) {
        self.phase = RunPhase::Idle;
    }

    /// Runs the whole budget from `state`, accumulating into `density`
    /// and compositing into `image`.
    ///
    /// After chunk `k` (counting from one) a frame is composited and
    /// handed to `sink` when `k == 2`, when `k` is a multiple of the
    /// draw interval, and after the last chunk.  Cancellation leaves
    /// both buffers as they were when it was noticed.
    pub fn run<P, C, I>(
        &mut self,
        state: RunState,
        density: &mut [u32],
        image: &mut [u32],
        progress: &mut P,
        cancel: &C,
        sink: &mut I,
    ) -> Result<Outcome>
    where
        P: ProgressSink + ?Sized,
        C: CancellationToken + ?Sized,
        I: ImageSink + ?Sized,
    {
        if self.phase != RunPhase::Idle {
            return Err(KernelError::InvalidPhase(self.phase));
        }
        self.phase = RunPhase::Running;
        match self.run_chunks(state, density, image, progress, cancel, sink) {
            Ok(outcome) => {
                let summary = outcome.summary();
                self.phase = if outcome.is_cancelled() {
                    info!(
                        points = summary.points_processed,
                        max_density = summary.state.max_density,
                        "attractor run cancelled"
                    );
                    RunPhase::Cancelled
                } else {
                    info!(
                        points = summary.points_processed,
                        max_density = summary.state.max_density,
                        frames = summary.frames,
                        "attractor run completed"
                    );
                    RunPhase::Completed
                };
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "attractor run failed");
                self.phase = RunPhase::Failed;
                Err(e)
            }
        }
    }

    fn run_chunks<P, C, I>(
        &self,
        mut state: RunState,
        density: &mut [u32],
        image: &mut [u32],
        progress: &mut P,
        cancel: &C,
        sink: &mut I,
    ) -> Result<Outcome>
    where
        P: ProgressSink + ?Sized,
        C: CancellationToken + ?Sized,
        I: ImageSink + ?Sized,
    {
        let (width, height) = (self.plane.width(), self.plane.height());
        check_buffer(BufferKind::Density, density.len(), width, height, 1)?;
        check_buffer(BufferKind::Image, image.len(), width, height, 1)?;

        let config = &self.config;
        let total = config.total_points;
        let mut rng = config.rng();
        let mut summary = RunSummary {
            state,
            points_processed: 0,
            chunks: 0,
            frames: 0,
        };

        while summary.points_processed < total {
            if cancel.is_cancelled() {
                return Ok(Outcome::Cancelled(summary));
            }

            let budget = config
                .points_per_iteration
                .min(total - summary.points_processed);
            let acc = accumulate(
                state,
                &self.params,
                &self.plane,
                budget,
                density,
                cancel,
                &mut rng,
            )?;
            state = acc.state;
            summary.state = state;
            summary.points_processed += acc.points_processed;
            summary.chunks += 1;
            if acc.cancelled {
                return Ok(Outcome::Cancelled(summary));
            }

            let chunk = summary.chunks;
            let done = summary.points_processed >= total;
            debug!(
                chunk,
                points = summary.points_processed,
                max_density = state.max_density,
                "accumulated chunk"
            );

            if done || chunk % config.progress_interval == 0 {
                progress.report(Progress::new(summary.points_processed, total));
            }

            if done || chunk == 2 || chunk % config.draw_interval == 0 {
                if cancel.is_cancelled() {
                    return Ok(Outcome::Cancelled(summary));
                }
                let fraction = Progress::new(summary.points_processed, total).fraction;
                let alpha_progress = if config.fade_in && !done { fraction } else { 1.0 };
                render_with_progress(
                    density,
                    state.max_density,
                    &self.plane,
                    config.high_quality,
                    &self.params,
                    alpha_progress,
                    image,
                )?;
                sink.image_ready(
                    image,
                    FrameInfo {
                        width,
                        height,
                        points_processed: summary.points_processed,
                        max_density: state.max_density,
                        is_final: done,
                    },
                );
                summary.frames += 1;
            }
        }

        Ok(Outcome::Completed(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maps::AttractorKind;
    use std::cell::Cell;

    fn renderer(config: DriverConfig) -> ProgressiveRenderer {
        let params = AttractorParameters {
            kind: AttractorKind::Clifford,
            a: -1.4,
            b: 1.6,
            c: 1.0,
            d: 0.7,
            scale: 10.0,
            ..AttractorParameters::default()
        };
        let plane = PlaneMapper::centered(40, 40, &params).unwrap();
        ProgressiveRenderer::new(params, plane, config).unwrap()
    }

    fn small(total_points: u64, points_per_iteration: u64) -> DriverConfig {
        DriverConfig {
            total_points,
            points_per_iteration,
            draw_interval: 4,
            seed: Some(42),
            ..DriverConfig::default()
        }
    }

    #[test]
    fn config_rejects_zero_tunables() {
        let mut c = DriverConfig::default();
        assert!(c.validate().is_ok());
        c.points_per_iteration = 0;
        assert!(c.validate().is_err());
        let c = DriverConfig {
            draw_interval: 0,
            ..DriverConfig::default()
        };
        assert!(c.validate().is_err());
        let c = DriverConfig {
            progress_interval: 0,
            ..DriverConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn preview_is_flat_and_coarse() {
        let c = DriverConfig::preview();
        assert!(!c.high_quality);
        assert_eq!(c.points_per_iteration, LOW_QUALITY_POINTS);
        assert_eq!(c.draw_interval, LOW_QUALITY_INTERVAL);
    }

    #[test]
    fn frames_follow_the_draw_cadence() {
        // 10 chunks, draw interval 4: frames after chunks 2, 4, 8 and 10
        let mut r = renderer(small(10_000, 1_000));
        let mut density = vec![0u32; r.plane().len()];
        let mut image = vec![0u32; r.plane().len()];
        let mut drawn = Vec::new();
        let mut reports = Vec::new();
        let outcome = r
            .run(
                RunState::new(0.1, 0.1),
                &mut density,
                &mut image,
                &mut |p: Progress| reports.push(p),
                &NeverCancel,
                &mut |_: &[u32], info: FrameInfo| drawn.push(info),
            )
            .unwrap();

        let at: Vec<u64> = drawn.iter().map(|f| f.points_processed).collect();
        assert_eq!(at, vec![2_000, 4_000, 8_000, 10_000]);
        assert!(drawn.last().unwrap().is_final);
        assert!(drawn[..3].iter().all(|f| !f.is_final));

        assert_eq!(reports.len(), 10);
        assert_eq!(reports.last().unwrap().fraction, 1.0);
        assert!(reports.windows(2).all(|w| w[0].fraction < w[1].fraction));

        match outcome {
            Outcome::Completed(s) => {
                assert_eq!(s.points_processed, 10_000);
                assert_eq!(s.chunks, 10);
                assert_eq!(s.frames, 4);
            }
            Outcome::Cancelled(_) => panic!("run should complete"),
        }
        assert_eq!(r.phase(), RunPhase::Completed);
    }

    #[test]
    fn last_chunk_may_be_partial() {
        let mut r = renderer(small(2_500, 1_000));
        let mut density = vec![0u32; r.plane().len()];
        let mut image = vec![0u32; r.plane().len()];
        let outcome = r
            .run(
                RunState::new(0.1, 0.1),
                &mut density,
                &mut image,
                &mut Silent,
                &NeverCancel,
                &mut Silent,
            )
            .unwrap();
        assert_eq!(outcome.summary().points_processed, 2_500);
        assert_eq!(outcome.summary().chunks, 3);
        assert_eq!(outcome.summary().frames, 2);
    }

    #[test]
    fn cancel_before_start_reports_cancelled() {
        let mut r = renderer(small(10_000, 1_000));
        let mut density = vec![0u32; r.plane().len()];
        let mut image = vec![7u32; r.plane().len()];
        let flag = CancelFlag::new();
        flag.cancel();
        let outcome = r
            .run(
                RunState::new(0.1, 0.1),
                &mut density,
                &mut image,
                &mut Silent,
                &flag,
                &mut Silent,
            )
            .unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.summary().points_processed, 0);
        assert!(density.iter().all(|&d| d == 0));
        assert!(image.iter().all(|&p| p == 7));
        assert_eq!(r.phase(), RunPhase::Cancelled);
    }

    #[test]
    fn cancel_between_chunks_keeps_partial_density() {
        let mut r = renderer(small(100_000, 1_000));
        let mut density = vec![0u32; r.plane().len()];
        let mut image = vec![0u32; r.plane().len()];
        let frames = Cell::new(0);
        let outcome = r
            .run(
                RunState::new(0.1, 0.1),
                &mut density,
                &mut image,
                &mut Silent,
                &|| frames.get() >= 1,
                &mut |_: &[u32], _: FrameInfo| frames.set(frames.get() + 1),
            )
            .unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(frames.get(), 1);
        let processed = outcome.summary().points_processed;
        assert!(processed >= 2_000 && processed < 100_000);
        assert!(density.iter().any(|&d| d > 0));
    }

    #[test]
    fn run_requires_idle() {
        let mut r = renderer(small(1_000, 1_000));
        let mut density = vec![0u32; r.plane().len()];
        let mut image = vec![0u32; r.plane().len()];
        let mut go = |r: &mut ProgressiveRenderer, state| {
            r.run(state, &mut density, &mut image, &mut Silent, &NeverCancel, &mut Silent)
        };
        let first = go(&mut r, RunState::new(0.1, 0.1)).unwrap();
        assert_eq!(
            go(&mut r, first.summary().state),
            Err(KernelError::InvalidPhase(RunPhase::Completed))
        );
        r.reset();
        let second = go(&mut r, first.summary().state).unwrap();
        assert!(second.summary().state.max_density >= first.summary().state.max_density);
    }

    #[test]
    fn mismatched_image_fails_the_run() {
        let mut r = renderer(small(1_000, 100));
        let mut density = vec![0u32; r.plane().len()];
        let mut image = vec![0u32; 3];
        let e = r
            .run(
                RunState::default(),
                &mut density,
                &mut image,
                &mut Silent,
                &NeverCancel,
                &mut Silent,
            )
            .unwrap_err();
        assert_eq!(
            e,
            KernelError::BufferSizeMismatch {
                buffer: BufferKind::Image,
                actual: 3,
                expected: 1600,
            }
        );
        assert_eq!(r.phase(), RunPhase::Failed);
        assert!(density.iter().all(|&d| d == 0));
    }

    #[test]
    fn fade_in_dims_early_frames() {
        let config = DriverConfig {
            fade_in: true,
            ..small(10_000, 1_000)
        };
        let mut r = renderer(config);
        let mut density = vec![0u32; r.plane().len()];
        let mut image = vec![0u32; r.plane().len()];
        let background = r.params.background.packed();
        let mut alphas = Vec::new();
        r.run(
            RunState::new(0.1, 0.1),
            &mut density,
            &mut image,
            &mut Silent,
            &NeverCancel,
            &mut |pixels: &[u32], _: FrameInfo| {
                let lit = pixels.iter().find(|&&p| p != background).cloned();
                alphas.push(lit.map(|p| p >> 24).unwrap_or(0));
            },
        )
        .unwrap();
        assert!(alphas[0] < 0xFF);
        assert_eq!(*alphas.last().unwrap(), 0xFF);
    }

    #[test]
    fn zero_point_run_completes_without_frames() {
        let mut r = renderer(small(0, 1_000));
        let mut density = vec![0u32; r.plane().len()];
        let mut image = vec![0u32; r.plane().len()];
        let outcome = r
            .run(
                RunState::default(),
                &mut density,
                &mut image,
                &mut Silent,
                &NeverCancel,
                &mut Silent,
            )
            .unwrap();
        assert!(!outcome.is_cancelled());
        assert_eq!(outcome.summary().frames, 0);
    }

    #[test]
    fn progress_fraction_handles_empty_budget() {
        assert_eq!(Progress::new(0, 0).fraction, 1.0);
        assert_eq!(Progress::new(25, 100).fraction, 0.25);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Host-side plumbing around the synchronous kernel.  The kernel never
//! starts a thread; these helpers are for hosts that want one.
//!
//! `RenderTask` runs a progressive render on a dedicated thread and
//! reports back over a channel.  `accumulate_parallel` splits a point
//! budget across a pool of workers, each with a private histogram, and
//! merges the results.

use crossbeam::channel::{unbounded, Receiver, Sender};
use crossbeam::thread::ScopedJoinHandle;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::thread;
use tracing::debug;

use crate::accumulate::{accumulate, Accumulation, DensityStats};
use crate::driver::{
    CancelFlag, CancellationToken, DriverConfig, FrameInfo, Outcome, Progress,
    ProgressiveRenderer,
};
use crate::error::{KernelError, Result};
use crate::params::{AttractorParameters, RunState};
use crate::planes::PlaneMapper;

/// Something that happened on a background render.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderEvent {
    /// A progress report.
    Progress(Progress),
    /// A copy of a freshly composited frame.
    Frame {
        /// Packed `0xAABBGGRR` pixels.
        pixels: Vec<u32>,
        /// What the frame shows.
        info: FrameInfo,
    },
    /// The run is over.
    Finished(std::result::Result<Outcome, KernelError>),
}

/// A progressive render running on its own thread.
pub struct RenderTask {
    cancel: CancelFlag,
    events: Receiver<RenderEvent>,
    handle: Option<thread::JoinHandle<Result<Outcome>>>,
}

impl RenderTask {
    /// Starts rendering `params` onto a fresh `width` by `height`
    /// canvas from a random starting point.  Configuration and canvas
    /// errors are reported here rather than on the channel.
    pub fn spawn(
        params: AttractorParameters,
        width: usize,
        height: usize,
        config: DriverConfig,
    ) -> Result<RenderTask> {
        let plane = PlaneMapper::centered(width, height, &params)?;
        let mut renderer = ProgressiveRenderer::new(params, plane, config)?;
        let cancel = CancelFlag::new();
        let (tx, events) = unbounded();

        let token = cancel.clone();
        let handle = thread::spawn(move || {
            let mut density = vec![0u32; plane.len()];
            let mut image = vec![0u32; plane.len()];
            let start = match config.seed {
                Some(seed) => RunState::random_start(&mut StdRng::seed_from_u64(seed)),
                None => RunState::random_start(&mut rand::thread_rng()),
            };
            let outcome = renderer.run(
                start,
                &mut density,
                &mut image,
                &mut |p: Progress| send(&tx, RenderEvent::Progress(p)),
                &token,
                &mut |pixels: &[u32], info: FrameInfo| {
                    send(
                        &tx,
                        RenderEvent::Frame {
                            pixels: pixels.to_vec(),
                            info,
                        },
                    )
                },
            );
            send(&tx, RenderEvent::Finished(outcome.clone()));
            outcome
        });

        Ok(RenderTask {
            cancel,
            events,
            handle: Some(handle),
        })
    }

    /// Asks the render to stop at its next cancellation check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The stream of events.  Ends with exactly one `Finished`.
    pub fn events(&self) -> &Receiver<RenderEvent> {
        &self.events
    }

    /// Waits for the render thread and returns how the run ended.
    pub fn join(mut self) -> Result<Outcome> {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(Err(KernelError::WorkerPanicked)),
            None => Err(KernelError::WorkerPanicked),
        }
    }
}

/// Dropping the handle cancels the render; the thread stops at its next
/// cancellation check.
impl Drop for RenderTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// A host that stopped listening doesn't stop the render.
fn send(tx: &Sender<RenderEvent>, event: RenderEvent) {
    if tx.send(event).is_err() {
        debug!("render event dropped, receiver is gone");
    }
}

/// Sums equally-sized histograms into one.
fn merge(regions: &[Vec<u32>], len: usize) -> Vec<u32> {
    let mut merged = vec![0u32; len];
    for region in regions {
        for (total, &hits) in merged.iter_mut().zip(region) {
            *total = total.saturating_add(hits);
        }
    }
    merged
}

/// The merged result of a worker pool.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolAccumulation {
    /// The summed histogram, canvas-sized.
    pub density: Vec<u32>,
    /// Its largest entry.
    pub max_density: u32,
    /// Points iterated across all workers.
    pub points_processed: u64,
    /// Whether any worker stopped early because the host cancelled.
    pub cancelled: bool,
}

/// Accumulates `total_points` of `params` on `threads` workers at once.
///
/// Each worker starts from its own random point with its own jitter
/// stream (seeded from `seed + worker` when a seed is given) and fills
/// a private histogram; the histograms are then summed.  `cancel` is
/// shared by every worker; cancelled workers contribute what they had
/// and the result is marked cancelled.
pub fn accumulate_parallel<C>(
    params: &AttractorParameters,
    plane: &PlaneMapper,
    total_points: u64,
    threads: usize,
    seed: Option<u64>,
    cancel: &C,
) -> Result<PoolAccumulation>
where
    C: CancellationToken + Sync + ?Sized,
{
    let threads = threads.max(1);
    let share = total_points / threads as u64;
    let remainder = total_points % threads as u64;

    let regions = crossbeam::scope(|spawner| {
        let handles: Vec<ScopedJoinHandle<Result<(Vec<u32>, Accumulation)>>> = (0..threads)
            .map(|worker| {
                let budget = share + if (worker as u64) < remainder { 1 } else { 0 };
                spawner.spawn(move |_| -> Result<(Vec<u32>, Accumulation)> {
                    let mut rng = match seed {
                        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(worker as u64)),
                        None => StdRng::from_entropy(),
                    };
                    let mut region = vec![0u32; plane.len()];
                    let start = RunState::random_start(&mut rng);
                    let acc =
                        accumulate(start, params, plane, budget, &mut region, cancel, &mut rng)?;
                    debug!(
                        worker,
                        points = acc.points_processed,
                        max_density = acc.state.max_density,
                        cancelled = acc.cancelled,
                        "worker finished"
                    );
                    Ok((region, acc))
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(Err(KernelError::WorkerPanicked)))
            .collect::<Result<Vec<(Vec<u32>, Accumulation)>>>()
    })
    .unwrap_or(Err(KernelError::WorkerPanicked))?;

    let (regions, runs): (Vec<Vec<u32>>, Vec<Accumulation>) = regions.into_iter().unzip();
    let density = merge(&regions, plane.len());
    let max_density = DensityStats::from_buffer(&density).max_density;
    Ok(PoolAccumulation {
        density,
        max_density,
        points_processed: runs.iter().map(|run| run.points_processed).sum(),
        cancelled: runs.iter().any(|run| run.cancelled),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NeverCancel;
    use crate::maps::AttractorKind;

    fn params() -> AttractorParameters {
        AttractorParameters {
            kind: AttractorKind::DeJong,
            a: 1.4,
            b: -2.3,
            c: 2.4,
            d: -2.1,
            scale: 12.0,
            ..AttractorParameters::default()
        }
    }

    #[test]
    fn merge_adds_regions_pointwise() {
        let merged = merge(&[vec![1, 0, 2], vec![0, 3, 4]], 3);
        assert_eq!(merged, vec![1, 3, 6]);
    }

    #[test]
    fn parallel_accumulation_keeps_every_point_on_canvas() {
        let p = params();
        let plane = PlaneMapper::centered(64, 64, &p).unwrap();
        let pool = accumulate_parallel(&p, &plane, 40_001, 4, Some(1), &NeverCancel).unwrap();
        // de Jong stays within [-2, 2], 24 pixels either side of center
        let stats = DensityStats::from_buffer(&pool.density);
        assert_eq!(stats.total_hits, 40_001);
        assert_eq!(stats.max_density, pool.max_density);
        assert_eq!(pool.points_processed, 40_001);
        assert!(!pool.cancelled);
        assert!(pool.max_density > 1);
    }

    #[test]
    fn cancelled_pool_adds_nothing_and_says_so() {
        let p = params();
        let plane = PlaneMapper::centered(32, 32, &p).unwrap();
        let flag = CancelFlag::new();
        flag.cancel();
        let pool = accumulate_parallel(&p, &plane, 100_000, 3, None, &flag).unwrap();
        assert!(pool.cancelled);
        assert_eq!(pool.points_processed, 0);
        assert_eq!(pool.max_density, 0);
        assert!(pool.density.iter().all(|&d| d == 0));

        let empty = accumulate_parallel(&p, &plane, 0, 3, None, &NeverCancel).unwrap();
        assert!(!empty.cancelled);
        assert_ne!(pool, empty);
    }

    #[test]
    fn background_task_reports_and_finishes() {
        let config = DriverConfig {
            total_points: 20_000,
            points_per_iteration: 2_000,
            draw_interval: 5,
            seed: Some(5),
            ..DriverConfig::default()
        };
        let task = RenderTask::spawn(params(), 48, 48, config).unwrap();
        let mut progress = 0;
        let mut frames = 0;
        let mut finished = None;
        for event in task.events().iter() {
            match event {
                RenderEvent::Progress(_) => progress += 1,
                RenderEvent::Frame { pixels, info } => {
                    assert_eq!(pixels.len(), 48 * 48);
                    assert_eq!((info.width, info.height), (48, 48));
                    frames += 1;
                }
                RenderEvent::Finished(outcome) => {
                    finished = Some(outcome);
                    break;
                }
            }
        }
        assert_eq!(progress, 10);
        // chunks 2, 5 and 10
        assert_eq!(frames, 3);
        let outcome = finished.unwrap().unwrap();
        assert!(!outcome.is_cancelled());
        assert_eq!(task.join().unwrap(), outcome);
    }

    #[test]
    fn background_task_can_be_cancelled() {
        let config = DriverConfig {
            total_points: 1_000_000_000,
            points_per_iteration: 10_000,
            ..DriverConfig::default()
        };
        let task = RenderTask::spawn(params(), 32, 32, config).unwrap();
        task.cancel();
        let outcome = task.join().unwrap();
        assert!(outcome.is_cancelled());
        assert!(outcome.summary().points_processed < 1_000_000_000);
    }

    #[test]
    fn dropping_the_task_stops_the_render() {
        let config = DriverConfig {
            total_points: 1_000_000_000,
            points_per_iteration: 10_000,
            ..DriverConfig::default()
        };
        let task = RenderTask::spawn(params(), 32, 32, config).unwrap();
        let flag = task.cancel.clone();
        let events = task.events().clone();
        drop(task);
        assert!(flag.is_cancelled());

        let finished = events.iter().find_map(|event| match event {
            RenderEvent::Finished(outcome) => Some(outcome),
            _ => None,
        });
        let outcome = finished.unwrap().unwrap();
        assert!(outcome.is_cancelled());
        assert!(outcome.summary().points_processed < 1_000_000_000);
    }

    #[test]
    fn spawn_rejects_bad_config() {
        let config = DriverConfig {
            draw_interval: 0,
            ..DriverConfig::default()
        };
        assert!(RenderTask::spawn(params(), 32, 32, config).is_err());
        assert_eq!(
            RenderTask::spawn(params(), 0, 32, DriverConfig::default()).err(),
            Some(KernelError::InvalidDimensions {
                width: 0,
                height: 32
            })
        );
    }
}

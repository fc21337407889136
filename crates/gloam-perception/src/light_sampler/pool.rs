// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The persistent worker pool behind a light sampler.
//!
//! Workers and the coordinator alternate strictly on a generation gate:
//!
//! 1. every worker waits until `generation` moves past the last one it scanned,
//! 2. scans its slice of the shared image and stores a [`ChunkReading`],
//! 3. bumps `completed`.
//!
//! Only once `completed` equals the worker count may the coordinator rewrite
//! the image, reset `completed` and advance `generation`. Scans and refreshes
//! therefore never overlap; the `RwLock` around the image only makes that
//! protocol memory safe.

use super::source::SampleImage;
use crate::error::{PerceptionError, PerceptionResult};
use gloam_core::math::LinearRgba;
use std::ops::Range;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pixels with alpha at or below this are treated as "nothing rendered".
pub(crate) const ALPHA_THRESHOLD: f32 = 0.01;

/// What one worker found in its slice during one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct ChunkReading {
    /// Mean channel average of the opaque pixels, `0.0` when there were none.
    pub average: f32,
    /// How many opaque pixels contributed.
    pub counted: usize,
}

#[derive(Debug)]
struct Gate {
    generation: u64,
    completed: usize,
    shutdown: bool,
}

struct Shared {
    gate: Mutex<Gate>,
    release: Condvar,
    image: RwLock<SampleImage>,
    readings: Mutex<Vec<ChunkReading>>,
}

pub(crate) struct WorkerPool {
    shared: Arc<Shared>,
    ranges: Vec<Range<usize>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts one worker per chunk of `image`. The first generation is
    /// released immediately, so workers begin scanning right away.
    pub(crate) fn spawn(
        name: &str,
        image: SampleImage,
        threads: usize,
        poll_interval: Duration,
    ) -> PerceptionResult<Self> {
        let ranges = partition(image.len(), threads);
        let shared = Arc::new(Shared {
            gate: Mutex::new(Gate {
                generation: 1,
                completed: 0,
                shutdown: false,
            }),
            release: Condvar::new(),
            image: RwLock::new(image),
            readings: Mutex::new(vec![ChunkReading::default(); ranges.len()]),
        });

        let mut pool = Self {
            shared,
            ranges,
            handles: Vec::with_capacity(threads),
        };

        for (index, range) in pool.ranges.iter().cloned().enumerate() {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("{name}-light-{index}"))
                .spawn(move || run_worker(shared, index, range, poll_interval))
                // Dropping `pool` here joins the workers that did start.
                .map_err(PerceptionError::WorkerSpawn)?;
            pool.handles.push(handle);
        }

        Ok(pool)
    }

    pub(crate) fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Returns every chunk's reading if all workers finished the current
    /// generation, without blocking.
    pub(crate) fn poll(&self) -> Option<Vec<ChunkReading>> {
        let gate = lock(&self.shared.gate);
        if gate.completed < self.ranges.len() {
            return None;
        }
        Some(lock(&self.shared.readings).clone())
    }

    /// Lets the coordinator rewrite the image, then releases the next
    /// generation. Only call after [`WorkerPool::poll`] returned readings.
    pub(crate) fn release_next(&self, refresh: impl FnOnce(&mut SampleImage)) {
        {
            let mut image = self
                .shared
                .image
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            refresh(&mut image);
        }

        let mut gate = lock(&self.shared.gate);
        debug_assert_eq!(gate.completed, self.ranges.len());
        gate.completed = 0;
        gate.generation += 1;
        self.shared.release.notify_all();
    }

    fn shutdown(&mut self) {
        lock(&self.shared.gate).shutdown = true;
        self.shared.release.notify_all();

        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::warn!("A light sampler worker panicked before shutdown.");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: Arc<Shared>, index: usize, range: Range<usize>, poll_interval: Duration) {
    let mut scanned = 0u64;
    loop {
        {
            let mut gate = lock(&shared.gate);
            while gate.generation == scanned && !gate.shutdown {
                gate = shared
                    .release
                    .wait_timeout(gate, poll_interval)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
            if gate.shutdown {
                return;
            }
            scanned = gate.generation;
        }

        let reading = {
            let image = shared.image.read().unwrap_or_else(PoisonError::into_inner);
            scan(&image.pixels()[range.clone()])
        };
        lock(&shared.readings)[index] = reading;
        lock(&shared.gate).completed += 1;
    }
}

/// Splits `len` items into `workers` contiguous ranges. The last range takes
/// the remainder, so the ranges always cover `0..len` exactly.
pub(crate) fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let chunk = len / workers;
    (0..workers)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == workers { len } else { start + chunk };
            start..end
        })
        .collect()
}

/// Mean channel average over the opaque pixels of `pixels`. Pixels with a
/// non-finite channel carry no light reading and are skipped.
pub(crate) fn scan(pixels: &[LinearRgba]) -> ChunkReading {
    let (sum, counted) = pixels
        .iter()
        .filter(|pixel| pixel.a > ALPHA_THRESHOLD && pixel.channel_average().is_finite())
        .fold((0.0f32, 0usize), |(sum, counted), pixel| {
            (sum + pixel.channel_average(), counted + 1)
        });

    ChunkReading {
        average: if counted > 0 { sum / counted as f32 } else { 0.0 },
        counted,
    }
}

/// Averages the chunks that saw at least one opaque pixel.
pub(crate) fn aggregate(readings: &[ChunkReading]) -> Option<f32> {
    let (sum, valid) = readings
        .iter()
        .filter(|reading| reading.counted > 0)
        .fold((0.0f32, 0usize), |(sum, valid), reading| {
            (sum + reading.average, valid + 1)
        });
    (valid > 0).then(|| sum / valid as f32)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

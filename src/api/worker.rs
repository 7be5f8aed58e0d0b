//! Background mosaic builds
//!
//! Builds run on a fixed-size rayon pool. Results are posted to a
//! [`BuildInbox`] owned by whoever submitted them; the submitter drains the
//! inbox on its own thread, so a finished mosaic is only ever committed by the
//! single owner of the render state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::core::Raster;
use crate::processing::mosaic::{build_mosaic, CancelToken, Mosaic};
use crate::processing::parser::PixelSource;
use crate::utils::config::MosaicConfig;
use crate::validation::{SonarError, SonarResult};

/// Result of one submitted build
#[derive(Debug)]
pub struct BuildOutcome {
    pub generation: u64,
    pub resolution: f64,
    pub result: SonarResult<Arc<Mosaic>>,
}

/// Completed builds waiting to be collected
#[derive(Debug, Default)]
pub struct BuildInbox {
    queue: Mutex<VecDeque<BuildOutcome>>,
    arrived: Condvar,
}

impl BuildInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, outcome: BuildOutcome) {
        self.queue.lock().push_back(outcome);
        self.arrived.notify_all();
    }

    /// Take everything posted so far, oldest first
    pub fn drain(&self) -> Vec<BuildOutcome> {
        self.queue.lock().drain(..).collect()
    }

    /// Block until something is posted or `timeout` passes.
    /// Returns whether the inbox is non-empty.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock();
        while queue.is_empty() {
            if self.arrived.wait_until(&mut queue, deadline).timed_out() {
                break;
            }
        }
        !queue.is_empty()
    }
}

/// Fixed-size pool executing mosaic builds
pub struct MosaicWorker {
    pool: ThreadPool,
    source: Arc<dyn PixelSource>,
    config: MosaicConfig,
}

impl MosaicWorker {
    pub fn new(threads: usize, source: Arc<dyn PixelSource>, config: MosaicConfig) -> SonarResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("mosaic-worker-{}", i))
            .build()
            .map_err(|e| SonarError::Worker { message: e.to_string() })?;
        Ok(Self { pool, source, config })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue a build. The outcome is always posted to `inbox`, including
    /// cancellation and load failures.
    pub fn submit(
        &self,
        raster: Arc<Raster>,
        resolution: f64,
        generation: u64,
        cancel: CancelToken,
        inbox: Arc<BuildInbox>,
    ) {
        let source = Arc::clone(&self.source);
        let config = self.config.clone();

        self.pool.spawn(move || {
            let result = if cancel.is_cancelled() {
                Err(SonarError::Cancelled)
            } else {
                source
                    .load(&raster)
                    .and_then(|image| build_mosaic(&raster, &image, resolution, &config, &cancel))
                    .map(Arc::new)
            };
            debug!(
                raster = raster.filename(),
                generation,
                resolution,
                ok = result.is_ok(),
                "mosaic build finished"
            );
            inbox.post(BuildOutcome {
                generation,
                resolution,
                result,
            });
        });
    }
}

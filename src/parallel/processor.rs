//! Main parallel processor
//!
//! Wires the reader, batcher, worker and merge sink threads together.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

use crate::jobs::JobSpec;
use crate::platform::Ctrl;
use crate::readers::RecordRead;
use crate::runner::JobOutcome;

use super::batching::{batcher_thread, io_reader_thread};
use super::sink::{merge_sink_thread, SinkExit};
use super::tracker::GlobalTally;
use super::types::{BatcherThreadConfig, ParallelConfig};

fn join_thread<T>(handle: JoinHandle<T>, name: &str) -> Result<T> {
    handle
        .join()
        .map_err(|_| anyhow!("{} thread panicked", name))
}

/// Main parallel processor
pub struct ParallelProcessor {
    config: ParallelConfig,
    global_tally: GlobalTally,
}

impl ParallelProcessor {
    pub fn new(config: ParallelConfig) -> Self {
        Self {
            config,
            global_tally: GlobalTally::new(),
        }
    }

    /// Run `job` over every record of `reader`, one partition per batch
    pub fn process(
        &self,
        reader: Box<dyn RecordRead>,
        job: &JobSpec,
        combine: bool,
        ctrl_rx: Receiver<Ctrl>,
    ) -> Result<JobOutcome> {
        let (batch_sender, batch_receiver) = match self.config.buffer_size {
            Some(size) => bounded(size),
            None => unbounded(),
        };
        let (result_sender, result_receiver) = bounded(self.config.num_workers * 4);
        let (line_sender, line_receiver) = bounded(self.config.buffer_size.unwrap_or(10000));

        debug!(
            workers = self.config.num_workers,
            batch_size = self.config.batch_size,
            "starting parallel run"
        );

        let io_handle = thread::spawn(move || io_reader_thread(reader, line_sender));

        let batch_handle = {
            let config = BatcherThreadConfig {
                batch_sender,
                batch_size: self.config.batch_size,
                batch_timeout: Duration::from_millis(self.config.batch_timeout_ms),
                global_tally: self.global_tally.clone(),
            };
            thread::spawn(move || batcher_thread(line_receiver, config))
        };

        let mut worker_handles = Vec::with_capacity(self.config.num_workers);
        for worker_id in 0..self.config.num_workers {
            let work_receiver = batch_receiver.clone();
            let result_sender = result_sender.clone();
            let job = job.clone();
            worker_handles.push(thread::spawn(move || {
                super::worker::worker_thread(worker_id, work_receiver, result_sender, job, combine)
            }));
        }
        // workers hold the only remaining ends
        drop(batch_receiver);
        drop(result_sender);

        let sink_handle = {
            let global_tally = self.global_tally.clone();
            thread::spawn(move || merge_sink_thread(result_receiver, global_tally, ctrl_rx))
        };

        if join_thread(sink_handle, "Merge sink")? == SinkExit::Interrupted {
            // the remaining threads wind down once their channels close
            return Ok(JobOutcome {
                stats: self.global_tally.snapshot_stats(),
                tally: self.global_tally.take_tally(),
                interrupted: true,
            });
        }

        let files = join_thread(io_handle, "IO reader")?;
        join_thread(batch_handle, "Batcher")??;
        for (idx, handle) in worker_handles.into_iter().enumerate() {
            join_thread(handle, &format!("Worker {}", idx))??;
        }
        self.global_tally.set_files_processed(files);

        Ok(JobOutcome {
            stats: self.global_tally.snapshot_stats(),
            tally: self.global_tally.take_tally(),
            interrupted: false,
        })
    }
}

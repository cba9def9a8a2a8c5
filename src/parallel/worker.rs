//! Worker thread: maps batches into partials

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::Ordering;
use tracing::trace;

use crate::jobs::{map_partition, JobSpec};
use crate::platform::SHOULD_TERMINATE;
use crate::stats::ProcessingStats;

use super::types::{Batch, BatchResult};

/// Process batches until the batch channel closes. Each batch is its own
/// partition: the job's scope is opened for it and released before the
/// next batch is taken, also when the worker stops early.
pub(crate) fn worker_thread(
    worker_id: usize,
    work_receiver: Receiver<Batch>,
    result_sender: Sender<BatchResult>,
    job: JobSpec,
    combine: bool,
) -> Result<()> {
    trace!(worker_id, job = job.name(), "worker started");
    let mut batches = 0usize;

    while let Ok(batch) = work_receiver.recv() {
        if SHOULD_TERMINATE.load(Ordering::Relaxed) {
            break;
        }

        let mut worker_stats = ProcessingStats::default();
        let mut scope = job.setup()?;
        let partial = map_partition(
            &mut scope,
            &batch.lines,
            batch.start_line_num,
            combine,
            &mut worker_stats,
        );
        scope.close();
        batches += 1;

        let result = BatchResult {
            batch_id: batch.id,
            partial,
            worker_stats,
        };
        if result_sender.send(result).is_err() {
            break;
        }
    }

    trace!(worker_id, batches, "worker finished");
    Ok(())
}

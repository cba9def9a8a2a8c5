//! Type definitions for parallel processing

use crossbeam_channel::Sender;
use std::time::Duration;

use crate::stats::ProcessingStats;
use crate::tally::Partial;

use super::tracker::GlobalTally;

/// Configuration for parallel processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_workers: usize,
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
    /// Bound of the line and batch channels; `None` means unbounded
    pub buffer_size: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            batch_size: 1000,
            batch_timeout_ms: 200,
            buffer_size: Some(10000),
        }
    }
}

/// A batch of records; every batch is one partition
#[derive(Debug, Clone)]
pub(crate) struct Batch {
    pub id: u64,
    pub lines: Vec<String>,
    pub start_line_num: usize,
}

/// Message type for IO reader thread communication
#[derive(Debug)]
pub(crate) enum LineMessage {
    Line(String),
    Error {
        error: std::io::Error,
        source: Option<String>,
    },
    Eof,
}

/// Partial result of one batch, with the counters of the worker that mapped it
#[derive(Debug)]
pub(crate) struct BatchResult {
    pub batch_id: u64,
    pub partial: Partial,
    pub worker_stats: ProcessingStats,
}

/// Configuration for the batcher thread
pub(crate) struct BatcherThreadConfig {
    pub batch_sender: Sender<Batch>,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub global_tally: GlobalTally,
}

//! Parallel counting engine
//!
//! # Module Structure
//!
//! - `types`: batches, messages and configuration
//! - `tracker`: the thread-safe global tally partials are merged into
//! - `batching`: IO reader and batcher threads
//! - `worker`: worker threads mapping one batch per partition
//! - `sink`: merge sink thread
//! - `processor`: `ParallelProcessor` orchestration

mod batching;
mod processor;
mod sink;
mod tracker;
mod types;
mod worker;

pub use processor::ParallelProcessor;
pub use tracker::GlobalTally;
pub use types::ParallelConfig;

pub(crate) use batching::{io_reader_thread, reader_error};
pub(crate) use types::LineMessage;

//! Counting jobs
//!
//! A job turns records into `(key, 1)` emissions. Each partition of the input
//! is mapped through a [`PartitionScope`]: the job's resources are acquired
//! when the scope is opened and released when it is dropped, whether the
//! partition finished normally or the worker bailed out early.

pub mod browsers;
pub mod wordcount;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, trace};

use crate::extract::{ExtractError, FieldSpec};
use crate::stats::ProcessingStats;
use crate::tally::Partial;
use crate::useragent::{Category, ClassifyError};

pub use browsers::BrowserCounter;
pub use wordcount::{tokens, TokenCounter};

/// Why a record produced no emissions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

/// Per-record transform of a job
pub trait Mapper: Send {
    fn name(&self) -> &'static str;

    /// Map one non-blank record. Implementations emit only when they succeed,
    /// so a skipped record never contributes a partial count.
    fn map(&mut self, record: &str, emit: &mut dyn FnMut(&str)) -> Result<(), SkipReason>;

    /// Release the resources acquired at setup
    fn teardown(self: Box<Self>) {}
}

/// Job selection, as given on the command line
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JobKind {
    /// Count whitespace-separated words
    #[default]
    Wordcount,
    /// Count user-agent categories of access-log lines
    Browsers,
}

/// Cloneable job description, shared with every worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSpec {
    WordCount,
    Browsers { field: FieldSpec, category: Category },
}

impl JobSpec {
    pub fn name(&self) -> &'static str {
        match self {
            JobSpec::WordCount => "wordcount",
            JobSpec::Browsers { .. } => "browsers",
        }
    }

    /// Acquire the job's resources for one partition
    pub fn setup(&self) -> Result<PartitionScope> {
        let mapper: Box<dyn Mapper> = match self {
            JobSpec::WordCount => Box::new(TokenCounter),
            JobSpec::Browsers { field, category } => {
                Box::new(BrowserCounter::setup(*field, *category)?)
            }
        };
        trace!(job = mapper.name(), "partition scope opened");
        Ok(PartitionScope {
            mapper: Some(mapper),
        })
    }
}

/// A mapper whose teardown runs when the scope goes away
pub struct PartitionScope {
    mapper: Option<Box<dyn Mapper>>,
}

impl PartitionScope {
    pub fn name(&self) -> &'static str {
        self.mapper.as_ref().map_or("closed", |m| m.name())
    }

    pub fn map(&mut self, record: &str, emit: &mut dyn FnMut(&str)) -> Result<(), SkipReason> {
        match self.mapper.as_mut() {
            Some(mapper) => mapper.map(record, emit),
            None => Ok(()),
        }
    }

    /// Tear the mapper down now instead of at the end of the enclosing block
    pub fn close(self) {}
}

impl Drop for PartitionScope {
    fn drop(&mut self) {
        if let Some(mapper) = self.mapper.take() {
            let name = mapper.name();
            mapper.teardown();
            trace!(job = name, "partition scope closed");
        }
    }
}

/// Map records into `out`, accounting for every record in `stats`.
///
/// `first_line` is the 1-based input line number of the first record and is
/// only used for diagnostics.
pub fn map_records<I>(
    scope: &mut PartitionScope,
    records: I,
    first_line: usize,
    out: &mut Partial,
    stats: &mut ProcessingStats,
) where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    for (offset, record) in records.into_iter().enumerate() {
        let record = record.as_ref();
        if record.trim().is_empty() {
            stats.blank_lines += 1;
            continue;
        }

        let mut emitted = 0;
        let result = scope.map(record, &mut |key| {
            emitted += 1;
            out.push(key);
        });

        match result {
            Ok(()) => {
                stats.records_mapped += 1;
                stats.emissions += emitted;
            }
            Err(reason) => {
                debug!(
                    line = first_line + offset,
                    job = scope.name(),
                    %reason,
                    "record skipped"
                );
                stats.record_skip(&reason);
            }
        }
    }
}

/// Map one whole partition. With `combine` set the emissions are summed
/// locally before they leave the partition.
pub fn map_partition<I>(
    scope: &mut PartitionScope,
    records: I,
    first_line: usize,
    combine: bool,
    stats: &mut ProcessingStats,
) -> Partial
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut partial = Partial::empty(combine);
    map_records(scope, records, first_line, &mut partial, stats);
    stats.partitions += 1;
    partial
}

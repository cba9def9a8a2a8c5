//! Job execution
//!
//! Runs a counting job in sequential or parallel mode and hands the final
//! tally to the output writer.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, never, select, Receiver};
use std::sync::atomic::Ordering;
use std::thread;
use tracing::{info, warn};

use crate::config::LogtallyConfig;
use crate::jobs::{map_records, JobSpec};
use crate::output::{prepare_destination, write_to_directory, write_to_stdout};
use crate::parallel::{io_reader_thread, reader_error, LineMessage, ParallelProcessor};
use crate::platform::{Ctrl, SafeStderr, SHOULD_TERMINATE};
use crate::readers::{preflight, resolve_inputs, MultiFileReader, RecordRead};
use crate::stats::ProcessingStats;
use crate::tally::{Partial, Tally};

const LINE_CHANNEL_BOUND: usize = 1024;

/// Merged result of one job run
#[derive(Debug)]
pub struct JobOutcome {
    pub tally: Tally,
    pub stats: ProcessingStats,
    /// The run was stopped by a shutdown request; `tally` is incomplete
    pub interrupted: bool,
}

/// What `run` reports back to `main`
#[derive(Debug)]
pub struct RunSummary {
    pub stats: ProcessingStats,
    pub interrupted: bool,
}

fn snapshot(stats: &ProcessingStats, partial: &Partial) -> ProcessingStats {
    let mut current = stats.clone();
    if let Partial::Combined(tally) = partial {
        current.distinct_keys = tally.len();
    }
    current.finish();
    current
}

/// Map the whole input as a single partition on the calling thread. A reader
/// thread feeds records so that control messages are handled while the input
/// blocks.
pub fn run_sequential(
    reader: Box<dyn RecordRead>,
    job: &JobSpec,
    combine: bool,
    ctrl_rx: Receiver<Ctrl>,
) -> Result<JobOutcome> {
    let mut stats = ProcessingStats::new();
    let mut scope = job.setup()?;
    let mut partial = Partial::empty(combine);

    let (line_sender, line_receiver) = bounded(LINE_CHANNEL_BOUND);
    let reader_handle = thread::spawn(move || io_reader_thread(reader, line_sender));

    let mut ctrl_closed = false;
    let mut interrupted = false;

    loop {
        if SHOULD_TERMINATE.load(Ordering::Relaxed) {
            interrupted = true;
            break;
        }

        let ctrl = if ctrl_closed { never() } else { ctrl_rx.clone() };
        select! {
            recv(ctrl) -> msg => match msg {
                Ok(Ctrl::Shutdown { .. }) => {
                    interrupted = true;
                    break;
                }
                Ok(Ctrl::PrintStats) => {
                    let current = snapshot(&stats, &partial);
                    SafeStderr::new().writeln(&format!("logtally: {}", current.format_stats()));
                }
                Err(_) => ctrl_closed = true,
            },
            recv(line_receiver) -> msg => match msg {
                Ok(LineMessage::Line(line)) => {
                    stats.lines_read += 1;
                    let line_num = stats.lines_read;
                    map_records(&mut scope, [line.as_str()], line_num, &mut partial, &mut stats);
                }
                Ok(LineMessage::Error { error, source }) => return Err(reader_error(error, source)),
                Ok(LineMessage::Eof) | Err(_) => break,
            },
        }
    }

    if interrupted {
        // the reader stops once its channel is gone
        let stats = snapshot(&stats, &partial);
        return Ok(JobOutcome {
            tally: partial.into_tally(),
            stats,
            interrupted: true,
        });
    }

    let files = reader_handle
        .join()
        .map_err(|_| anyhow!("IO reader thread panicked"))?;
    scope.close();

    stats.partitions += 1;
    stats.files_processed = files;
    let tally = partial.into_tally();
    stats.distinct_keys = tally.len();
    stats.finish();

    Ok(JobOutcome {
        tally,
        stats,
        interrupted: false,
    })
}

/// Run the configured job end to end: check inputs, clear the output
/// destination, count, and write the result.
///
/// An interrupted run writes nothing.
pub fn run(config: &LogtallyConfig, ctrl_rx: &Receiver<Ctrl>) -> Result<RunSummary> {
    let sources = resolve_inputs(&config.input.files, config.input.root.as_deref());
    preflight(&sources)?;

    if let Some(dir) = &config.output.directory {
        prepare_destination(dir)?;
    }

    let job = &config.job.spec;
    info!(
        job = job.name(),
        inputs = sources.len(),
        parallel = config.performance.parallel,
        combine = config.job.combine,
        "job started"
    );

    let reader: Box<dyn RecordRead> = Box::new(MultiFileReader::new(sources));
    let outcome = if config.performance.parallel {
        ParallelProcessor::new(config.parallel_config()).process(
            reader,
            job,
            config.job.combine,
            ctrl_rx.clone(),
        )?
    } else {
        run_sequential(reader, job, config.job.combine, ctrl_rx.clone())?
    };

    if outcome.interrupted {
        warn!(job = job.name(), "run interrupted, no output written");
        return Ok(RunSummary {
            stats: outcome.stats,
            interrupted: true,
        });
    }

    let keys = outcome.tally.len();
    let entries = outcome
        .tally
        .into_sorted(config.output.sort, config.output.top);
    match &config.output.directory {
        Some(dir) => write_to_directory(dir, &entries, config.output.format)?,
        None => write_to_stdout(&entries, config.output.format)?,
    }

    info!(
        job = job.name(),
        keys,
        emissions = outcome.stats.emissions,
        skipped = outcome.stats.records_skipped(),
        "job finished"
    );

    Ok(RunSummary {
        stats: outcome.stats,
        interrupted: false,
    })
}

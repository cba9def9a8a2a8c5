//! Reader and batcher threads
//!
//! The IO reader streams records into a bounded channel; the batcher cuts
//! them into batches of `batch_size` records, flushing a partial batch when
//! no new record arrived within `batch_timeout`.

use anyhow::{anyhow, Result};
use crossbeam_channel::{after, never, select, Receiver, Sender};
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::trace;

use crate::platform::SHOULD_TERMINATE;
use crate::readers::RecordRead;

use super::types::{Batch, BatcherThreadConfig, LineMessage};

/// IO reader thread. Returns the number of files it opened.
pub(crate) fn io_reader_thread(
    mut reader: Box<dyn RecordRead>,
    line_sender: Sender<LineMessage>,
) -> usize {
    let mut buffer = Vec::new();
    loop {
        if SHOULD_TERMINATE.load(Ordering::Relaxed) {
            break;
        }

        match reader.read_record(&mut buffer) {
            Ok(Some(line)) => {
                if line_sender.send(LineMessage::Line(line)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                let _ = line_sender.send(LineMessage::Eof);
                break;
            }
            Err(error) => {
                let source = reader.current_source().map(|s| s.to_string());
                let _ = line_sender.send(LineMessage::Error { error, source });
                break;
            }
        }
    }
    reader.files_opened()
}

/// Turn a reader-side failure into the error that ends the run
pub(crate) fn reader_error(error: std::io::Error, source: Option<String>) -> anyhow::Error {
    let context = source
        .map(|s| format!("while reading {}", s))
        .unwrap_or_else(|| "while reading input".to_string());
    anyhow::Error::from(error).context(context)
}

/// Batcher thread - collects records into batches for the workers
pub(crate) fn batcher_thread(
    line_receiver: Receiver<LineMessage>,
    config: BatcherThreadConfig,
) -> Result<()> {
    let mut batch_id = 0u64;
    let mut current_batch = Vec::with_capacity(config.batch_size);
    let mut line_num = 0usize;
    let mut batch_start_line = 1usize;
    let mut pending_deadline: Option<Instant> = None;

    loop {
        if SHOULD_TERMINATE.load(Ordering::Relaxed) {
            break;
        }

        let timeout = match pending_deadline {
            Some(deadline) => after(deadline.saturating_duration_since(Instant::now())),
            None => never(),
        };

        select! {
            recv(line_receiver) -> msg => match msg {
                Ok(LineMessage::Line(line)) => {
                    line_num += 1;
                    current_batch.push(line);

                    if current_batch.len() >= config.batch_size {
                        send_batch(&config.batch_sender, &mut current_batch, &mut batch_id, batch_start_line)?;
                        batch_start_line = line_num + 1;
                        pending_deadline = None;
                    } else if pending_deadline.is_none() && !config.batch_timeout.is_zero() {
                        pending_deadline = Some(Instant::now() + config.batch_timeout);
                    }
                }
                Ok(LineMessage::Error { error, source }) => {
                    config.global_tally.set_total_lines_read(line_num);
                    return Err(reader_error(error, source));
                }
                Ok(LineMessage::Eof) | Err(_) => {
                    send_batch(&config.batch_sender, &mut current_batch, &mut batch_id, batch_start_line)?;
                    break;
                }
            },
            recv(timeout) -> _ => {
                send_batch(&config.batch_sender, &mut current_batch, &mut batch_id, batch_start_line)?;
                batch_start_line = line_num + 1;
                pending_deadline = None;
            }
        }
    }

    trace!(batches = batch_id, lines = line_num, "batcher finished");
    config.global_tally.set_total_lines_read(line_num);
    Ok(())
}

/// Send the pending records as one batch. Nothing is sent for an empty batch.
pub(crate) fn send_batch(
    batch_sender: &Sender<Batch>,
    current_batch: &mut Vec<String>,
    batch_id: &mut u64,
    batch_start_line: usize,
) -> Result<()> {
    if current_batch.is_empty() {
        return Ok(());
    }

    let batch = Batch {
        id: *batch_id,
        lines: std::mem::take(current_batch),
        start_line_num: batch_start_line,
    };
    *batch_id += 1;

    batch_sender
        .send(batch)
        .map_err(|_| anyhow!("Worker channel closed"))
}

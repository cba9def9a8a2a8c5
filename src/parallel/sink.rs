//! Merge sink thread: folds worker partials into the global tally

use crossbeam_channel::{never, select, Receiver};
use std::sync::atomic::Ordering;
use tracing::trace;

use crate::platform::{Ctrl, SafeStderr, SHOULD_TERMINATE};

use super::tracker::GlobalTally;
use super::types::BatchResult;

/// How the sink stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SinkExit {
    /// Every worker finished and all partials were merged
    Drained,
    /// Shutdown was requested; the merged state is incomplete
    Interrupted,
}

/// Merge partials in arrival order until the result channel closes. The sink
/// is the only parallel stage listening for control messages.
pub(crate) fn merge_sink_thread(
    result_receiver: Receiver<BatchResult>,
    global_tally: GlobalTally,
    ctrl_rx: Receiver<Ctrl>,
) -> SinkExit {
    let mut ctrl_closed = false;
    let mut merged = 0usize;

    loop {
        if SHOULD_TERMINATE.load(Ordering::Relaxed) {
            return SinkExit::Interrupted;
        }

        let ctrl = if ctrl_closed { never() } else { ctrl_rx.clone() };
        select! {
            recv(ctrl) -> msg => match msg {
                Ok(Ctrl::Shutdown { .. }) => return SinkExit::Interrupted,
                Ok(Ctrl::PrintStats) => {
                    let stats = global_tally.snapshot_stats();
                    SafeStderr::new().writeln(&format!("logtally: {}", stats.format_stats()));
                }
                // nobody can send control messages any more
                Err(_) => ctrl_closed = true,
            },
            recv(result_receiver) -> msg => match msg {
                Ok(result) => {
                    trace!(batch_id = result.batch_id, "merging partial");
                    global_tally.merge_partial(result.partial, &result.worker_stats);
                    merged += 1;
                }
                Err(_) => break,
            },
        }
    }

    trace!(partials = merged, "merge sink drained");
    SinkExit::Drained
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ProcessingStats;
    use crate::tally::{Partial, Tally};
    use crossbeam_channel::unbounded;

    fn result(id: u64, keys: &[&str]) -> BatchResult {
        BatchResult {
            batch_id: id,
            partial: Partial::Combined(Tally::from_keys(keys)),
            worker_stats: ProcessingStats {
                emissions: keys.len() as u64,
                partitions: 1,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_drains_out_of_order_results() {
        let (result_tx, result_rx) = unbounded();
        let (_ctrl_tx, ctrl_rx) = unbounded();
        result_tx.send(result(2, &["b"])).unwrap();
        result_tx.send(result(0, &["a", "b"])).unwrap();
        drop(result_tx);

        let global = GlobalTally::new();
        assert_eq!(merge_sink_thread(result_rx, global.clone(), ctrl_rx), SinkExit::Drained);

        let stats = global.snapshot_stats();
        assert_eq!(stats.partitions, 2);
        assert_eq!(stats.emissions, 3);
        assert_eq!(global.take_tally().get("b"), Some(2));
    }

    #[test]
    fn test_shutdown_interrupts() {
        let (_result_tx, result_rx) = unbounded::<BatchResult>();
        let (ctrl_tx, ctrl_rx) = unbounded();
        ctrl_tx.send(Ctrl::Shutdown { immediate: false }).unwrap();

        assert_eq!(
            merge_sink_thread(result_rx, GlobalTally::new(), ctrl_rx),
            SinkExit::Interrupted
        );
    }

    #[test]
    fn test_closed_control_channel_is_ignored() {
        let (result_tx, result_rx) = unbounded();
        let (ctrl_tx, ctrl_rx) = unbounded::<Ctrl>();
        drop(ctrl_tx);
        result_tx.send(result(0, &["x"])).unwrap();
        drop(result_tx);

        assert_eq!(
            merge_sink_thread(result_rx, GlobalTally::new(), ctrl_rx),
            SinkExit::Drained
        );
    }
}

//! Thread-safe merge target for worker partials

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::warn;

use crate::stats::ProcessingStats;
use crate::tally::{Partial, Tally};

/// Final tally under construction, shared between the merge sink and the
/// reader side. Partials may arrive in any order from any thread.
#[derive(Debug, Clone)]
pub struct GlobalTally {
    pub(crate) tally: Arc<Mutex<Tally>>,
    pub(crate) processing_stats: Arc<Mutex<ProcessingStats>>,
    pub(crate) start_time: Instant,
}

impl Default for GlobalTally {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalTally {
    pub fn new() -> Self {
        Self {
            tally: Arc::new(Mutex::new(Tally::new())),
            processing_stats: Arc::new(Mutex::new(ProcessingStats::new())),
            start_time: Instant::now(),
        }
    }

    /// Lock the tally with poison recovery
    fn lock_tally(&self) -> MutexGuard<'_, Tally> {
        match self.tally.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("a thread panicked while merging, recovering tally");
                poisoned.into_inner()
            }
        }
    }

    /// Lock processing stats with poison recovery
    fn lock_stats(&self) -> MutexGuard<'_, ProcessingStats> {
        match self.processing_stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("a thread panicked while merging, recovering processing stats");
                poisoned.into_inner()
            }
        }
    }

    /// Fold one partition's partial and counters into the global state
    pub fn merge_partial(&self, partial: Partial, worker_stats: &ProcessingStats) {
        {
            let mut tally = self.lock_tally();
            partial.merge_into(&mut tally);
        }
        self.lock_stats().merge(worker_stats);
    }

    pub fn set_total_lines_read(&self, total_lines: usize) {
        self.lock_stats().lines_read = total_lines;
    }

    pub fn set_files_processed(&self, files: usize) {
        self.lock_stats().files_processed = files;
    }

    /// Current counters, with key count and elapsed time filled in
    pub fn snapshot_stats(&self) -> ProcessingStats {
        let distinct_keys = self.lock_tally().len();
        let mut stats = self.lock_stats().clone();
        stats.distinct_keys = distinct_keys;
        stats.processing_time = self.start_time.elapsed();
        stats
    }

    /// Take the merged tally out, leaving an empty one behind
    pub fn take_tally(&self) -> Tally {
        std::mem::take(&mut *self.lock_tally())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn worker_stats(emissions: u64) -> ProcessingStats {
        ProcessingStats {
            records_mapped: 1,
            emissions,
            partitions: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_concurrent_merges_are_not_lost() {
        let global = GlobalTally::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let global = global.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let partial = Partial::Combined(Tally::from_keys(["shared", if i % 2 == 0 { "even" } else { "odd" }]));
                        global.merge_partial(partial, &worker_stats(2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = global.snapshot_stats();
        let tally = global.take_tally();
        assert_eq!(tally.get("shared"), Some(800));
        assert_eq!(tally.get("even"), Some(400));
        assert_eq!(tally.get("odd"), Some(400));
        assert_eq!(stats.emissions, tally.total());
        assert_eq!(stats.partitions, 800);
        assert_eq!(stats.distinct_keys, 3);
    }

    #[test]
    fn test_merge_order_is_irrelevant() {
        let partials = || {
            vec![
                Partial::Raw(vec!["a".into(), "b".into()]),
                Partial::Combined(Tally::from_keys(["b", "c"])),
                Partial::Raw(vec![]),
            ]
        };

        let forward = GlobalTally::new();
        for p in partials() {
            forward.merge_partial(p, &ProcessingStats::default());
        }
        let backward = GlobalTally::new();
        for p in partials().into_iter().rev() {
            backward.merge_partial(p, &ProcessingStats::default());
        }
        assert_eq!(forward.take_tally(), backward.take_tally());
    }

    #[test]
    fn test_recovers_from_poisoned_lock() {
        let global = GlobalTally::new();
        global.merge_partial(Partial::Combined(Tally::from_keys(["kept"])), &ProcessingStats::default());

        let poisoner = global.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.tally.lock().unwrap();
            panic!("poison the tally");
        })
        .join();

        global.merge_partial(Partial::Combined(Tally::from_keys(["kept"])), &ProcessingStats::default());
        assert_eq!(global.take_tally().get("kept"), Some(2));
    }

    #[test]
    fn test_reader_counters_are_set_not_merged() {
        let global = GlobalTally::new();
        global.set_total_lines_read(42);
        global.set_files_processed(3);
        global.merge_partial(Partial::empty(true), &ProcessingStats {
            lines_read: 1000,
            ..Default::default()
        });
        let stats = global.snapshot_stats();
        assert_eq!(stats.lines_read, 42);
        assert_eq!(stats.files_processed, 3);
    }
}

use super::{Mapper, SkipReason};
use crate::tally::Count;

/// Lazy `(token, 1)` emissions of a record, left to right.
///
/// Tokens are maximal runs of non-whitespace characters. Repeated, leading
/// and trailing whitespace never yields an empty token, so a blank record
/// emits nothing.
pub fn tokens(record: &str) -> impl Iterator<Item = (&str, Count)> {
    record.split_whitespace().map(|token| (token, 1))
}

/// Word-frequency mapper
pub struct TokenCounter;

impl Mapper for TokenCounter {
    fn name(&self) -> &'static str {
        "wordcount"
    }

    fn map(&mut self, record: &str, emit: &mut dyn FnMut(&str)) -> Result<(), SkipReason> {
        for (token, _) in tokens(record) {
            emit(token);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{map_partition, JobSpec};
    use crate::stats::ProcessingStats;
    use proptest::prelude::*;

    #[test]
    fn test_tokens_in_order_with_count_one() {
        let emitted: Vec<(&str, Count)> = tokens("hello hadoop hello").collect();
        assert_eq!(emitted, vec![("hello", 1), ("hadoop", 1), ("hello", 1)]);
    }

    #[test]
    fn test_repeated_delimiters_yield_no_empty_tokens() {
        let emitted: Vec<&str> = tokens("  a   b\t\tc  ").map(|(t, _)| t).collect();
        assert_eq!(emitted, vec!["a", "b", "c"]);
        assert_eq!(tokens("").count(), 0);
        assert_eq!(tokens(" \t ").count(), 0);
    }

    #[test]
    fn test_word_count_final_result() {
        let mut stats = ProcessingStats::default();
        let mut scope = JobSpec::WordCount.setup().unwrap();
        let tally = map_partition(&mut scope, ["a b", "b c", "a"], 1, true, &mut stats).into_tally();

        let result: Vec<(&str, Count)> = tally.iter().collect();
        assert_eq!(result, vec![("a", 2), ("b", 2), ("c", 1)]);
        assert_eq!(tally.total(), stats.emissions);
    }

    #[test]
    fn test_tokens_are_case_and_punctuation_sensitive() {
        let emitted: Vec<&str> = tokens("Hello hello, hello").map(|(t, _)| t).collect();
        assert_eq!(emitted, vec!["Hello", "hello,", "hello"]);
    }

    proptest! {
        #[test]
        fn prop_emission_count_matches_nonempty_tokens(record in "[a-c \t]{0,40}") {
            let expected = record
                .split(|c: char| c == ' ' || c == '\t')
                .filter(|t| !t.is_empty())
                .count();
            prop_assert_eq!(tokens(&record).count(), expected);
            prop_assert!(tokens(&record).all(|(t, n)| !t.is_empty() && n == 1));
        }

        #[test]
        fn prop_total_equals_emissions(records in prop::collection::vec("[a-c ]{0,12}", 0..20)) {
            let mut stats = ProcessingStats::default();
            let mut scope = JobSpec::WordCount.setup().unwrap();
            let tally = map_partition(
                &mut scope,
                records.iter().map(String::as_str),
                1,
                true,
                &mut stats,
            )
            .into_tally();
            let expected: usize = records.iter().map(|r| tokens(r).count()).sum();
            prop_assert_eq!(tally.total(), expected as Count);
            prop_assert_eq!(stats.emissions, expected as Count);
        }
    }
}

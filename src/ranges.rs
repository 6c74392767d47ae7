//! Contiguous-run text for sorted integer sequences, e.g. `1-3, 7, 9-10`.
//!
//! Input must be sorted ascending and free of duplicates. An adjacent
//! duplicate is "not previous + 1" and closes the run it sits in, so
//! `[1, 2, 2, 3]` becomes `1-2, 2-3`. Callers deduplicate first.

use crate::error::{AnalyzerError, Result};
use std::fmt;

/// A maximal step-1 span of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub start: u32,
    pub end: u32,
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

pub fn runs(values: &[u32]) -> Vec<Run> {
    let mut runs = Vec::new();
    let Some((&first, rest)) = values.split_first() else {
        return runs;
    };

    let mut start = first;
    let mut previous = first;
    for &value in rest {
        if previous.checked_add(1) != Some(value) {
            runs.push(Run { start, end: previous });
            start = value;
        }
        previous = value;
    }
    runs.push(Run { start, end: previous });
    runs
}

pub fn compress(values: &[u32]) -> String {
    runs(values)
        .iter()
        .map(Run::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// First run start and last run end.
pub fn bounds(values: &[u32]) -> Option<(u32, u32)> {
    let runs = runs(values);
    Some((runs.first()?.start, runs.last()?.end))
}

/// Expand run text back into the values it covers.
pub fn expand(text: &str) -> Result<Vec<u32>> {
    let mut values = Vec::new();
    if text.trim().is_empty() {
        return Ok(values);
    }

    for token in text.split(',') {
        let token = token.trim();
        let invalid = || AnalyzerError::InvalidRange {
            token: token.to_string(),
        };

        match token.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start.trim().parse().map_err(|_| invalid())?;
                let end: u32 = end.trim().parse().map_err(|_| invalid())?;
                if end < start {
                    return Err(invalid());
                }
                values.extend(start..=end);
            }
            None => values.push(token.parse().map_err(|_| invalid())?),
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn compress_examples() {
        assert_eq!(compress(&[]), "");
        assert_eq!(compress(&[5]), "5");
        assert_eq!(compress(&[1, 2, 3, 7, 9, 10]), "1-3, 7, 9-10");
    }

    #[test]
    fn duplicates_break_runs() {
        assert_eq!(compress(&[1, 2, 2, 3]), "1-2, 2-3");
    }

    #[test]
    fn run_at_u32_max_does_not_overflow() {
        assert_eq!(compress(&[u32::MAX - 1, u32::MAX]), format!("{}-{}", u32::MAX - 1, u32::MAX));
        assert_eq!(compress(&[0, u32::MAX]), format!("0, {}", u32::MAX));
    }

    #[test]
    fn bounds_span_first_to_last_run() {
        assert_eq!(bounds(&[]), None);
        assert_eq!(bounds(&[4]), Some((4, 4)));
        assert_eq!(bounds(&[2, 3, 8, 12, 13]), Some((2, 13)));
    }

    #[test]
    fn expand_rejects_malformed_tokens() {
        assert!(expand("1-3, x").is_err());
        assert!(expand("5-2").is_err());
        assert!(expand("1,,2").is_err());
        assert_eq!(expand("  ").unwrap(), Vec::<u32>::new());
        assert_eq!(expand("1-3, 7").unwrap(), vec![1, 2, 3, 7]);
    }

    proptest! {
        #[test]
        fn expand_reverses_compress(set in prop::collection::btree_set(0u32..500, 0..60)) {
            let values: Vec<u32> = set.into_iter().collect();
            let text = compress(&values);
            prop_assert_eq!(expand(&text).unwrap(), values);
        }

        #[test]
        fn runs_are_separated_by_gaps(set in prop::collection::btree_set(0u32..200, 1..40)) {
            let values: Vec<u32> = set.into_iter().collect();
            let runs = runs(&values);
            for pair in runs.windows(2) {
                prop_assert!(pair[1].start > pair[0].end + 1);
            }
        }
    }
}

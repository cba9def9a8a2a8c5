//! Delimited field extraction for access-log lines
//!
//! Combined-style access logs quote their free-text fields. With the default
//! [`FieldSpec`] the user agent is the text that follows the 7th double quote:
//!
//! ```text
//! ip - - [ts] "REQUEST" status size "host" "-" query "USER-AGENT" "-" upstream ...
//!             1       2             3    4 5 6       7          8
//! ```

use thiserror::Error;

/// Which delimiter occurrence opens the field to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub delimiter: char,
    /// 1-based occurrence of `delimiter` that immediately precedes the field
    pub occurrence: usize,
}

impl Default for FieldSpec {
    fn default() -> Self {
        Self {
            delimiter: '"',
            occurrence: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("expected at least {wanted} '{delimiter}' delimiters, found {found}")]
    TooFewDelimiters {
        delimiter: char,
        found: usize,
        wanted: usize,
    },
}

/// Return the field opened by the `spec.occurrence`-th delimiter.
///
/// The field starts at the character right after that delimiter and runs up
/// to the next delimiter, or to the end of the line when the field is not
/// closed. Lines with fewer delimiters are an error, never a wrapped or
/// shifted position.
pub fn extract_field<'a>(line: &'a str, spec: &FieldSpec) -> Result<&'a str, ExtractError> {
    let mut found = 0;
    let mut positions = line.match_indices(spec.delimiter);

    let start = loop {
        match positions.next() {
            Some((pos, _)) => {
                found += 1;
                if found == spec.occurrence {
                    break pos + spec.delimiter.len_utf8();
                }
            }
            None => {
                return Err(ExtractError::TooFewDelimiters {
                    delimiter: spec.delimiter,
                    found,
                    wanted: spec.occurrence,
                })
            }
        }
    };

    let end = positions.next().map_or(line.len(), |(pos, _)| pos);
    Ok(&line[start..end])
}

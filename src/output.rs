//! Writing the final tally
//!
//! With an output directory the result goes to `DIR/part-r-00000`, followed by
//! an empty `DIR/_SUCCESS` marker once the part file is complete. A directory
//! without the marker is the leftover of a failed run.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::platform::{SafeFileOut, SafeStdout};
use crate::tally::Count;

pub const PART_FILE: &str = "part-r-00000";
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Output format enumeration
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `key<TAB>count` per line
    #[default]
    Tsv,
    /// One `{"key":..,"count":..}` object per line
    Json,
}

#[derive(Serialize)]
struct CountRecord<'a> {
    key: &'a str,
    count: Count,
}

/// Remove whatever exists at the output path before a run.
///
/// Returns whether something was deleted. The removal is checked afterwards;
/// a path that is still present is a fatal error.
pub fn prepare_destination(path: &Path) -> Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to inspect output path '{}'", path.display()))
        }
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
    .with_context(|| format!("Failed to delete existing output path '{}'", path.display()))?;

    if fs::symlink_metadata(path).is_ok() {
        bail!(
            "Output path '{}' still exists after deleting it",
            path.display()
        );
    }

    warn!("output path {} existed and has been deleted", path.display());
    Ok(true)
}

/// Write `entries` in the given format, one per line
pub fn write_entries<W: Write>(
    writer: &mut W,
    entries: &[(String, Count)],
    format: OutputFormat,
) -> Result<()> {
    for (key, count) in entries {
        match format {
            OutputFormat::Tsv => writeln!(writer, "{}\t{}", key, count)?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut *writer, &CountRecord { key, count: *count })?;
                writeln!(writer)?;
            }
        }
    }
    Ok(())
}

/// Write the part file and then the success marker into `dir`
pub fn write_to_directory(
    dir: &Path,
    entries: &[(String, Count)],
    format: OutputFormat,
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory '{}'", dir.display()))?;

    let part = SafeFileOut::new(dir.join(PART_FILE))?;
    let part_path = part.path().to_path_buf();
    let mut writer = BufWriter::new(part);
    write_entries(&mut writer, entries, format)
        .with_context(|| format!("Failed to write '{}'", part_path.display()))?;
    let part = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush output")?;
    part.finish()?;

    let marker = SafeFileOut::new(dir.join(SUCCESS_MARKER))?;
    marker.finish()?;

    debug!(dir = %dir.display(), keys = entries.len(), "output written");
    Ok(())
}

pub fn write_to_stdout(entries: &[(String, Count)], format: OutputFormat) -> Result<()> {
    let mut stdout = BufWriter::new(SafeStdout::new());
    write_entries(&mut stdout, entries, format)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries() -> Vec<(String, Count)> {
        vec![("Chrome".to_string(), 3), ("Unknown".to_string(), 1)]
    }

    #[test]
    fn test_tsv_lines() {
        let mut out = Vec::new();
        write_entries(&mut out, &entries(), OutputFormat::Tsv).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Chrome\t3\nUnknown\t1\n");
    }

    #[test]
    fn test_json_lines() {
        let mut out = Vec::new();
        write_entries(&mut out, &entries(), OutputFormat::Json).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r#"{"key":"Chrome","count":3}"#);
        assert_eq!(lines[1], r#"{"key":"Unknown","count":1}"#);
    }

    #[test]
    fn test_json_escapes_keys() {
        let mut out = Vec::new();
        write_entries(&mut out, &[("say \"hi\"".to_string(), 1)], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["key"], "say \"hi\"");
    }

    #[test]
    fn test_missing_destination_is_left_alone() {
        let dir = TempDir::new().unwrap();
        assert!(!prepare_destination(&dir.path().join("out")).unwrap());
    }

    #[test]
    fn test_existing_directory_is_deleted() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(out.join("nested")).unwrap();
        fs::write(out.join("nested").join("old"), "stale").unwrap();

        assert!(prepare_destination(&out).unwrap());
        assert!(!out.exists());
    }

    #[test]
    fn test_existing_file_is_deleted() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        fs::write(&out, "not a directory").unwrap();

        assert!(prepare_destination(&out).unwrap());
        assert!(!out.exists());
    }

    #[test]
    fn test_directory_layout() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("result");
        write_to_directory(&out, &entries(), OutputFormat::Tsv).unwrap();

        assert_eq!(
            fs::read_to_string(out.join(PART_FILE)).unwrap(),
            "Chrome\t3\nUnknown\t1\n"
        );
        assert_eq!(fs::read(out.join(SUCCESS_MARKER)).unwrap().len(), 0);
    }

    #[test]
    fn test_empty_result_still_gets_marker() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("result");
        write_to_directory(&out, &[], OutputFormat::Json).unwrap();
        assert_eq!(fs::read(out.join(PART_FILE)).unwrap().len(), 0);
        assert!(out.join(SUCCESS_MARKER).is_file());
    }
}

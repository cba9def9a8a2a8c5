use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::decompression::{maybe_decompress, open_path};

/// Read buffer per input, sized for throughput on large logs
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// One input of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Stdin => write!(f, "stdin"),
            InputSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl InputSource {
    fn open(&self) -> Result<Box<dyn BufRead + Send>> {
        let reader = match self {
            InputSource::Stdin => maybe_decompress(io::stdin()).context("Failed to read stdin")?,
            InputSource::File(path) => open_path(path)
                .with_context(|| format!("Failed to open input file '{}'", path.display()))?,
        };
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, reader)))
    }
}

/// Resolve a user-supplied path against the optional `--root` directory
pub fn resolve_path(path: &str, root: Option<&Path>) -> PathBuf {
    let path = Path::new(path);
    match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}

/// Where a path actually points on disk, for comparing two spellings of the
/// same location.
///
/// The deepest existing ancestor is canonicalized (symlinks, `.` and `..`
/// resolved) and the not-yet-existing remainder is appended lexically.
pub fn physical_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    let base = loop {
        match existing.canonicalize() {
            Ok(base) => break base,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let Some(parent) = existing.parent() else {
                    return Ok(lexical_normalize(&absolute));
                };
                // a trailing `..` has no file name; keep it for the lexical pass
                missing.push(existing.file_name().unwrap_or(OsStr::new("..")).to_owned());
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    };

    let mut resolved = base;
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }
    Ok(lexical_normalize(&resolved))
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Map command-line input arguments to sources. No arguments means stdin.
pub fn resolve_inputs(files: &[String], root: Option<&Path>) -> Vec<InputSource> {
    if files.is_empty() {
        return vec![InputSource::Stdin];
    }
    files
        .iter()
        .map(|f| {
            if f == "-" {
                InputSource::Stdin
            } else {
                InputSource::File(resolve_path(f, root))
            }
        })
        .collect()
}

/// Open and close every file input up front, so that an unreadable input
/// fails the run before anything is deleted or written
pub fn preflight(sources: &[InputSource]) -> Result<()> {
    for source in sources {
        if let InputSource::File(path) = source {
            if path.is_dir() {
                anyhow::bail!("Input '{}' is a directory", path.display());
            }
            drop(source.open()?);
            debug!(input = %source, "input is readable");
        }
    }
    Ok(())
}

/// Read one record: bytes up to `\n`, with the line ending stripped and
/// invalid UTF-8 replaced. `None` at end of input.
pub fn read_record<R: BufRead + ?Sized>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// A record reader that can tell which input it is reading
pub trait RecordRead: Send {
    fn read_record(&mut self, buf: &mut Vec<u8>) -> io::Result<Option<String>>;
    fn current_source(&self) -> Option<&InputSource>;
    /// Number of file inputs opened so far (stdin excluded)
    fn files_opened(&self) -> usize;
}

/// Streams the records of several inputs, in order
pub struct MultiFileReader {
    sources: Vec<InputSource>,
    current_idx: usize,
    current_reader: Option<Box<dyn BufRead + Send>>,
    files_opened: usize,
}

impl MultiFileReader {
    pub fn new(sources: Vec<InputSource>) -> Self {
        Self {
            sources,
            current_idx: 0,
            current_reader: None,
            files_opened: 0,
        }
    }

    fn ensure_current_reader(&mut self) -> io::Result<bool> {
        if self.current_reader.is_none() {
            let Some(source) = self.sources.get(self.current_idx) else {
                return Ok(false);
            };
            let reader = source
                .open()
                .map_err(|e| io::Error::other(format!("{:#}", e)))?;
            if matches!(source, InputSource::File(_)) {
                self.files_opened += 1;
            }
            debug!(input = %source, "reading input");
            self.current_reader = Some(reader);
        }
        Ok(true)
    }
}

impl RecordRead for MultiFileReader {
    fn read_record(&mut self, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
        while self.ensure_current_reader()? {
            if let Some(reader) = self.current_reader.as_mut() {
                if let Some(record) = read_record(reader.as_mut(), buf)? {
                    return Ok(Some(record));
                }
            }
            self.current_reader = None;
            self.current_idx += 1;
        }
        Ok(None)
    }

    fn current_source(&self) -> Option<&InputSource> {
        self.sources.get(self.current_idx)
    }

    fn files_opened(&self) -> usize {
        self.files_opened
    }
}

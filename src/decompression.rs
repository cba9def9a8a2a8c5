use anyhow::{anyhow, Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::trace;

/// Stream compression detected from the first bytes of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    /// magic 1F 8B 08
    Gzip,
    /// magic 28 B5 2F FD
    Zstd,
}

impl Compression {
    pub fn detect(head: &[u8]) -> Self {
        match head {
            [0x1F, 0x8B, 0x08, ..] => Compression::Gzip,
            [0x28, 0xB5, 0x2F, 0xFD, ..] => Compression::Zstd,
            _ => Compression::Plain,
        }
    }
}

/// Fill `head` as far as the reader allows; short reads are retried so a
/// pipe that delivers one byte at a time is still detected correctly
fn read_head<R: Read>(reader: &mut R, head: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < head.len() {
        match reader.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Wrap `reader` in a gzip or zstd decoder when its magic bytes ask for one
pub fn maybe_decompress<R: Read + Send + 'static>(
    mut reader: R,
) -> std::io::Result<Box<dyn Read + Send>> {
    let mut head = [0u8; 4];
    let n = read_head(&mut reader, &mut head)?;

    // put the sniffed bytes back in front
    let chained = Cursor::new(head[..n].to_vec()).chain(reader);

    let compression = Compression::detect(&head[..n]);
    trace!(?compression, "input stream opened");
    match compression {
        Compression::Gzip => Ok(Box::new(MultiGzDecoder::new(chained))),
        Compression::Zstd => Ok(Box::new(zstd::Decoder::new(chained)?)),
        Compression::Plain => Ok(Box::new(chained)),
    }
}

/// Open a file for streaming, transparently decompressing gzip and zstd
pub fn open_path(path: &Path) -> Result<Box<dyn Read + Send>> {
    let is_zip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        return Err(anyhow!(
            "ZIP archives are not supported, only gzip and zstd streams are. Extract it first: unzip {}",
            path.display()
        ));
    }

    let file = File::open(path)?;
    maybe_decompress(file)
        .with_context(|| format!("Failed to detect compression format of {}", path.display()))
}

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::source::{ByteSource, ReadOutcome};

/// Default number of bytes handed out per read.
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Reads a captured byte stream back in fixed-size pieces.
///
/// Small chunks reproduce the fragmentation a live port produces, so the
/// same capture exercises frames split across reads.
#[derive(Debug)]
pub struct ReplaySource<R = BufReader<File>> {
    reader: R,
    chunk_size: usize,
    name: String,
    exhausted: bool,
}

impl ReplaySource {
    /// Open a capture file.
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TransportError::Replay {
            path: PathBuf::from(path),
            source,
        })?;
        debug!(path = %path.display(), chunk_size, "replay source opened");
        Ok(Self::from_reader(
            BufReader::new(file),
            chunk_size,
            path.display().to_string(),
        ))
    }
}

impl<R: Read> ReplaySource<R> {
    /// Replay from any reader. A `chunk_size` of zero is treated as one.
    pub fn from_reader(reader: R, chunk_size: usize, name: impl Into<String>) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            name: name.into(),
            exhausted: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl<R: Read> ByteSource for ReplaySource<R> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        if self.exhausted {
            return Ok(ReadOutcome::Closed);
        }

        let limit = buf.len().min(self.chunk_size);
        let mut filled = 0;
        while filled < limit {
            match self.reader.read(&mut buf[filled..limit]) {
                Ok(0) => {
                    self.exhausted = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            debug!(source = %self.name, "replay finished");
            Ok(ReadOutcome::Closed)
        } else {
            Ok(ReadOutcome::Data(filled))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<S: ByteSource>(source: &mut S) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            match source.read_available(&mut buf).unwrap() {
                ReadOutcome::Data(n) => chunks.push(buf[..n].to_vec()),
                ReadOutcome::Idle => continue,
                ReadOutcome::Closed => return chunks,
            }
        }
    }

    #[test]
    fn yields_fixed_size_chunks() {
        let mut source = ReplaySource::from_reader(&b"abcdefghij"[..], 4, "mem");
        assert_eq!(
            drain(&mut source),
            vec![b"abcd".to_vec(), b"efgh".to_vec(), b"ij".to_vec()]
        );
        assert_eq!(
            source.read_available(&mut [0u8; 8]).unwrap(),
            ReadOutcome::Closed
        );
    }

    #[test]
    fn zero_chunk_size_reads_bytewise() {
        let mut source = ReplaySource::from_reader(&b"xyz"[..], 0, "mem");
        assert_eq!(source.chunk_size(), 1);
        assert_eq!(drain(&mut source).len(), 3);
    }

    #[test]
    fn opens_capture_file() {
        let dir = std::env::temp_dir().join(format!("zephyr-replay-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.bin");
        std::fs::write(&path, b"<IMR/><CRC>1</CRC>\n").unwrap();

        let mut source = ReplaySource::open(&path, 7).unwrap();
        assert_eq!(source.name(), path.display().to_string());
        let joined: Vec<u8> = drain(&mut source).concat();
        assert_eq!(joined, b"<IMR/><CRC>1</CRC>\n");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = ReplaySource::open("/nonexistent/zephyr/capture.bin", 8).unwrap_err();
        assert!(matches!(err, TransportError::Replay { .. }));
        assert!(err.is_not_found());
    }
}

//! Line sources for the ingestion worker
//!
//! [`LineSource`] abstracts over where sample lines come from, so the worker
//! runs the same way on a serial device, a file, stdin or the mock generator.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Trait for anything that yields text lines
pub trait LineSource: Send {
    /// Read the next line without its terminator; `Ok(None)` at end of stream
    fn next_line(&mut self) -> io::Result<Option<String>>;

    /// Human-readable description for logs
    fn name(&self) -> &str;
}

/// Line source over any buffered reader
pub struct ReaderSource<R> {
    reader: R,
    name: String,
    buf: Vec<u8>,
}

impl<R: BufRead + Send> ReaderSource<R> {
    /// Wrap a reader
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            buf: Vec::new(),
        }
    }
}

impl ReaderSource<BufReader<File>> {
    /// Open a file or character device (e.g. `/dev/ttyACM0`)
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl ReaderSource<BufReader<io::Stdin>> {
    /// Read lines from standard input
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()), "stdin")
    }
}

impl<R: BufRead + Send> LineSource for ReaderSource<R> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        // Invalid bytes become U+FFFD, which the decoder rejects as malformed
        let line = String::from_utf8_lossy(&self.buf);
        if let Cow::Owned(_) = line {
            tracing::debug!("Invalid UTF-8 on {}", self.name);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reader_source_lines() {
        let mut source = ReaderSource::new(Cursor::new("a b\r\nc\n\nlast"), "mem");
        assert_eq!(source.next_line().unwrap().as_deref(), Some("a b"));
        assert_eq!(source.next_line().unwrap().as_deref(), Some("c"));
        assert_eq!(source.next_line().unwrap().as_deref(), Some(""));
        assert_eq!(source.next_line().unwrap().as_deref(), Some("last"));
        assert_eq!(source.next_line().unwrap(), None);
        assert_eq!(source.name(), "mem");
    }

    #[test]
    fn test_invalid_utf8_line_is_not_an_error() {
        let mut bytes = b"1 0 0 0 1\n".to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE, b'\n']);
        bytes.extend_from_slice(b"1 1000 0 0 1\n");
        let mut source = ReaderSource::new(Cursor::new(bytes), "serial");

        assert_eq!(source.next_line().unwrap().as_deref(), Some("1 0 0 0 1"));
        assert_eq!(source.next_line().unwrap().as_deref(), Some("\u{FFFD}\u{FFFD}"));
        assert_eq!(source.next_line().unwrap().as_deref(), Some("1 1000 0 0 1"));
        assert_eq!(source.next_line().unwrap(), None);
    }

    #[test]
    fn test_open_missing_file() {
        assert!(ReaderSource::open(Path::new("/nonexistent/modal-rs/input")).is_err());
    }
}

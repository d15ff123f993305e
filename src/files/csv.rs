//! Minimal CSV helpers
//!
//! Enough RFC 4180 for the files this crate reads and writes: comma
//! separated, optional double quotes, `""` as an escaped quote.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ModalError, Result};

/// Split one CSV line into unquoted, trimmed fields
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Quote a field if it contains a delimiter, quote or newline
pub fn quote(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Column lookup by header name
#[derive(Debug, Clone)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    /// Parse a header line
    pub fn parse(line: &str) -> Self {
        Self {
            columns: split_line(line.trim_start_matches('\u{feff}')),
        }
    }

    /// Index of a column, if present
    pub fn find(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a required column
    pub fn require(&self, name: &str, path: &Path) -> Result<usize> {
        self.find(name).ok_or_else(|| ModalError::MissingColumn {
            column: name.to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the header has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Text lines of a CSV reader
///
/// Lines that are not valid UTF-8 are dropped with a warning; only read
/// failures are returned as errors.
pub fn text_lines<'a, R>(reader: R, path: &'a Path) -> impl Iterator<Item = io::Result<String>> + 'a
where
    R: BufRead + 'a,
{
    reader
        .split(b'\n')
        .enumerate()
        .filter_map(move |(idx, bytes)| {
            let mut bytes = match bytes {
                Ok(bytes) => bytes,
                Err(e) => return Some(Err(e)),
            };
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            match String::from_utf8(bytes) {
                Ok(line) => Some(Ok(line)),
                Err(_) => {
                    tracing::warn!("{:?}: dropping line {}, not valid UTF-8", path, idx + 1);
                    None
                }
            }
        })
}

/// Write a file through a temporary sibling and rename it into place
///
/// A failed write leaves no partial file at `path`.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let export_err = |source| ModalError::ExportIo {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(export_err)?;
        }
    }

    let tmp = temp_sibling(path);
    let result = File::create(&tmp).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    });

    match result.and_then(|()| std::fs::rename(&tmp, path)) {
        Ok(()) => {
            tracing::debug!("Wrote {:?}", path);
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            Err(export_err(e))
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

//! Stream sink abstraction for log records

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sitekit_core::Result;

/// Narrow capability interface the rotation controller writes through
pub trait LogSink {
    fn write(&mut self, record: &str) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Append-mode file sink
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Open (or create) the file in append mode, creating parent directories
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    /// Write a record, appending a newline when the record has none, and
    /// flush so siblings observe complete lines
    fn write(&mut self, record: &str) -> Result<()> {
        self.writer.write_all(record.as_bytes())?;
        if !record.ends_with('\n') {
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/logs/app.log");

        let sink = FileSink::open(path.clone());
        assert!(sink.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_write_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");

        let mut sink = FileSink::open(path.clone()).unwrap();
        sink.write("first").unwrap();
        sink.write("second\n").unwrap();
        sink.close().unwrap();
        drop(sink);

        // Reopening appends rather than truncating
        let mut sink = FileSink::open(path.clone()).unwrap();
        sink.write("third").unwrap();
        sink.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\nthird\n");
    }
}

//! Rotation controller: drives the sink, scans for stale siblings, prunes

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

use sitekit_core::Result;

use crate::bucket::DateBucket;
use crate::policy::RotationPolicy;
use crate::retention::Retention;
use crate::sink::{FileSink, LogSink};

/// Log handler that writes to a date-bucketed file and prunes siblings older
/// than the retention horizon.
///
/// The sink opens lazily on the first write and reopens after `close`. Every
/// write re-scans the directory for stale siblings; cleanup is best-effort so
/// several processes can share a log directory without coordination.
pub struct RotatingFileHandler {
    policy: RotationPolicy,
    sink: Option<FileSink>,
    /// None until the first write; seeded from whether the target file
    /// already exists so a brand-new file triggers a cleanup pass
    must_rotate: Option<bool>,
    stale: Vec<String>,
}

impl RotatingFileHandler {
    /// Create a handler for the given log path, e.g. `logs/app.log`.
    /// Files rotate daily as `logs/app-YYYY-MM-DD.log` by default.
    pub fn new(path: impl AsRef<Path>, retention: &Retention) -> Self {
        Self {
            policy: RotationPolicy::new(path, retention),
            sink: None,
            must_rotate: None,
            stale: Vec::new(),
        }
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Write one record to the current bucket's file.
    ///
    /// Rotation runs first when stale siblings exist: the stream is closed,
    /// stale files are deleted, and the sink reopens at the resolved path.
    pub fn write(&mut self, record: &str) -> Result<()> {
        let target = self.policy.timed_filename();

        // On the first record written, a missing target means the file is new
        if self.must_rotate.is_none() {
            self.must_rotate = Some(!target.exists());
        }

        self.stale = self.policy.stale_files();
        if !self.stale.is_empty() {
            self.must_rotate = Some(true);
            self.close()?;
        }

        // A date boundary moves the target; re-point the stream
        if self.sink.as_ref().is_some_and(|s| s.path() != target) {
            self.close()?;
        }

        if self.sink.is_none() {
            self.sink = Some(FileSink::open(target)?);
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.write(record)?;
        }
        Ok(())
    }

    /// Flush and release the file handle. A pending rotation is performed as
    /// part of closing, so no stale file outlives a close call. The next
    /// write reopens lazily.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut sink) = self.sink.take() {
            sink.close()?;
        }
        if self.must_rotate == Some(true) {
            self.rotate();
        }
        Ok(())
    }

    /// Replace the filename template and date format, e.g.
    /// `("error-{date}", "Y-m")`.
    ///
    /// Both are validated before any file handle is touched; on failure the
    /// handler keeps its previous configuration. On success the handler is
    /// closed and reopens at the recomputed path on the next write.
    pub fn set_filename_format(
        &mut self,
        template: &str,
        date_format: &str,
    ) -> Result<&mut Self> {
        let bucket: DateBucket = date_format.parse()?;
        self.policy.set_format(template, bucket)?;
        self.close()?;
        Ok(self)
    }

    /// Delete the stale files found by the last scan, best-effort per file.
    ///
    /// Read-only files are skipped, and unlink failures are swallowed - a
    /// sibling process rotating the same directory may have won the race.
    fn rotate(&mut self) {
        for name in self.stale.drain(..) {
            let path = self.policy.directory().join(&name);

            match fs::metadata(&path) {
                Ok(meta) if meta.permissions().readonly() => {
                    debug!("Skipping read-only log file: {}", path.display());
                    continue;
                }
                Err(_) => continue,
                Ok(_) => {}
            }

            match fs::remove_file(&path) {
                Ok(()) => debug!("Pruned stale log file: {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    debug!("Skipping non-writable log file {}: {}", path.display(), e);
                }
                Err(e) => warn!("Failed to remove stale log file {}: {}", path.display(), e),
            }
        }

        self.must_rotate = Some(false);
    }
}

impl LogSink for RotatingFileHandler {
    fn write(&mut self, record: &str) -> Result<()> {
        RotatingFileHandler::write(self, record)
    }

    fn close(&mut self) -> Result<()> {
        RotatingFileHandler::close(self)
    }
}

impl Drop for RotatingFileHandler {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, Local, NaiveDate};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn handler_in(dir: &TempDir, horizon: &str) -> RotatingFileHandler {
        RotatingFileHandler::new(dir.path().join("app.log"), &horizon.parse().unwrap())
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    fn days_ago(n: u64) -> NaiveDate {
        today().checked_sub_days(Days::new(n)).unwrap()
    }

    fn dated_file(dir: &TempDir, date: NaiveDate) -> PathBuf {
        let name = format!("app-{}.log", DateBucket::default().format(date));
        let path = dir.path().join(name);
        fs::write(&path, b"old\n").unwrap();
        path
    }

    fn listing(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_creates_timed_file() {
        let dir = TempDir::new().unwrap();
        let mut handler = handler_in(&dir, "1 day");

        handler.write("hello").unwrap();

        let expected = dir
            .path()
            .join(format!("app-{}.log", DateBucket::default().format(today())));
        assert!(expected.exists());
        assert_eq!(fs::read_to_string(expected).unwrap(), "hello\n");
    }

    #[test]
    fn test_end_to_end_rotation() {
        let dir = TempDir::new().unwrap();
        dated_file(&dir, days_ago(1));
        dated_file(&dir, days_ago(2));

        let mut handler = handler_in(&dir, "1 day");
        handler.write("fresh").unwrap();

        let current = format!("app-{}.log", DateBucket::default().format(today()));
        assert_eq!(listing(&dir), vec![current.clone()]);
        assert_eq!(
            fs::read_to_string(dir.path().join(current)).unwrap(),
            "fresh\n"
        );
    }

    #[test]
    fn test_files_inside_horizon_survive() {
        let dir = TempDir::new().unwrap();
        let stale = dated_file(&dir, days_ago(40));
        let recent = dated_file(&dir, days_ago(10));

        let mut handler = handler_in(&dir, "20 days");
        handler.write("hello").unwrap();

        assert!(!stale.exists());
        assert!(recent.exists());
    }

    #[test]
    fn test_foreign_files_survive() {
        let dir = TempDir::new().unwrap();
        let foreign = dir.path().join("app-2020-notes.log");
        fs::write(&foreign, b"keep me\n").unwrap();
        dated_file(&dir, days_ago(30));

        let mut handler = handler_in(&dir, "1 day");
        handler.write("hello").unwrap();

        assert!(foreign.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_readonly_stale_file_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let protected = dated_file(&dir, days_ago(30));
        let unprotected = dated_file(&dir, days_ago(40));
        fs::set_permissions(&protected, fs::Permissions::from_mode(0o444)).unwrap();

        let mut handler = handler_in(&dir, "1 day");
        handler.write("hello").unwrap();

        assert!(protected.exists());
        assert!(fs::metadata(&protected).unwrap().permissions().readonly());
        assert!(!unprotected.exists());

        fs::set_permissions(&protected, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[test]
    fn test_vanished_stale_file_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let mut handler = handler_in(&dir, "1 day");

        // Simulate a sibling process deleting the file between scan and unlink
        handler.stale = vec!["app-1999-01-01.log".to_string()];
        handler.must_rotate = Some(true);
        assert!(handler.close().is_ok());
    }

    #[test]
    fn test_two_handlers_share_a_directory() {
        let dir = TempDir::new().unwrap();
        dated_file(&dir, days_ago(30));

        let mut first = handler_in(&dir, "1 day");
        let mut second = handler_in(&dir, "1 day");
        first.write("from first").unwrap();
        second.write("from second").unwrap();

        let current = format!("app-{}.log", DateBucket::default().format(today()));
        assert_eq!(listing(&dir), vec![current]);
    }

    #[test]
    fn test_close_performs_pending_rotation() {
        let dir = TempDir::new().unwrap();
        let stale = dated_file(&dir, days_ago(30));

        let mut handler = handler_in(&dir, "1 day");
        handler.write("hello").unwrap();
        handler.close().unwrap();

        assert!(!stale.exists());
        // Writing after close reopens lazily
        handler.write("again").unwrap();
        let current = dir
            .path()
            .join(format!("app-{}.log", DateBucket::default().format(today())));
        assert_eq!(fs::read_to_string(current).unwrap(), "hello\nagain\n");
    }

    #[test]
    fn test_reconfigure_changes_layout() {
        let dir = TempDir::new().unwrap();
        let mut handler = handler_in(&dir, "1 day");
        handler.write("daily").unwrap();

        handler.set_filename_format("monthly-{date}", "Y-m").unwrap();
        handler.write("monthly").unwrap();

        let monthly = dir.path().join(format!(
            "monthly-{}.log",
            DateBucket::Monthly { sep: Some('-') }.format(today())
        ));
        assert_eq!(fs::read_to_string(monthly).unwrap(), "monthly\n");
    }

    #[test]
    fn test_invalid_reconfiguration_fails_fast() {
        let dir = TempDir::new().unwrap();
        let mut handler = handler_in(&dir, "1 day");
        handler.write("before").unwrap();

        assert!(handler.set_filename_format("plain", "Y-m-d").is_err());
        assert!(handler.set_filename_format("app-{date}", "Y-m-d-h").is_err());

        // Configuration and open stream are untouched after a failed call
        assert_eq!(handler.policy().template(), "app-{date}");
        handler.write("after").unwrap();
        let current = dir
            .path()
            .join(format!("app-{}.log", DateBucket::default().format(today())));
        assert_eq!(fs::read_to_string(current).unwrap(), "before\nafter\n");
    }
}

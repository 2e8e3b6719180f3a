//! Rotation policy: timed filename resolution and stale sibling scanning

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use glob::Pattern;

use sitekit_core::{Error, Result, DATE_GLOB, DATE_PLACEHOLDER};

use crate::bucket::DateBucket;
use crate::retention::Retention;

/// Where timed log files live and when their siblings go stale.
///
/// Constructed once per handler from the configured log path; the retention
/// cutoff is computed at construction and never per write.
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    directory: PathBuf,
    stem: String,
    extension: Option<String>,
    template: String,
    bucket: DateBucket,
    cutoff: NaiveDateTime,
}

impl RotationPolicy {
    /// Build a policy from the configured log path, e.g. `logs/app.log`.
    ///
    /// The default filename template is `<stem>-{date}` with daily buckets,
    /// so `logs/app.log` rotates as `logs/app-2023-01-03.log`.
    pub fn new(path: impl AsRef<Path>, retention: &Retention) -> Self {
        let path = path.as_ref();
        let directory = match path.parent() {
            Some(parent) if parent != Path::new("") => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string);
        let template = if stem.is_empty() {
            DATE_PLACEHOLDER.to_string()
        } else {
            format!("{stem}-{DATE_PLACEHOLDER}")
        };

        Self {
            directory,
            stem,
            extension,
            template,
            bucket: DateBucket::default(),
            cutoff: retention.cutoff_from(Local::now().naive_local()),
        }
    }

    /// Replace the filename template and bucket granularity.
    ///
    /// Fails without mutating the policy when the template does not contain
    /// exactly one date placeholder.
    pub fn set_format(&mut self, template: &str, bucket: DateBucket) -> Result<()> {
        validate_template(template)?;
        self.template = template.to_string();
        self.bucket = bucket;
        Ok(())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn bucket(&self) -> DateBucket {
        self.bucket
    }

    pub fn cutoff(&self) -> NaiveDateTime {
        self.cutoff
    }

    /// Resolve the concrete log file path for a given date. Pure - no
    /// filesystem access, identical output for identical input.
    pub fn timed_filename_at(&self, date: NaiveDate) -> PathBuf {
        let name = self
            .template
            .replace(DATE_PLACEHOLDER, &self.bucket.format(date));
        self.directory.join(self.with_extension(name))
    }

    /// Resolve the log file path for today
    pub fn timed_filename(&self) -> PathBuf {
        self.timed_filename_at(Local::now().date_naive())
    }

    /// Search pattern for sibling files: the placeholder is replaced with a
    /// digit-prefixed wildcard
    pub fn glob_pattern(&self) -> String {
        let name = self.with_extension(self.template.replace(DATE_PLACEHOLDER, DATE_GLOB));
        format!("{}{}{}", self.directory.display(), MAIN_SEPARATOR, name)
    }

    /// List sibling files whose bucket date precedes the retention cutoff.
    ///
    /// The directory is listed fresh on every call. Files matching the
    /// wildcard whose stem does not parse as a date under the bucket format
    /// are foreign and silently excluded - neither stale nor current.
    /// Returns basenames, not full paths.
    pub fn stale_files(&self) -> Vec<String> {
        let (prefix, suffix) = self.split_template();
        let head = format!("{}{}{}", self.directory.display(), MAIN_SEPARATOR, prefix);
        let tail = self.with_extension(suffix.to_string());
        let pattern = format!(
            "{}{}{}",
            Pattern::escape(&head),
            DATE_GLOB,
            Pattern::escape(&tail)
        );

        let mut stale = Vec::new();
        let Ok(entries) = glob::glob(&pattern) else {
            return stale;
        };
        for path in entries.flatten() {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let stem = match &self.extension {
                Some(ext) => match name.strip_suffix(&format!(".{ext}")) {
                    Some(stem) => stem,
                    None => continue,
                },
                None => name,
            };
            let Some(date_part) = stem
                .strip_prefix(prefix)
                .and_then(|s| s.strip_suffix(suffix))
            else {
                continue;
            };
            let Some(date) = self.bucket.parse(date_part) else {
                continue;
            };
            if date.and_time(NaiveTime::MIN) < self.cutoff {
                stale.push(name.to_string());
            }
        }
        stale
    }

    fn with_extension(&self, name: String) -> String {
        match &self.extension {
            Some(ext) => format!("{name}.{ext}"),
            None => name,
        }
    }

    fn split_template(&self) -> (&str, &str) {
        // A validated template always holds exactly one placeholder
        self.template
            .split_once(DATE_PLACEHOLDER)
            .unwrap_or((self.template.as_str(), ""))
    }
}

fn validate_template(template: &str) -> Result<()> {
    match template.matches(DATE_PLACEHOLDER).count() {
        1 => Ok(()),
        0 => Err(Error::InvalidFilenameFormat(format!(
            "\"{template}\" must contain the {DATE_PLACEHOLDER} placeholder, \
             otherwise rotating is impossible"
        ))),
        n => Err(Error::InvalidFilenameFormat(format!(
            "\"{template}\" contains {n} {DATE_PLACEHOLDER} placeholders, expected exactly one"
        ))),
    }
}

//! Constants and default values for Sitekit

/// Placeholder token substituted with the formatted bucket date
pub const DATE_PLACEHOLDER: &str = "{date}";

/// Date format for one log file per day
pub const FILE_PER_DAY: &str = "Y-m-d";

/// Date format for one log file per month
pub const FILE_PER_MONTH: &str = "Y-m";

/// Date format for one log file per year
pub const FILE_PER_YEAR: &str = "Y";

/// Default retention horizon for rotated log files
pub const DEFAULT_RETENTION: &str = "-1 day -1 week";

/// Glob fragment matching the date portion of a rotated file name
pub const DATE_GLOB: &str = "[0-9][0-9][0-9][0-9]*";

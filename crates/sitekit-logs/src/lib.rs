//! Sitekit Logs - Time-bucketed log rotation with retention pruning
//!
//! Log files are split into date-bucketed siblings
//! (`<stem>-<bucket-date>.<ext>`) and siblings older than a retention
//! horizon are pruned on write.

mod bucket;
mod handler;
mod policy;
mod retention;
mod sink;

pub use bucket::DateBucket;
pub use handler::RotatingFileHandler;
pub use policy::RotationPolicy;
pub use retention::Retention;
pub use sink::{FileSink, LogSink};

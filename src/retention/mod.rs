//! Retention: periodic purge of records past the configured horizon,
//! with an audit channel for every deletion.

mod audit;
mod sweeper;

pub use audit::{LogAudit, MemoryAudit, SweepAudit, SweepNotice};
pub use sweeper::{RetentionSweeper, SweepReport};

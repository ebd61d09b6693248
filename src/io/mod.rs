//! On-disk formats.

pub mod journal;

pub use journal::{Journal, JournalOp, JournalStats};

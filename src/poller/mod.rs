mod manager;
mod worker;

pub use manager::{diff_groups, DiffSummary, GroupDiff, Manager};
pub use worker::WorkerContext;

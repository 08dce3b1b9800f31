//! Job orchestration.
//!
//! [`JobController`] runs one job as a single sequential future:
//! fetch, extract, dedup, score, persist, page after page.
//! [`JobDispatcher`] creates jobs and spawns their runs on the tokio runtime.

pub mod controller;
pub mod dispatch;

pub use controller::{JobController, JobSummary};
pub use dispatch::{JobDispatcher, Submission};

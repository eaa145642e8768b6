//! Recognition job scheduler.
//!
//! This crate provides:
//! - Polling selection of uploaded and stale jobs
//! - Compare-and-set claims safe across scheduler instances
//! - Bounded execution of claimed jobs with a hard recognition budget
//! - Graceful shutdown that interrupts in-flight pipelines and leaves
//!   their jobs for stale re-selection

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod scheduler;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use processor::{JobOutcome, JobProcessor};
pub use scheduler::{JobScheduler, PollReport};

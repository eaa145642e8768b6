//! Recognition job store.
//!
//! The scheduler only talks to [`JobRepository`]. Claims and terminal
//! writes are conditional updates against the row state the caller last
//! saw, so any number of schedulers can share one store without
//! double-claiming a job or overwriting each other's results.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{DbError, DbResult};
pub use memory::MemoryJobRepository;
pub use postgres::{DbConfig, PgJobRepository};
pub use repository::{repeat_exceeded_message, Claim, ClaimOutcome, JobRepository, SelectionPolicy};

//! Shared data models for the video recognition backend.
//!
//! This crate provides Serde-serializable types for:
//! - Rule sets evaluated against recognised screen text
//! - Per-frame and per-job recognition results
//! - Recognition jobs and their lifecycle statuses
//! - Request-level recognition settings
//! - HTTP request/response schemas

pub mod api;
pub mod job;
pub mod job_status;
pub mod recognition;
pub mod rules;
pub mod settings;

// Re-export common types
pub use api::{ProcessRequest, ProcessResponse};
pub use job::{Job, JobId, NewJob};
pub use job_status::{JobStatus, StatusParseError, StorageStatus};
pub use recognition::RecognitionResult;
pub use rules::{RuleSet, StoredRuleSet};
pub use settings::{PreprocessOptions, RecognitionSettings, SamplingPolicy};

//! # Operator Core - Job Supervision for a Kafka Operator
//!
//! Runs the operator's reconciliation jobs side by side in one process:
//! - One worker per (job, identity scope), restarted with jittered backoff
//! - Panic boundary around every build and run
//! - Per-job controller runtime with probes, metrics and leader election
//! - Optimistic-concurrency status updates against the resource store
//!
//! ## Architecture
//!
//! ```text
//!   signals ──► root CancellationToken
//!                     │
//!                ┌────▼─────────────────────────────┐
//!                │              Pool                │
//!                │  worker(kafka, g1)   worker(kafka, g2)
//!                │  worker(akhq,  g1)   worker(akhq,  g2)
//!                │  worker(kmm,   g1)   ...          │
//!                └────┬─────────────────────────────┘
//!                     │ Job::build
//!                ┌────▼────┐      ┌──────────────┐
//!                │ Manager │─────►│ ResourceStore│◄── StatusUpdater
//!                └─────────┘      └──────────────┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod jobs;
pub mod runtime;
pub mod store;
pub mod supervisor;
pub mod types;

// Internal utilities
pub mod observability;

pub use types::{Config, Error, Result};

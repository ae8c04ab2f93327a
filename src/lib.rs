//! # herald
//!
//! Project-update bot: pulls activity events (commits, issues, PRs) from
//! configured sources, folds them into a durable deduplicated fact
//! history, and assembles the new facts into time-windowed update
//! documents for publishing.
//!
//! The core (merge, novelty, windowing, assembly, orchestration) is pure
//! and deterministic; sources, the state store, publishers, and the
//! optional LLM summarizer plug in at trait seams.

pub mod config;
pub mod draft;
pub mod error;
pub mod facts;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod source;
pub mod store;
pub mod summary;
pub mod telemetry;
pub mod window;

//! # Repo Insight Core
//!
//! Pure analysis logic for Repo Insight: data models, commit aggregation,
//! risk heuristics, narrative prompts and parsing, report assembly, and
//! the result store abstraction.
//!
//! This crate performs no network or filesystem I/O and does not depend
//! on an async runtime. The HTTP collaborators live in the `repo-insight`
//! app crate.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Commits, repository metadata, job status, report types |
//! | [`aggregate`] | Folds commits into contributor and file statistics |
//! | [`risk`] | Ownership, stale files, hot spots, fallback heuristics |
//! | [`narrative`] | Prompt text, tolerant JSON parsing, merge with defaults |
//! | [`report`] | Assembles report sections |
//! | [`store`] | [`store::ResultStore`] trait and in-memory implementation |

pub mod aggregate;
pub mod models;
pub mod narrative;
pub mod report;
pub mod risk;
pub mod store;

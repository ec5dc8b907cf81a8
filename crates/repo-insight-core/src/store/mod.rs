//! Storage abstraction for job status records and finished reports.
//!
//! The [`ResultStore`] trait holds two keyed mappings, workspace id to
//! [`JobStatus`] and workspace id to [`AnalysisReport`]. Entries live
//! until explicitly deleted; there is no expiry.
//!
//! Implementations must be `Send + Sync` so one store can be shared by
//! every pipeline task and request handler.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{AnalysisReport, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("workspace not found: {0}")]
    NotFound(String),
    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Number of entries in each mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub jobs: usize,
    pub results: usize,
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_job`](ResultStore::get_job) | Current status of a workspace |
/// | [`put_job`](ResultStore::put_job) | Insert or replace a status record |
/// | [`get_result`](ResultStore::get_result) | Finished report, if any |
/// | [`put_result`](ResultStore::put_result) | Store the finished report |
/// | [`delete`](ResultStore::delete) | Remove both entries for a workspace |
/// | [`counts`](ResultStore::counts) | Sizes of both mappings |
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn get_job(&self, workspace_id: &str) -> StoreResult<Option<JobStatus>>;

    async fn put_job(&self, status: JobStatus) -> StoreResult<()>;

    async fn get_result(&self, workspace_id: &str) -> StoreResult<Option<Arc<AnalysisReport>>>;

    async fn put_result(&self, report: Arc<AnalysisReport>) -> StoreResult<()>;

    /// Remove the status and the result for `workspace_id`. Fails with
    /// [`StoreError::NotFound`] when neither existed.
    async fn delete(&self, workspace_id: &str) -> StoreResult<()>;

    async fn counts(&self) -> StoreResult<StoreCounts>;
}

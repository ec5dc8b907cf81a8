//! In-memory [`ResultStore`] implementation.
//!
//! Uses `HashMap` behind `std::sync::RwLock`. Reports are kept behind an
//! `Arc` so readers share them without cloning the whole report.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::models::{AnalysisReport, JobStatus};

use super::{ResultStore, StoreCounts, StoreError, StoreResult};

pub struct InMemoryStore {
    jobs: RwLock<HashMap<String, JobStatus>>,
    results: RwLock<HashMap<String, Arc<AnalysisReport>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn get_job(&self, workspace_id: &str) -> StoreResult<Option<JobStatus>> {
        let jobs = self.jobs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(jobs.get(workspace_id).cloned())
    }

    async fn put_job(&self, status: JobStatus) -> StoreResult<()> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::Poisoned)?;
        jobs.insert(status.workspace_id.clone(), status);
        Ok(())
    }

    async fn get_result(&self, workspace_id: &str) -> StoreResult<Option<Arc<AnalysisReport>>> {
        let results = self.results.read().map_err(|_| StoreError::Poisoned)?;
        Ok(results.get(workspace_id).cloned())
    }

    async fn put_result(&self, report: Arc<AnalysisReport>) -> StoreResult<()> {
        let mut results = self.results.write().map_err(|_| StoreError::Poisoned)?;
        results.insert(report.workspace_id.clone(), report);
        Ok(())
    }

    async fn delete(&self, workspace_id: &str) -> StoreResult<()> {
        let had_job = self
            .jobs
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .remove(workspace_id)
            .is_some();
        let had_result = self
            .results
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .remove(workspace_id)
            .is_some();
        if had_job || had_result {
            Ok(())
        } else {
            Err(StoreError::NotFound(workspace_id.to_string()))
        }
    }

    async fn counts(&self) -> StoreResult<StoreCounts> {
        let jobs = self.jobs.read().map_err(|_| StoreError::Poisoned)?.len();
        let results = self.results.read().map_err(|_| StoreError::Poisoned)?.len();
        Ok(StoreCounts { jobs, results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CodebaseHealth, JobState, RepoInfo, RepoMetadata, RiskLevel};

    fn report(id: &str) -> Arc<AnalysisReport> {
        Arc::new(AnalysisReport {
            workspace_id: id.to_string(),
            repository_name: "octo/widgets".to_string(),
            repository_url: "https://github.com/octo/widgets".to_string(),
            project_summary: String::new(),
            primary_languages: vec![],
            contributors: vec![],
            codebase_health: CodebaseHealth {
                total_files: 0,
                total_commits: 0,
                active_contributors: 0,
                stale_files: vec![],
                hot_spots: vec![],
                maintenance_concerns: vec![],
                code_concentration: Default::default(),
                overall_bus_factor: 1,
                risk_assessment: RiskLevel::Critical,
                knowledge_distribution: Default::default(),
            },
            recommendations: vec![],
            analysis_timestamp: "2024-01-01T00:00:00Z".to_string(),
            metadata: RepoMetadata::from_repo(&RepoInfo::default(), 0),
        })
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryStore::new();
        store.put_job(JobStatus::pending("ws_1")).await.unwrap();
        let job = store.get_job("ws_1").await.unwrap().unwrap();
        assert_eq!(job.status, JobState::Pending);
        assert!(store.get_job("ws_2").await.unwrap().is_none());

        store.put_result(report("ws_1")).await.unwrap();
        let stored = store.get_result("ws_1").await.unwrap().unwrap();
        assert_eq!(stored.repository_name, "octo/widgets");
        assert_eq!(
            store.counts().await.unwrap(),
            StoreCounts { jobs: 1, results: 1 }
        );
    }

    #[tokio::test]
    async fn test_put_job_replaces() {
        let store = InMemoryStore::new();
        store.put_job(JobStatus::pending("ws_1")).await.unwrap();
        store
            .put_job(JobStatus::at_stage("ws_1", 30, "Analyzing contributors...", "contributors"))
            .await
            .unwrap();
        let job = store.get_job("ws_1").await.unwrap().unwrap();
        assert_eq!(job.progress, 30);
        assert_eq!(store.counts().await.unwrap().jobs, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_both() {
        let store = InMemoryStore::new();
        store.put_job(JobStatus::pending("ws_1")).await.unwrap();
        store.put_result(report("ws_1")).await.unwrap();
        store.delete("ws_1").await.unwrap();
        assert!(store.get_job("ws_1").await.unwrap().is_none());
        assert!(store.get_result("ws_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_result_only() {
        let store = InMemoryStore::new();
        store.put_result(report("ws_1")).await.unwrap();
        assert!(store.delete("ws_1").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_missing_is_error() {
        let store = InMemoryStore::new();
        let err = store.delete("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "nope"));
    }
}

//! End-to-end pipeline and orchestrator tests against in-memory fakes.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use repo_insight::collector::sample_rate;
use repo_insight::error::AnalysisError;
use repo_insight::jobs::{AnalysisRequest, ResultLookup};
use repo_insight::pipeline::AnalysisOptions;
use repo_insight::progress::NoProgress;
use repo_insight_core::models::{ChangeFrequency, ExpertiseLevel, JobState, RiskLevel};

const NARRATIVE_JSON: &str = r#"```json
{
  "knowledge_areas": ["Core library"],
  "expertise_level": "Major",
  "contribution_summary": "Maintains the library",
  "bus_factor_risk": "Low",
  "maintenance_concerns": ["Docs are aging"],
  "overall_bus_factor": 4,
  "risk_assessment": "High",
  "recommendations": ["Pair on src/lib.rs"]
}
```"#;

#[tokio::test]
async fn test_full_run_with_fallback_narratives() {
    let h = harness(sample_source(), FakeGenerator::failing());
    let recorder = Arc::new(Recorder::default());

    let report = h
        .pipeline
        .run(REPO_URL, "ws_full", AnalysisOptions::default(), recorder.clone())
        .await
        .unwrap();

    assert_eq!(report.workspace_id, "ws_full");
    assert_eq!(report.repository_name, "octo/widgets");
    assert_eq!(report.repository_url, REPO_URL);
    assert_eq!(report.primary_languages, vec!["Rust", "Shell"]);
    assert_eq!(report.metadata.commits_analyzed, 7);
    assert_eq!(report.metadata.stars, 42);
    assert!(report.project_summary.starts_with("octo/widgets: Widgets for everyone"));

    let names: Vec<&str> = report.contributors.iter().map(|c| c.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob", "Carol"]);

    let alice = &report.contributors[0];
    assert_eq!(alice.total_commits, 4);
    assert_eq!(alice.expertise_level, ExpertiseLevel::Minor);
    let lib = alice
        .files_contributed
        .iter()
        .find(|f| f.file_path == "src/lib.rs")
        .unwrap();
    assert_eq!(lib.ownership_percentage, 66.67);
    assert_eq!(lib.file_type, "rs");

    let health = &report.codebase_health;
    assert_eq!(health.total_files, 3);
    assert_eq!(health.total_commits, 7);
    assert_eq!(health.active_contributors, 3);
    assert!(health.hot_spots.is_empty());
    assert_eq!(health.stale_files.len(), 1);
    assert_eq!(health.stale_files[0].file_path, "docs/guide.md");
    assert_eq!(health.stale_files[0].last_contributor, "Carol");
    assert_eq!(health.stale_files[0].risk_level, RiskLevel::High);
    assert_eq!(health.overall_bus_factor, 1);
    assert_eq!(health.risk_assessment, RiskLevel::Critical);
    assert_eq!(health.maintenance_concerns.len(), 3);
    assert_eq!(health.code_concentration.get("src"), Some(&1));
    assert_eq!(health.code_concentration.get("root"), Some(&1));
    assert_eq!(health.knowledge_distribution.get("alice"), Some(&4));
    assert_eq!(report.recommendations.len(), 5);

    let job = h.store.get_job("ws_full").await.unwrap().unwrap();
    assert_eq!(job.status, JobState::Completed);
    assert_eq!(job.progress, 100);

    let progress = recorder.progress();
    assert_eq!(progress.first(), Some(&5));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    for expected in [60, 70, 80, 85, 88, 92] {
        assert!(progress.contains(&expected), "missing stage {}", expected);
    }

    assert_eq!(h.source.detail_calls.load(Ordering::SeqCst), 7);
    // summary + 3 contributors + health
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_model_narratives_are_merged() {
    let h = harness(sample_source(), FakeGenerator::replying(NARRATIVE_JSON));
    let report = h
        .pipeline
        .run(REPO_URL, "ws_model", AnalysisOptions::default(), Arc::new(NoProgress))
        .await
        .unwrap();

    let alice = &report.contributors[0];
    assert_eq!(alice.knowledge_areas, vec!["Core library"]);
    assert_eq!(alice.expertise_level, ExpertiseLevel::Major);
    assert_eq!(alice.bus_factor_risk, RiskLevel::Low);
    assert_eq!(report.codebase_health.overall_bus_factor, 4);
    assert_eq!(report.codebase_health.risk_assessment, RiskLevel::High);
    assert_eq!(report.recommendations, vec!["Pair on src/lib.rs"]);
}

#[tokio::test]
async fn test_heavy_contributor_fallback_is_core() {
    let commits = (0..150)
        .map(|i| commit(&format!("s{}", i), Some("dora"), "Dora", &days_ago(i)))
        .collect();
    let h = harness(FakeSource::new(commits), FakeGenerator::failing());
    let options = AnalysisOptions {
        max_commits: 1000,
        deep_analysis: false,
    };

    let report = h
        .pipeline
        .run(REPO_URL, "ws_dora", options, Arc::new(NoProgress))
        .await
        .unwrap();

    let dora = &report.contributors[0];
    assert_eq!(dora.total_commits, 150);
    assert_eq!(dora.expertise_level, ExpertiseLevel::Core);
    assert_eq!(dora.bus_factor_risk, RiskLevel::High);
    assert!(dora.files_contributed.is_empty());
    assert_eq!(report.codebase_health.total_files, 0);
    assert_eq!(h.source.detail_calls.load(Ordering::SeqCst), 0);
    // 150 commits fit in two pages of 100
    assert_eq!(h.source.page_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_max_commits_caps_collection() {
    let commits = (0..250)
        .map(|i| commit(&format!("s{}", i), Some("dora"), "Dora", &days_ago(i)))
        .collect();
    let h = harness(FakeSource::new(commits), FakeGenerator::failing());
    let options = AnalysisOptions {
        max_commits: 120,
        deep_analysis: false,
    };

    let report = h
        .pipeline
        .run(REPO_URL, "ws_cap", options, Arc::new(NoProgress))
        .await
        .unwrap();
    assert_eq!(report.metadata.commits_analyzed, 120);
    assert_eq!(report.contributors[0].total_commits, 120);
}

#[tokio::test]
async fn test_detail_fetches_are_sampled() {
    let commits = (0..250)
        .map(|i| commit(&format!("s{}", i), Some("dora"), "Dora", &days_ago(i)))
        .collect();
    let source = FakeSource::new(commits).with_rotating_details(4);
    let h = harness(source, FakeGenerator::failing());

    let report = h
        .pipeline
        .run(REPO_URL, "ws_sampled", AnalysisOptions::default(), Arc::new(NoProgress))
        .await
        .unwrap();

    let rate = sample_rate(250, 100);
    assert_eq!(rate, 2);
    assert_eq!(h.source.detail_calls.load(Ordering::SeqCst), 250usize.div_ceil(rate));

    // every second commit is sampled, so only f0.rs and f2.rs are seen
    let dora = &report.contributors[0];
    assert_eq!(dora.total_commits, 250);
    let mut paths: Vec<&str> = dora
        .files_contributed
        .iter()
        .map(|f| f.file_path.as_str())
        .collect();
    paths.sort();
    assert_eq!(paths, vec!["f0.rs", "f2.rs"]);
    assert_eq!(report.codebase_health.total_files, 2);

    let hot: Vec<(&str, u64)> = report
        .codebase_health
        .hot_spots
        .iter()
        .map(|h| (h.file_path.as_str(), h.commit_count))
        .collect();
    assert_eq!(hot, vec![("f0.rs", 63), ("f2.rs", 62)]);
    assert!(report
        .codebase_health
        .hot_spots
        .iter()
        .all(|h| h.change_frequency == ChangeFrequency::VeryHigh));
}

#[tokio::test]
async fn test_failed_detail_is_skipped() {
    let mut source = sample_source();
    source.details.remove("c7");
    let h = harness(source, FakeGenerator::failing());

    let report = h
        .pipeline
        .run(REPO_URL, "ws_skip", AnalysisOptions::default(), Arc::new(NoProgress))
        .await
        .unwrap();

    assert_eq!(report.codebase_health.total_files, 2);
    assert!(report.codebase_health.stale_files.is_empty());
    // Carol still counts as a contributor from the listing alone
    assert_eq!(report.contributors.len(), 3);
}

#[tokio::test]
async fn test_missing_repository_marks_job_failed() {
    let h = harness(sample_source().failing(RepoFailure::NotFound), FakeGenerator::failing());

    let err = h
        .pipeline
        .run(REPO_URL, "ws_404", AnalysisOptions::default(), Arc::new(NoProgress))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::NotFound(_)));

    let job = h.store.get_job("ws_404").await.unwrap().unwrap();
    assert_eq!(job.status, JobState::Failed);
    assert_eq!(job.current_step, "error");
    assert!(job.message.contains("Resource not found"));
    assert!(h.store.get_result("ws_404").await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_history_is_not_found() {
    let h = harness(FakeSource::new(Vec::new()), FakeGenerator::failing());

    let err = h
        .pipeline
        .run(REPO_URL, "ws_empty", AnalysisOptions::default(), Arc::new(NoProgress))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::NotFound(ref m) if m == "No commits found in repository"));
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_long_failure_message_is_truncated() {
    let body = "x".repeat(500);
    let h = harness(
        sample_source().failing(RepoFailure::Upstream(502, body)),
        FakeGenerator::failing(),
    );

    h.pipeline
        .run(REPO_URL, "ws_long", AnalysisOptions::default(), Arc::new(NoProgress))
        .await
        .unwrap_err();

    let job = h.store.get_job("ws_long").await.unwrap().unwrap();
    assert_eq!(job.message.chars().count(), 203);
    assert!(job.message.ends_with("..."));
}

// ============ Orchestrator ============

async fn wait_until_settled(jobs: &repo_insight::jobs::JobOrchestrator, id: &str) -> JobState {
    for _ in 0..200 {
        let job = jobs.status(id).await.unwrap().unwrap();
        if !job.status.is_in_flight() {
            return job.status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never settled", id);
}

#[tokio::test]
async fn test_submit_then_poll_result() {
    let (jobs, _h) = orchestrator(sample_source(), FakeGenerator::failing());

    let mut request = AnalysisRequest::new(REPO_URL);
    request.workspace_id = Some("ws_async".to_string());
    let receipt = jobs.submit(request).await.unwrap();
    assert_eq!(receipt.workspace_id, "ws_async");
    assert_eq!(receipt.status_url, "/api/status/ws_async");
    assert_eq!(receipt.result_url, "/api/result/ws_async");

    assert_eq!(wait_until_settled(&jobs, "ws_async").await, JobState::Completed);
    match jobs.result("ws_async").await.unwrap() {
        ResultLookup::Ready(report) => assert_eq!(report.contributors.len(), 3),
        other => panic!("unexpected lookup: {:?}", other),
    }

    let health = jobs.health().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_jobs, 1);
    assert_eq!(health.cached_results, 1);
    assert!(!health.generator_configured);
    assert!(!health.source_token_configured);
}

#[tokio::test]
async fn test_generated_workspace_id() {
    let (jobs, _h) = orchestrator(sample_source(), FakeGenerator::failing());
    let receipt = jobs.submit(AnalysisRequest::new(REPO_URL)).await.unwrap();
    assert!(receipt.workspace_id.starts_with("ws_"));
    wait_until_settled(&jobs, &receipt.workspace_id).await;
}

#[tokio::test]
async fn test_failed_job_result_lookup() {
    let (jobs, _h) = orchestrator(
        sample_source().failing(RepoFailure::RateLimited),
        FakeGenerator::failing(),
    );
    let mut request = AnalysisRequest::new(REPO_URL);
    request.workspace_id = Some("ws_limited".to_string());
    jobs.submit(request).await.unwrap();

    assert_eq!(wait_until_settled(&jobs, "ws_limited").await, JobState::Failed);
    match jobs.result("ws_limited").await.unwrap() {
        ResultLookup::Failed(message) => assert!(message.contains("rate limit")),
        other => panic!("unexpected lookup: {:?}", other),
    }
}

#[tokio::test]
async fn test_pending_result_lookup() {
    let (jobs, h) = orchestrator(sample_source(), FakeGenerator::failing());
    h.store
        .put_job(repo_insight_core::models::JobStatus::pending("ws_wait"))
        .await
        .unwrap();
    assert!(matches!(jobs.result("ws_wait").await.unwrap(), ResultLookup::Pending));
    assert!(matches!(jobs.result("ws_none").await.unwrap(), ResultLookup::NotFound));
}

#[tokio::test]
async fn test_invalid_url_registers_nothing() {
    let (jobs, h) = orchestrator(sample_source(), FakeGenerator::failing());
    let mut request = AnalysisRequest::new("not-a-url");
    request.workspace_id = Some("ws_bad".to_string());

    let err = jobs.submit(request).await.unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidUrl(_)));
    assert!(jobs.status("ws_bad").await.unwrap().is_none());
    assert_eq!(h.source.page_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_sync_then_delete() {
    let (jobs, _h) = orchestrator(sample_source(), FakeGenerator::failing());
    let mut request = AnalysisRequest::new(REPO_URL);
    request.workspace_id = Some("ws_sync".to_string());
    request.deep_analysis = Some(false);

    let report = jobs.run_sync(request, Arc::new(NoProgress)).await.unwrap();
    assert_eq!(report.workspace_id, "ws_sync");
    assert_eq!(report.codebase_health.total_files, 0);

    assert!(jobs.delete("ws_sync").await.unwrap());
    assert!(jobs.status("ws_sync").await.unwrap().is_none());
    assert!(matches!(jobs.result("ws_sync").await.unwrap(), ResultLookup::NotFound));
    assert!(!jobs.delete("ws_sync").await.unwrap());
}

#[tokio::test]
async fn test_sync_run_survives_dropped_caller() {
    let source = sample_source().with_page_delay(Duration::from_millis(200));
    let (jobs, _h) = orchestrator(source, FakeGenerator::failing());
    let mut request = AnalysisRequest::new(REPO_URL);
    request.workspace_id = Some("ws_dropped".to_string());

    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        jobs.run_sync(request, Arc::new(NoProgress)),
    )
    .await;
    assert!(outcome.is_err(), "run should still be fetching commits");

    assert_eq!(wait_until_settled(&jobs, "ws_dropped").await, JobState::Completed);
    assert!(matches!(jobs.result("ws_dropped").await.unwrap(), ResultLookup::Ready(_)));
}

#[tokio::test]
async fn test_resubmission_overwrites_previous_run() {
    let (jobs, _h) = orchestrator(sample_source(), FakeGenerator::failing());
    for _ in 0..2 {
        let mut request = AnalysisRequest::new(REPO_URL);
        request.workspace_id = Some("ws_again".to_string());
        jobs.run_sync(request, Arc::new(NoProgress)).await.unwrap();
    }
    assert_eq!(jobs.health().await.unwrap().cached_results, 1);
}

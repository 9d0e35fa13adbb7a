//! Owns the lifecycle of one user query and the
//! collections the dashboard keeps around it.
//!
//! A submission runs two independent signals against the shared
//! [`DashboardState`]: the cosmetic progress ticker and the outbound request.
//! Whichever resolves first wins. The request cancels the ticker when it
//! resolves, and every ticker or settle write is tagged with the submission
//! id, so a late tick or a stale reset is dropped instead of overwriting
//! newer state.
//!
//! Every operation reports its outcome twice: as a `Result` for the caller
//! and as a [`Notification`] for the user.

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::{
    client::{AnalysisService, HttpAnalysisService},
    config::WorkflowConfig,
    error::{Result, WorkflowError},
    models::{AnalysisResult, QueryRequest},
    notify::{Notification, Notifier},
    progress::{self, Progress},
    report::{ExportedReport, ReportSink},
    state::{DashboardState, Phase, View},
};

/// Marks a submission as abandoned if its future is dropped before the
/// response arrives.
struct InFlight {
    state: Arc<Mutex<DashboardState>>,
    submission: Uuid,
    resolved: bool,
    _ticker: DropGuard,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.resolved {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.abandon_submission(self.submission) {
                warn!(submission_id = %self.submission, "Submission dropped before completion");
            }
        }
    }
}

#[derive(Clone)]
pub struct InteractionWorkflow {
    service: Arc<dyn AnalysisService>,
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<DashboardState>>,
    config: WorkflowConfig,
}

impl InteractionWorkflow {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        notifier: Arc<dyn Notifier>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            service,
            notifier,
            state: Arc::new(Mutex::new(DashboardState::new())),
            config,
        }
    }

    /// Workflow talking to the HTTP service described by `config`.
    pub fn connect(config: WorkflowConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let service = Arc::new(HttpAnalysisService::new(&config)?);
        Ok(Self::new(service, notifier, config))
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the full state for rendering
    pub fn snapshot(&self) -> DashboardState {
        self.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn progress(&self) -> Progress {
        self.lock().progress.clone()
    }

    pub fn current_result(&self) -> Option<AnalysisResult> {
        self.lock().current_result.clone()
    }

    pub fn select_view(&self, view: View) {
        self.lock().select_view(view);
    }

    /// Submit `query` for analysis.
    ///
    /// On success the result becomes the current result and history and stats
    /// are refreshed. On failure the previous result stays in place. Either
    /// way the progress indicator resets after the settle delay.
    pub async fn submit(&self, query: &str) -> Result<AnalysisResult> {
        let query = query.trim();
        if query.is_empty() {
            warn!("Rejected empty query");
            self.notifier.notify(Notification::error(WorkflowError::Validation.to_string()));
            return Err(WorkflowError::Validation);
        }

        let submission_id = Uuid::new_v4();
        let begun = self.lock().begin_submission(submission_id);
        if let Err(e) = begun {
            warn!(submission_id = %submission_id, "Submission rejected: {}", e);
            self.notifier.notify(Notification::error(e.to_string()));
            return Err(e);
        }

        let span = info_span!("submission", submission_id = %submission_id);
        self.run_submission(submission_id, query).instrument(span).await
    }

    async fn run_submission(&self, submission_id: Uuid, query: &str) -> Result<AnalysisResult> {
        info!(query_len = query.len(), "Starting analysis");

        let cancel = CancellationToken::new();
        let ticker = {
            let state = self.state.clone();
            progress::spawn_ticker(self.config.progress_interval, cancel.clone(), move |stage| {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.advance_progress(submission_id, stage);
            })
        };
        let mut in_flight = InFlight {
            state: self.state.clone(),
            submission: submission_id,
            resolved: false,
            _ticker: cancel.clone().drop_guard(),
        };

        let request = QueryRequest {
            query: query.to_string(),
            user_id: self.config.user_id.clone(),
        };
        let outcome = self.service.submit_query(&request).await;

        cancel.cancel();
        if let Err(e) = ticker.await {
            warn!("Progress ticker ended abnormally: {}", e);
        }
        in_flight.resolved = true;

        match outcome {
            Ok(result) => {
                self.lock().complete_submission(submission_id, result.clone());
                info!(result_id = %result.id, risk = %result.risk_label(), "Analysis complete");
                self.notifier.notify(
                    Notification::success("Analysis complete!")
                        .with_description("Your results are ready to view"),
                );
                self.schedule_settle(submission_id);

                self.refresh().await;
                Ok(result)
            }
            Err(e) => {
                self.lock().fail_submission(submission_id);
                error!("Error processing query: {}", e);
                self.notifier.notify(
                    Notification::error("Something went wrong")
                        .with_description("Please try again or rephrase your question"),
                );
                self.schedule_settle(submission_id);
                Err(e)
            }
        }
    }

    fn schedule_settle(&self, submission_id: Uuid) {
        let state = self.state.clone();
        let delay = self.config.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.settle(submission_id) {
                debug!(submission_id = %submission_id, "Settle superseded by a newer submission");
            }
        });
    }

    /// Re-fetch history and stats. Each response fully replaces the cached
    /// value; a failed fetch is logged and leaves the cached value as it was.
    pub async fn refresh(&self) {
        let (history, stats) = tokio::join!(
            self.service.fetch_history(self.config.history_limit),
            self.service.fetch_stats()
        );

        match history {
            Ok(history) => self.lock().replace_history(history),
            Err(e) => warn!("Error fetching history: {}", e),
        }
        match stats {
            Ok(stats) => self.lock().replace_stats(stats),
            Err(e) => warn!("Error fetching stats: {}", e),
        }
    }

    pub fn add_to_comparison(&self, result: AnalysisResult) -> Result<()> {
        let id = result.id.clone();
        let outcome = self.lock().comparison.add(result);

        match &outcome {
            Ok(()) => {
                info!(result_id = %id, "Added to comparison");
                self.notifier.notify(Notification::success("Added to comparison"));
            }
            Err(e) => {
                warn!(result_id = %id, "Comparison add rejected: {}", e);
                self.notifier.notify(Notification::error(e.to_string()));
            }
        }
        outcome
    }

    /// Add the current result to the comparison set.
    pub fn compare_current(&self) -> Result<()> {
        match self.current_result() {
            Some(result) => self.add_to_comparison(result),
            None => {
                self.notifier.notify(Notification::error(WorkflowError::NoResult.to_string()));
                Err(WorkflowError::NoResult)
            }
        }
    }

    /// Remove `id` from the comparison set; absent ids are ignored.
    pub fn remove_from_comparison(&self, id: &str) -> bool {
        let removed = self.lock().comparison.remove(id);
        if removed {
            info!(result_id = %id, "Removed from comparison");
        }
        removed
    }

    /// Render the current result as a report and hand it to `sink`.
    pub async fn export_current_result(&self, sink: &dyn ReportSink) -> Result<ExportedReport> {
        let Some(result) = self.current_result() else {
            warn!("Export requested with no current result");
            self.notifier.notify(Notification::error(WorkflowError::NoResult.to_string()));
            return Err(WorkflowError::NoResult);
        };

        let report = ExportedReport::new(&result, &self.config.report_prefix, Utc::now());
        if let Err(e) = sink.deliver(&report).await {
            error!(filename = %report.filename, "Report export failed: {}", e);
            self.notifier.notify(Notification::error(e.to_string()));
            return Err(e);
        }

        info!(filename = %report.filename, result_id = %result.id, "Report exported");
        self.notifier.notify(Notification::success("Report downloaded successfully!"));
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{HistoryEntry, Stats},
        notify::CollectingNotifier,
        report::MemorySink,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Service double: answers from a script and counts every call
    #[derive(Default)]
    struct ScriptedService {
        answer: Mutex<Option<serde_json::Value>>,
        fail_status: Option<u16>,
        delay: Duration,
        history_delay: Duration,
        submits: AtomicUsize,
        history_reads: AtomicUsize,
        stats_reads: AtomicUsize,
        last_request: Mutex<Option<QueryRequest>>,
    }

    impl ScriptedService {
        fn answering(answer: serde_json::Value) -> Self {
            Self {
                answer: Mutex::new(Some(answer)),
                ..Default::default()
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                fail_status: Some(status),
                ..Default::default()
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn with_history_delay(mut self, delay: Duration) -> Self {
            self.history_delay = delay;
            self
        }

        fn reads(&self) -> usize {
            self.history_reads.load(Ordering::SeqCst) + self.stats_reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnalysisService for ScriptedService {
        async fn submit_query(&self, request: &QueryRequest) -> Result<AnalysisResult> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            tokio::time::sleep(self.delay).await;

            if let Some(status) = self.fail_status {
                return Err(WorkflowError::Service {
                    status,
                    body: "Internal Server Error".to_string(),
                });
            }
            let answer = self.answer.lock().unwrap().clone().unwrap_or(json!({"id": "r0"}));
            Ok(serde_json::from_value(answer)?)
        }

        async fn fetch_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
            self.history_reads.fetch_add(1, Ordering::SeqCst);
            assert_eq!(limit, 20);
            tokio::time::sleep(self.history_delay).await;
            Ok(vec![serde_json::from_value(json!({
                "id": "r1",
                "query": "aspirin and warfarin",
                "risk_score": "HIGH",
                "timestamp": "2025-03-01T10:00:00"
            }))?])
        }

        async fn fetch_stats(&self) -> Result<Stats> {
            self.stats_reads.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(json!({
                "total_queries": 1,
                "risk_distribution": {"HIGH": 1}
            }))?)
        }
    }

    fn fast_config() -> WorkflowConfig {
        WorkflowConfig::default()
            .with_timings(Duration::from_millis(10), Duration::from_secs(30))
    }

    fn workflow(service: Arc<ScriptedService>) -> (InteractionWorkflow, Arc<CollectingNotifier>) {
        let notifier = Arc::new(CollectingNotifier::new());
        let workflow = InteractionWorkflow::new(service, notifier.clone(), fast_config());
        (workflow, notifier)
    }

    fn aspirin_answer() -> serde_json::Value {
        json!({
            "id": "r1",
            "risk_score": "HIGH",
            "grounding_score": 0.8,
            "citations": [{"drug_name": "Aspirin", "source": "DrugBank", "relevance_score": 0.9}]
        })
    }

    #[tokio::test]
    async fn blank_query_makes_no_call() {
        let service = Arc::new(ScriptedService::answering(aspirin_answer()));
        let (workflow, notifier) = workflow(service.clone());

        for query in ["", "   ", "\n\t"] {
            let err = workflow.submit(query).await.unwrap_err();
            assert!(matches!(err, WorkflowError::Validation));
        }

        assert_eq!(service.submits.load(Ordering::SeqCst), 0);
        assert_eq!(workflow.phase(), Phase::Idle);
        assert_eq!(notifier.errors().len(), 3);
    }

    #[tokio::test]
    async fn blank_query_leaves_succeeded_state_alone() {
        let service = Arc::new(ScriptedService::answering(aspirin_answer()));
        let (workflow, _) = workflow(service.clone());

        workflow.submit("aspirin and warfarin").await.unwrap();
        let before = workflow.snapshot();

        assert!(workflow.submit("  ").await.is_err());
        assert_eq!(workflow.snapshot(), before);
        assert_eq!(service.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_query_leaves_failed_state_alone() {
        let service = Arc::new(ScriptedService::failing(503));
        let (workflow, notifier) = workflow(service.clone());

        assert!(workflow.submit("aspirin and warfarin").await.is_err());
        let before = workflow.snapshot();
        assert_eq!(before.phase, Phase::Failed);

        let err = workflow.submit(" \t ").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation));
        assert_eq!(workflow.snapshot(), before);
        assert_eq!(service.submits.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.errors().len(), 2);
    }

    #[tokio::test]
    async fn success_stores_response_and_refreshes() {
        let service = Arc::new(ScriptedService::answering(aspirin_answer()));
        let (workflow, notifier) = workflow(service.clone());

        let result = workflow.submit("aspirin and warfarin").await.unwrap();
        let expected: AnalysisResult = serde_json::from_value(aspirin_answer()).unwrap();

        assert_eq!(result, expected);
        let state = workflow.snapshot();
        assert_eq!(state.phase, Phase::Succeeded);
        assert_eq!(state.current_result, Some(expected));
        assert_eq!(state.active_view, View::Result);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.stats.as_ref().map(|s| s.total_queries), Some(1));
        assert_eq!(service.reads(), 2);

        let sent = service.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.query, "aspirin and warfarin");
        assert_eq!(sent.user_id, "anonymous");

        let all = notifier.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Analysis complete!");
    }

    #[tokio::test]
    async fn server_error_keeps_previous_result() {
        let good = Arc::new(ScriptedService::answering(aspirin_answer()));
        let (workflow, notifier) = workflow(good);
        workflow.submit("aspirin and warfarin").await.unwrap();
        notifier.take();

        // Same state container, failing service
        let failing = InteractionWorkflow {
            service: Arc::new(ScriptedService::failing(500)),
            ..workflow.clone()
        };

        let err = failing.submit("x").await.unwrap_err();
        assert!(err.is_network());

        let state = failing.snapshot();
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.current_result.map(|r| r.id), Some("r1".to_string()));
        assert_eq!(notifier.errors().len(), 1);
        assert_eq!(notifier.all().len(), 1);
    }

    #[tokio::test]
    async fn progress_is_not_overwritten_after_response() {
        let service = Arc::new(
            ScriptedService::answering(aspirin_answer()).with_delay(Duration::from_millis(35)),
        );
        let (workflow, _) = workflow(service);

        workflow.submit("aspirin and warfarin").await.unwrap();
        assert_eq!(workflow.progress(), Progress::complete());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(workflow.progress(), Progress::complete());
    }

    #[tokio::test]
    async fn progress_advances_while_waiting() {
        let service = Arc::new(
            ScriptedService::answering(aspirin_answer()).with_delay(Duration::from_millis(500)),
        );
        let (workflow, _) = workflow(service);

        let pending = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.submit("aspirin and warfarin").await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let progress = workflow.progress();
        assert_eq!(workflow.phase(), Phase::Submitting);
        assert_eq!(progress.percent, 95);
        assert_eq!(progress.label, "Preparing your answer...");

        pending.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn concurrent_submit_is_rejected() {
        let service = Arc::new(
            ScriptedService::answering(aspirin_answer()).with_delay(Duration::from_millis(100)),
        );
        let (workflow, _) = workflow(service.clone());

        let first = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.submit("aspirin and warfarin").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = workflow.submit("ibuprofen").await.unwrap_err();
        assert!(matches!(err, WorkflowError::SubmissionInFlight));

        first.await.unwrap().unwrap();
        assert_eq!(service.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn progress_resets_after_settle_delay() {
        let service = Arc::new(ScriptedService::answering(aspirin_answer()));
        let notifier = Arc::new(CollectingNotifier::new());
        let config = WorkflowConfig::default()
            .with_timings(Duration::from_millis(10), Duration::from_millis(20));
        let workflow = InteractionWorkflow::new(service, notifier, config);

        workflow.submit("aspirin and warfarin").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = workflow.snapshot();
        assert!(state.progress.is_idle());
        assert_eq!(state.submission, None);
        assert_eq!(state.phase, Phase::Succeeded);
    }

    #[tokio::test]
    async fn slow_history_does_not_hold_progress_or_notification() {
        let service = Arc::new(
            ScriptedService::answering(aspirin_answer())
                .with_history_delay(Duration::from_millis(600)),
        );
        let notifier = Arc::new(CollectingNotifier::new());
        let config = WorkflowConfig::default()
            .with_timings(Duration::from_millis(10), Duration::from_millis(20));
        let workflow = InteractionWorkflow::new(service, notifier.clone(), config);

        let pending = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.submit("aspirin and warfarin").await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let state = workflow.snapshot();
        assert_eq!(state.phase, Phase::Succeeded);
        assert!(state.progress.is_idle());
        assert_eq!(state.submission, None);
        assert!(state.history.is_empty());
        assert_eq!(notifier.all().len(), 1);
        assert_eq!(notifier.all()[0].title, "Analysis complete!");

        pending.await.unwrap().unwrap();
        assert_eq!(workflow.snapshot().history.len(), 1);
    }

    #[tokio::test]
    async fn dropped_during_refresh_still_settles() {
        let service = Arc::new(
            ScriptedService::answering(aspirin_answer())
                .with_history_delay(Duration::from_secs(30)),
        );
        let notifier = Arc::new(CollectingNotifier::new());
        let config = WorkflowConfig::default()
            .with_timings(Duration::from_millis(10), Duration::from_millis(20));
        let workflow = InteractionWorkflow::new(service, notifier, config);

        let outcome =
            tokio::time::timeout(Duration::from_millis(100), workflow.submit("aspirin")).await;
        assert!(outcome.is_err());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = workflow.snapshot();
        assert_eq!(state.phase, Phase::Succeeded);
        assert_eq!(state.current_result.map(|r| r.id), Some("r1".to_string()));
        assert!(state.progress.is_idle());
        assert_eq!(state.submission, None);
    }

    #[tokio::test]
    async fn dropped_submission_returns_to_idle() {
        let service = Arc::new(
            ScriptedService::answering(aspirin_answer()).with_delay(Duration::from_secs(30)),
        );
        let (workflow, _) = workflow(service);

        let outcome =
            tokio::time::timeout(Duration::from_millis(30), workflow.submit("aspirin")).await;
        assert!(outcome.is_err());

        assert_eq!(workflow.phase(), Phase::Idle);
        assert!(workflow.progress().is_idle());
    }

    #[tokio::test]
    async fn export_without_result_fails() {
        let service = Arc::new(ScriptedService::answering(aspirin_answer()));
        let (workflow, notifier) = workflow(service);
        let sink = MemorySink::new();

        let err = workflow.export_current_result(&sink).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NoResult));
        assert!(sink.reports().is_empty());
        assert_eq!(notifier.errors()[0].title, "No result to export");
    }

    #[tokio::test]
    async fn export_counts_citations() {
        let service = Arc::new(ScriptedService::answering(aspirin_answer()));
        let (workflow, _) = workflow(service);
        workflow.submit("aspirin and warfarin").await.unwrap();

        let sink = MemorySink::new();
        let report = workflow.export_current_result(&sink).await.unwrap();

        assert!(report.content.contains("SOURCES CONSULTED: 1"));
        assert!(report.filename.starts_with("MediSafe-Report-"));
        assert!(report.filename.ends_with(".txt"));
        assert_eq!(sink.reports(), vec![report]);
    }

    #[tokio::test]
    async fn comparison_notifications() {
        let service = Arc::new(ScriptedService::answering(aspirin_answer()));
        let (workflow, notifier) = workflow(service);

        assert!(matches!(workflow.compare_current(), Err(WorkflowError::NoResult)));
        workflow.submit("aspirin and warfarin").await.unwrap();
        notifier.take();

        workflow.compare_current().unwrap();
        assert!(matches!(
            workflow.compare_current(),
            Err(WorkflowError::Duplicate(_))
        ));

        let titles: Vec<String> = notifier.take().into_iter().map(|n| n.title).collect();
        assert_eq!(
            titles,
            vec!["Added to comparison", "Query r1 already added to comparison"]
        );

        assert!(!workflow.remove_from_comparison("r9"));
        assert!(workflow.remove_from_comparison("r1"));
        assert!(workflow.snapshot().comparison.is_empty());
    }
}

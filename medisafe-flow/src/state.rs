use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    comparison::ComparisonSet,
    error::{Result, WorkflowError},
    models::{AnalysisResult, HistoryEntry, Stats},
    progress::{Progress, ProgressStage},
};

/// Where the submit cycle currently is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Dashboard views; each has exactly one renderer in the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum View {
    #[default]
    Query,
    Result,
    History,
    Compare,
    Evaluation,
    Architecture,
}

impl View {
    pub const ALL: [View; 6] = [
        View::Query,
        View::Result,
        View::History,
        View::Compare,
        View::Evaluation,
        View::Architecture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Query => "query",
            View::Result => "result",
            View::History => "history",
            View::Compare => "compare",
            View::Evaluation => "evaluation",
            View::Architecture => "architecture",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        View::ALL
            .into_iter()
            .find(|view| view.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown view '{}'", s))
    }
}

/// Single owner of everything the dashboard displays.
///
/// Mutated only through the transition methods below; writes that belong to a
/// particular submission carry its id and are ignored once that submission is
/// no longer the active one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardState {
    pub phase: Phase,
    pub submission: Option<Uuid>,
    pub progress: Progress,
    pub current_result: Option<AnalysisResult>,
    pub history: Vec<HistoryEntry>,
    pub stats: Option<Stats>,
    pub comparison: ComparisonSet,
    pub active_view: View,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == Phase::Submitting
    }

    fn owns(&self, submission: Uuid) -> bool {
        self.submission == Some(submission)
    }

    /// `Idle | Succeeded | Failed -> Submitting`. A pending settle from an
    /// earlier submission is superseded.
    pub fn begin_submission(&mut self, submission: Uuid) -> Result<()> {
        if self.is_submitting() {
            return Err(WorkflowError::SubmissionInFlight);
        }
        self.phase = Phase::Submitting;
        self.submission = Some(submission);
        self.progress = Progress::starting();
        Ok(())
    }

    /// Returns false when the tick arrived after its submission resolved.
    pub fn advance_progress(&mut self, submission: Uuid, stage: &ProgressStage) -> bool {
        if !self.is_submitting() || !self.owns(submission) {
            return false;
        }
        self.progress = Progress::from(stage);
        true
    }

    pub fn complete_submission(&mut self, submission: Uuid, result: AnalysisResult) -> bool {
        if !self.is_submitting() || !self.owns(submission) {
            return false;
        }
        self.phase = Phase::Succeeded;
        self.progress = Progress::complete();
        self.current_result = Some(result);
        self.active_view = View::Result;
        true
    }

    /// The previous result is kept; only the in-flight progress is dropped.
    pub fn fail_submission(&mut self, submission: Uuid) -> bool {
        if !self.is_submitting() || !self.owns(submission) {
            return false;
        }
        self.phase = Phase::Failed;
        self.progress = Progress::idle();
        true
    }

    /// Used when a submission is dropped before its response arrived.
    pub fn abandon_submission(&mut self, submission: Uuid) -> bool {
        if !self.is_submitting() || !self.owns(submission) {
            return false;
        }
        self.phase = Phase::Idle;
        self.submission = None;
        self.progress = Progress::idle();
        true
    }

    /// Reset the indicator after the settle delay. Ignored if another
    /// submission has started in the meantime.
    pub fn settle(&mut self, submission: Uuid) -> bool {
        if self.is_submitting() || !self.owns(submission) {
            return false;
        }
        self.submission = None;
        self.progress = Progress::idle();
        true
    }

    pub fn replace_history(&mut self, history: Vec<HistoryEntry>) {
        self.history = history;
    }

    pub fn replace_stats(&mut self, stats: Stats) {
        self.stats = Some(stats);
    }

    pub fn select_view(&mut self, view: View) {
        self.active_view = view;
    }
}

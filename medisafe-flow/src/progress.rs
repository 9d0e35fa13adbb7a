//! Cosmetic progress shown while a query is being analyzed.
//!
//! The stages carry no meaning about what the service is doing; they only
//! give the user feedback during a long request. The ticker runs as its own
//! task and is stopped through a [`CancellationToken`] once the request
//! resolves.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressStage {
    pub percent: u8,
    pub label: &'static str,
}

/// Stages shown one per tick while a submission is outstanding
pub const PROGRESS_STAGES: [ProgressStage; 5] = [
    ProgressStage { percent: 20, label: "Understanding your question..." },
    ProgressStage { percent: 40, label: "Searching medical database..." },
    ProgressStage { percent: 60, label: "Analyzing drug interactions..." },
    ProgressStage { percent: 80, label: "Verifying with sources..." },
    ProgressStage { percent: 95, label: "Preparing your answer..." },
];

/// What the progress indicator currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub percent: u8,
    pub label: String,
}

impl Progress {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn starting() -> Self {
        Self {
            percent: 0,
            label: "Starting analysis...".to_string(),
        }
    }

    pub fn complete() -> Self {
        Self {
            percent: 100,
            label: "Complete!".to_string(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.percent == 0 && self.label.is_empty()
    }
}

impl From<&ProgressStage> for Progress {
    fn from(stage: &ProgressStage) -> Self {
        Self {
            percent: stage.percent,
            label: stage.label.to_string(),
        }
    }
}

/// Spawn a task that hands each stage to `on_stage`, one per `interval`,
/// until the stages run out or `cancel` fires.
pub fn spawn_ticker<F>(interval: Duration, cancel: CancellationToken, on_stage: F) -> JoinHandle<()>
where
    F: Fn(&ProgressStage) + Send + 'static,
{
    tokio::spawn(async move {
        for stage in PROGRESS_STAGES.iter() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    trace!("Progress ticker cancelled");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    on_stage(stage);
                }
            }
        }
    })
}

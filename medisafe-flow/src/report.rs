use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;

use crate::{
    error::{Result, WorkflowError},
    models::{AnalysisResult, risk_description},
};

const RULE: &str = "------------------------------------------------------------";
const BANNER: &str = "============================================================";

const DISCLAIMER: &str = "This analysis is for informational purposes only and should not\n\
replace professional medical advice. Always consult with qualified\n\
healthcare professionals before making medication decisions.";

/// A rendered report ready to be handed to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedReport {
    pub filename: String,
    pub content: String,
}

impl ExportedReport {
    pub fn new(result: &AnalysisResult, prefix: &str, generated_at: DateTime<Utc>) -> Self {
        Self {
            filename: report_filename(prefix, generated_at),
            content: render_report(result, generated_at),
        }
    }
}

/// `<prefix>-<unix-millis>.txt`
pub fn report_filename(prefix: &str, generated_at: DateTime<Utc>) -> String {
    format!("{}-{}.txt", prefix, generated_at.timestamp_millis())
}

fn section(out: &mut String, title: &str) {
    let _ = write!(out, "{RULE}\n{title}\n{RULE}\n\n");
}

/// Render `result` and its citations as a plain-text report.
pub fn render_report(result: &AnalysisResult, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();

    let _ = write!(out, "{BANNER}\n  MEDISAFE AI - ANALYSIS REPORT\n{BANNER}\n\n");
    let _ = write!(out, "YOUR QUESTION:\n{}\n\n", result.query);
    let _ = writeln!(
        out,
        "RISK ASSESSMENT: {} ({})",
        result.risk_label(),
        risk_description(result.risk_score.as_ref())
    );
    let _ = writeln!(out, "CONFIDENCE SCORE: {:.0}%", result.grounding_score * 100.0);
    let _ = write!(out, "SOURCES CONSULTED: {}\n\n", result.citations.len());

    section(&mut out, "DETAILED ANALYSIS");
    let _ = write!(out, "{}\n\n", result.response);

    section(&mut out, "MEDICAL SOURCES & EVIDENCE");
    if result.citations.is_empty() {
        out.push_str("No sources were cited.\n");
    }
    for (index, citation) in result.citations.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}", index + 1, citation.drug_name);
        let _ = writeln!(out, "    Database: {}", citation.source);
        let _ = writeln!(out, "    Relevance: {:.1}%", citation.relevance_score * 100.0);
        if let Some(text) = citation.text.as_deref().filter(|t| !t.trim().is_empty()) {
            let _ = writeln!(out, "    Excerpt: {}", text.trim());
        }
        out.push('\n');
    }
    out.push('\n');

    if !result.sub_queries.is_empty() {
        section(&mut out, "QUERY BREAKDOWN");
        let _ = writeln!(
            out,
            "Your question was broken down into {} focused queries:",
            result.sub_queries.len()
        );
        for (index, sub_query) in result.sub_queries.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", index + 1, sub_query);
        }
        out.push('\n');
    }

    let _ = write!(out, "{RULE}\n\nIMPORTANT DISCLAIMER:\n{DISCLAIMER}\n\n");
    let _ = writeln!(
        out,
        "Generated: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "{BANNER}");

    out
}

/// Where exported reports end up
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, report: &ExportedReport) -> Result<()>;
}

/// Writes each report as a file into a directory
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, report: &ExportedReport) -> PathBuf {
        self.dir.join(&report.filename)
    }
}

#[async_trait]
impl ReportSink for DirectorySink {
    async fn deliver(&self, report: &ExportedReport) -> Result<()> {
        let path = self.path_for(report);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| WorkflowError::Export(format!("{}: {}", self.dir.display(), e)))?;
        tokio::fs::write(&path, report.content.as_bytes())
            .await
            .map_err(|e| WorkflowError::Export(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), bytes = report.content.len(), "Report written");
        Ok(())
    }
}

/// Keeps delivered reports in memory
#[derive(Default)]
pub struct MemorySink {
    reports: Mutex<Vec<ExportedReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ExportedReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn deliver(&self, report: &ExportedReport) -> Result<()> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Severity label attached to an analysis result.
///
/// Labels outside the four known levels are kept verbatim in `Other` so a
/// stored result never loses what the service sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
    Other(String),
}

impl RiskLevel {
    pub fn as_str(&self) -> &str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::Other(label) => label,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "Dangerous combination - Seek immediate medical advice",
            RiskLevel::High => "Significant interaction - Consult healthcare provider",
            RiskLevel::Moderate => "Monitor carefully - May require dose adjustment",
            RiskLevel::Low => "Minimal interaction - Generally safe",
            RiskLevel::Other(_) => "Unknown risk level",
        }
    }
}

impl From<String> for RiskLevel {
    fn from(label: String) -> Self {
        match label.as_str() {
            "LOW" => RiskLevel::Low,
            "MODERATE" => RiskLevel::Moderate,
            "HIGH" => RiskLevel::High,
            "CRITICAL" => RiskLevel::Critical,
            _ => RiskLevel::Other(label),
        }
    }
}

impl From<RiskLevel> for String {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label shown when a result carries no risk score at all
pub const UNKNOWN_RISK_LABEL: &str = "UNKNOWN";

/// Display label for an optional risk score.
pub fn risk_label(risk: Option<&RiskLevel>) -> &str {
    risk.map(RiskLevel::as_str).unwrap_or(UNKNOWN_RISK_LABEL)
}

/// Description for an optional risk score.
pub fn risk_description(risk: Option<&RiskLevel>) -> &'static str {
    risk.map(RiskLevel::description)
        .unwrap_or("Unknown risk level")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub drug_name: String,
    pub source: String,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Analysis produced by the external service for one submitted query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<RiskLevel>,
    #[serde(default)]
    pub grounding_score: f64,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub sub_queries: Vec<String>,
    #[serde(default)]
    pub num_retrieved_docs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Fields the service sends that this client does not model
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AnalysisResult {
    pub fn risk_label(&self) -> &str {
        risk_label(self.risk_score.as_ref())
    }
}

/// A previously produced analysis as listed by the history endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub query: String,
    #[serde(default)]
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<RiskLevel>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_score: Option<f64>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub sub_queries: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl From<HistoryEntry> for AnalysisResult {
    fn from(entry: HistoryEntry) -> Self {
        let mut extra = entry.extra;
        let num_retrieved_docs = extra
            .remove("num_retrieved_docs")
            .and_then(|count| count.as_u64())
            .unwrap_or(0);

        Self {
            id: entry.id,
            query: entry.query,
            response: entry.response,
            risk_score: entry.risk_score,
            grounding_score: entry.grounding_score.unwrap_or_default(),
            num_retrieved_docs,
            citations: entry.citations,
            sub_queries: entry.sub_queries,
            timestamp: Some(entry.timestamp),
            user_id: entry.user_id,
            extra,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_queries: u64,
    #[serde(default)]
    pub risk_distribution: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub user_id: String,
}

//! One renderer per dashboard view. Every renderer is a pure function of the
//! state snapshot.

use medisafe_flow::{
    AnalysisResult, DashboardState, MAX_COMPARISON_ITEMS, Phase, Progress, View,
    models::{risk_description, risk_label},
};
use std::fmt::Write;

const BAR_WIDTH: usize = 20;

pub fn render(view: View, state: &DashboardState) -> String {
    match view {
        View::Query => render_query(state),
        View::Result => render_result(state),
        View::History => render_history(state),
        View::Compare => render_compare(state),
        View::Evaluation => render_evaluation(),
        View::Architecture => render_architecture(),
    }
}

pub fn progress_bar(progress: &Progress) -> String {
    let filled = BAR_WIDTH * usize::from(progress.percent.min(100)) / 100;
    let bar = format!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        progress.percent,
        progress.label
    );
    bar.trim_end().to_string()
}

fn percent(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

/// Sample questions with the risk level the service usually assigns them
const SAMPLE_QUESTIONS: [(&str, &str); 4] = [
    ("What are the interactions between aspirin and warfarin?", "HIGH"),
    ("Can I take metformin with insulin?", "MODERATE"),
    ("Is grapefruit juice safe with statins?", "HIGH"),
    ("Can I take vitamin C with aspirin?", "LOW"),
];

fn render_query(state: &DashboardState) -> String {
    let mut out = String::from("Ask about a drug interaction with `ask <question>`.\n\nTry these:\n");
    for (question, risk) in SAMPLE_QUESTIONS {
        let _ = writeln!(out, "  {:<9} {}", risk, question);
    }
    out.push('\n');

    let status = match state.phase {
        Phase::Idle => "ready",
        Phase::Submitting => "analyzing",
        Phase::Succeeded => "last analysis succeeded",
        Phase::Failed => "last analysis failed",
    };
    let _ = writeln!(out, "Status: {}", status);
    if !state.progress.is_idle() {
        let _ = writeln!(out, "{}", progress_bar(&state.progress));
    }

    match &state.stats {
        Some(stats) => {
            let _ = writeln!(out, "\nTotal queries: {}", stats.total_queries);
            for (risk, count) in &stats.risk_distribution {
                let _ = writeln!(out, "  {:<10} {}", risk, count);
            }
            if let Some(system) = &stats.system_type {
                let _ = writeln!(out, "System: {}", system);
            }
        }
        None => out.push_str("\nStatistics unavailable\n"),
    }
    out
}

fn render_analysis(out: &mut String, result: &AnalysisResult) {
    let _ = writeln!(out, "Question: {}", result.query);
    let _ = writeln!(
        out,
        "Risk: {} - {}",
        result.risk_label(),
        risk_description(result.risk_score.as_ref())
    );
    let _ = writeln!(
        out,
        "Confidence: {}   Documents retrieved: {}",
        percent(result.grounding_score),
        result.num_retrieved_docs
    );
}

fn render_result(state: &DashboardState) -> String {
    let Some(result) = &state.current_result else {
        return "No analysis yet. Submit a question with `ask <question>`.\n".to_string();
    };

    let mut out = String::new();
    render_analysis(&mut out, result);
    let _ = write!(out, "\n{}\n", result.response);

    if !result.citations.is_empty() {
        let _ = writeln!(out, "\nSources ({}):", result.citations.len());
        for (index, citation) in result.citations.iter().enumerate() {
            let _ = writeln!(
                out,
                "  [{}] {} ({}, relevance {:.1}%)",
                index + 1,
                citation.drug_name,
                citation.source,
                citation.relevance_score * 100.0
            );
        }
    }
    if !result.sub_queries.is_empty() {
        out.push_str("\nQuery breakdown:\n");
        for (index, sub_query) in result.sub_queries.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", index + 1, sub_query);
        }
    }
    out
}

fn render_history(state: &DashboardState) -> String {
    if state.history.is_empty() {
        return "No queries yet\n".to_string();
    }

    let mut out = String::new();
    for (index, entry) in state.history.iter().enumerate() {
        let marker = if state.comparison.contains(&entry.id) { "*" } else { " " };
        let _ = writeln!(
            out,
            "{}{:>2}. {:<9} {}  ({})",
            marker,
            index + 1,
            risk_label(entry.risk_score.as_ref()),
            entry.query,
            entry.timestamp
        );
    }
    out.push_str("\n`compare add <n>` adds an entry to the comparison\n");
    out
}

fn render_compare(state: &DashboardState) -> String {
    let mut out = format!(
        "Comparison ({}/{})\n",
        state.comparison.len(),
        MAX_COMPARISON_ITEMS
    );
    if state.comparison.is_empty() {
        out.push_str("Nothing selected. Use `compare add` to pick results.\n");
        return out;
    }

    for item in state.comparison.items() {
        let _ = writeln!(out, "\n[{}]", item.id);
        render_analysis(&mut out, item);
        let _ = writeln!(out, "Sources: {}", item.citations.len());
    }
    out
}

fn render_evaluation() -> String {
    "No evaluation data available\n".to_string()
}

fn render_architecture() -> String {
    [
        "Analysis pipeline (runs in the analysis service):",
        "  1. Query decomposition - splits the question into focused sub-queries",
        "  2. Retrieval           - semantic search over the drug database",
        "  3. Re-ranking          - orders retrieved evidence by relevance",
        "  4. Answer generation   - writes a response grounded in the evidence",
        "  5. Risk scoring        - labels the interaction LOW to CRITICAL",
        "",
        "This client submits questions, shows results and keeps the comparison set.",
        "",
    ]
    .join("\n")
}

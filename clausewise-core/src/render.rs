//! Plain-text rendering of the view model.
//!
//! Markdown bodies are printed as-is.

use std::fmt::Write as _;

use crate::dashboard::DashboardSnapshot;
use crate::types::{AnalysisResult, DisplayTab};

/// What to print below the risk summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabSelection {
    One(DisplayTab),
    All,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub show_risk_level: bool,
    pub tabs: TabSelection,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_risk_level: true,
            tabs: TabSelection::One(DisplayTab::Analysis),
        }
    }
}

/// One-line risk summary, e.g. `Overall risk: 7.2 / 10 (high)`.
pub fn risk_summary(result: &AnalysisResult, show_level: bool) -> String {
    if show_level {
        format!(
            "Overall risk: {:.1} / 10 ({})",
            result.risk_score,
            result.risk_level()
        )
    } else {
        format!("Overall risk: {:.1} / 10", result.risk_score)
    }
}

pub fn render_result(result: &AnalysisResult, options: &RenderOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", risk_summary(result, options.show_risk_level));

    let tabs: Vec<DisplayTab> = match options.tabs {
        TabSelection::One(tab) => vec![tab],
        TabSelection::All => DisplayTab::ALL.to_vec(),
    };
    for tab in tabs {
        let _ = writeln!(out);
        let _ = writeln!(out, "== {} ==", tab.title());
        let body = result.section(tab).trim_end();
        if body.is_empty() {
            let _ = writeln!(out, "(empty)");
        } else {
            let _ = writeln!(out, "{body}");
        }
    }
    out
}

/// Header describing the selector and state, followed by the result if any.
pub fn render_snapshot(snapshot: &DashboardSnapshot, options: &RenderOptions) -> String {
    let mut out = String::new();
    let _ = write!(out, "Analysis: {}", snapshot.kind);
    if snapshot.kind.is_custom() && !snapshot.custom_query.trim().is_empty() {
        let _ = write!(out, ": \"{}\"", snapshot.custom_query.trim());
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "State: {}", snapshot.state);
    match &snapshot.result {
        Some(result) => {
            let _ = writeln!(out);
            out.push_str(&render_result(result, options));
        }
        None => {
            let _ = writeln!(out, "No stored result for this selection.");
        }
    }
    out
}

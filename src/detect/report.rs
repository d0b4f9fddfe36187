//! Evaluation result formatting.

use super::{Outcome, ScenarioClass, TraceStep};

fn delay_text(delay: Option<f64>) -> String {
    match delay {
        Some(d) => format!("{} min", d),
        None => "never".to_string(),
    }
}

/// Format an evaluation outcome as a one-line summary.
pub fn format_summary(scenario: ScenarioClass, outcome: &Outcome) -> String {
    let mut summary = format!(
        "scenario {}: detection {}, diagnosis {} ({} sample{})",
        scenario,
        delay_text(outcome.report.detection_delay_minutes),
        delay_text(outcome.report.diagnosis_delay_minutes),
        outcome.samples_evaluated,
        if outcome.samples_evaluated == 1 { "" } else { "s" },
    );

    if outcome.cancelled {
        summary.push_str(", cancelled");
    }

    summary
}

/// Format one trace step as a fixed-width table row.
pub fn format_step(step: &TraceStep) -> String {
    let mut flags = String::new();
    if step.state.anomaly_detected() {
        flags.push('D');
    }
    if step.state.diagnosis_confirmed() {
        flags.push('C');
    }
    format!(
        "{:>8.1} | {:>6.3} | {:>5} | {:>6} | {}",
        step.sample.elapsed_minutes,
        step.sample.detector_score,
        step.diagnosed_class,
        step.state.consecutive_match_count(),
        flags,
    )
}

use std::fmt::Write;
use tracker::coordinator::ResolutionState;
use tracker::normalize::TrackingKey;
use tracker::types::{TrackingRecord, TrackingStep};

pub fn not_found(code: &TrackingKey) -> String {
    format!("Tracking not found for code {code}. Check the code and try again.")
}

pub fn state(state: &ResolutionState) -> String {
    match state {
        ResolutionState::Idle => String::new(),
        ResolutionState::Pending {
            code,
            previous: None,
        } => format!("Looking up {code}..."),
        ResolutionState::Pending {
            previous: Some(record),
            ..
        } => format!("{}(checking for updates...)\n", record_details(record)),
        ResolutionState::Resolved(record) => record_details(record),
        ResolutionState::NotFound { code } => not_found(code),
    }
}

pub fn record_details(record: &TrackingRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}  {}", record.code, record.status);
    // Fall back to the current step's location.
    let location = record
        .current_location
        .as_deref()
        .or_else(|| record.current_step().map(|step| step.location.as_str()));
    if let Some(location) = location {
        let _ = writeln!(out, "  Currently at: {location}");
    }
    let _ = writeln!(out, "  From: {}", record.origin);
    let _ = writeln!(out, "  To: {}", record.destination);
    let _ = writeln!(out, "  Estimated delivery: {}", record.estimated_delivery);
    for step in &record.steps {
        let _ = writeln!(out, "{}", step_line(step));
    }
    out
}

pub fn summary_line(record: &TrackingRecord) -> String {
    format!("{}\t{}\t{} -> {}", record.code, record.status, record.origin, record.destination)
}

fn step_line(step: &TrackingStep) -> String {
    let marker = if step.is_current {
        '>'
    } else if step.is_completed {
        'x'
    } else {
        ' '
    };
    format!(
        "  [{marker}] {} {}  {} ({})",
        step.date, step.time, step.status, step.location
    )
}

use crate::normalize::TrackingKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Placeholder shown for a date or time that is not known yet.
pub const UNKNOWN: &str = "-";

/// One milestone in a shipment's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStep {
    pub id: String,
    pub status: String,
    pub location: String,
    pub date: String,
    pub time: String,
    pub is_completed: bool,
    pub is_current: bool,
}

impl TrackingStep {
    pub fn new<I, S, L>(id: I, status: S, location: L) -> Self
    where
        I: Into<String>,
        S: Into<String>,
        L: Into<String>,
    {
        TrackingStep {
            id: id.into(),
            status: status.into(),
            location: location.into(),
            date: UNKNOWN.into(),
            time: UNKNOWN.into(),
            is_completed: false,
            is_current: false,
        }
    }

    pub fn at<D, T>(mut self, date: D, time: T) -> Self
    where
        D: Into<String>,
        T: Into<String>,
    {
        self.date = date.into();
        self.time = time.into();
        self
    }

    pub fn completed(mut self) -> Self {
        self.is_completed = true;
        self
    }

    pub fn current(mut self) -> Self {
        self.is_current = true;
        self
    }
}

/// The full tracking state of one shipment. The code is its only identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub code: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_location: Option<String>,
    pub origin: String,
    pub destination: String,
    pub estimated_delivery: String,
    pub steps: Vec<TrackingStep>,
}

impl TrackingRecord {
    pub fn key(&self) -> TrackingKey {
        TrackingKey::new(&self.code)
    }

    /// Returns the step currently in progress, if any.
    pub fn current_step(&self) -> Option<&TrackingStep> {
        self.steps.iter().find(|step| step.is_current)
    }

    /// Checks the step sequence: ids are unique, at most one step is current,
    /// everything before it is completed and nothing after it is flagged.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.key().is_empty() {
            return Err(RecordError::EmptyCode);
        }

        let mut ids = HashSet::new();
        for step in &self.steps {
            if !ids.insert(step.id.as_str()) {
                return Err(RecordError::DuplicateStepId(step.id.clone()));
            }
        }

        let current: Vec<usize> = self
            .steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.is_current)
            .map(|(idx, _)| idx)
            .collect();

        let current_idx = match current.as_slice() {
            [] => return Ok(()),
            [idx] => *idx,
            _ => return Err(RecordError::MultipleCurrentSteps),
        };

        for step in &self.steps[..current_idx] {
            if !step.is_completed {
                return Err(RecordError::IncompleteBeforeCurrent(step.id.clone()));
            }
        }

        for step in &self.steps[current_idx + 1..] {
            if step.is_completed || step.is_current {
                return Err(RecordError::FlaggedAfterCurrent(step.id.clone()));
            }
        }

        Ok(())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("tracking code is empty")]
    EmptyCode,
    #[error("duplicate step id: {0}")]
    DuplicateStepId(String),
    #[error("more than one step is marked as current")]
    MultipleCurrentSteps,
    #[error("step {0} comes before the current step but is not completed")]
    IncompleteBeforeCurrent(String),
    #[error("step {0} comes after the current step but is flagged")]
    FlaggedAfterCurrent(String),
}

#[cfg(test)]
pub(crate) fn two_step_record(code: &str) -> TrackingRecord {
    TrackingRecord {
        code: code.into(),
        status: "Postado".into(),
        current_location: Some("Curitiba, PR".into()),
        origin: "Curitiba, PR".into(),
        destination: "Porto Alegre, RS".into(),
        estimated_delivery: "10/03/2026".into(),
        steps: vec![
            TrackingStep::new("1", "Pedido Recebido", "Curitiba, PR")
                .at("08/03/2026", "09:15")
                .completed(),
            TrackingStep::new("2", "Postado", "Curitiba, PR - Agência").current(),
        ],
    }
}

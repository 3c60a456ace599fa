use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Display;

/// Recommendation funnel events recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    ChecklistSubmitted,
    RecoGenerated,
    RecoShown,
    RecoItemSelected,
    RecoFeedbackSubmitted,
    RecoCompleted,
    RecoError,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::ChecklistSubmitted => "CHECKLIST_SUBMITTED",
            AuditEventType::RecoGenerated => "RECO_GENERATED",
            AuditEventType::RecoShown => "RECO_SHOWN",
            AuditEventType::RecoItemSelected => "RECO_ITEM_SELECTED",
            AuditEventType::RecoFeedbackSubmitted => "RECO_FEEDBACK_SUBMITTED",
            AuditEventType::RecoCompleted => "RECO_COMPLETED",
            AuditEventType::RecoError => "RECO_ERROR",
        }
    }
}

impl Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub payload: Map<String, Value>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            payload: Map::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

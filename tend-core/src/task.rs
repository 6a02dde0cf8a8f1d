//! Task model shared by the recurrence and deferral passes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recurrence::RecurrenceRule;

/// Core task type.
///
/// Note: we keep this small + serializable. How it is stored is the store layer's business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,

    /// Only the local calendar day is significant to the engines.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed: bool,

    /// Hidden from the primary list until promoted.
    #[serde(default)]
    pub is_for_later: bool,

    #[serde(default)]
    pub recurring: Option<RecurrenceRule>,

    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            deadline: None,
            completed: false,
            is_for_later: false,
            recurring: None,
            project_id: None,
            context_id: None,
            notes: None,
            created_at,
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn for_later(mut self) -> Self {
        self.is_for_later = true;
        self
    }

    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurring = Some(rule);
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Whether the task belongs on the primary list.
    pub fn is_visible(&self) -> bool {
        !self.is_for_later
    }

    pub fn is_recurring(&self) -> bool {
        self.recurring.is_some()
    }
}

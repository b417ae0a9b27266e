use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::DteType;

/// Where a document stands on its way to the tax authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    Built,
    Signed,
    Submitted,
    /// Transport accepted, no final verdict yet.
    PendingConfirmation,
    Accepted,
    Rejected,
    Failed,
}

impl LifecycleState {
    /// Terminal states never transition again; a folio in a terminal
    /// state is settled for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Accepted | LifecycleState::Rejected | LifecycleState::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub state: LifecycleState,
    pub at: DateTime<Utc>,
}

/// The audit trail for one issued folio. One record per document,
/// created when the folio is bound and updated on every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub dte_type: DteType,
    pub folio: u64,
    pub track_id: Option<String>,
    pub state: LifecycleState,
    /// Raw body of the last gateway response, kept for forensics.
    pub last_response: Option<String>,
    pub error: Option<String>,
    pub transitions: Vec<Transition>,
}

impl SubmissionRecord {
    pub fn new(dte_type: DteType, folio: u64) -> Self {
        let mut record = Self {
            dte_type,
            folio,
            track_id: None,
            state: LifecycleState::Built,
            last_response: None,
            error: None,
            transitions: Vec::new(),
        };
        record.transitions.push(Transition {
            state: LifecycleState::Built,
            at: Utc::now(),
        });
        record
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub(crate) fn advance(&mut self, state: LifecycleState) {
        self.state = state;
        self.transitions.push(Transition {
            state,
            at: Utc::now(),
        });
    }

    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        self.error = Some(reason.into());
        self.advance(LifecycleState::Failed);
    }
}

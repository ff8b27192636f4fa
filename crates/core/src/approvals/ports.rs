use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::approval::{
    ActorId, ApprovalCase, ApprovalLineTemplate, ApproverRule, CaseContext, CaseId, CaseRecord,
    HistoryEntry, TemplateId,
};
use crate::numbering::SequenceKind;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("case `{0}` was modified by a concurrent operation")]
    Conflict(CaseId),
    #[error("an active case already references {reference_type}/{reference_id}")]
    DuplicateReference { reference_type: String, reference_id: String },
    #[error("store backend failure: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("outcome endpoint `{endpoint}` unreachable: {message}")]
    Unreachable { endpoint: String, message: String },
    #[error("outcome endpoint `{endpoint}` refused notification with status {status}")]
    Refused { endpoint: String, status: u16 },
}

/// Read-only source of approval line templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn resolve_template(
        &self,
        id: &TemplateId,
    ) -> Result<Option<ApprovalLineTemplate>, StoreError>;
}

/// Maps a step's resolution rule onto a concrete approver. Must not have side effects.
#[async_trait]
pub trait ApproverResolver: Send + Sync {
    async fn resolve(
        &self,
        rule: ApproverRule,
        approver_ref: &str,
        context: &CaseContext,
    ) -> Result<Option<ActorId>, StoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

/// Terminal result delivered to the document a case governs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeNotice {
    pub reference_type: String,
    pub reference_id: String,
    pub outcome: Outcome,
    pub case_id: CaseId,
    pub case_number: String,
    pub decided_by: Option<ActorId>,
    pub decided_at: DateTime<Utc>,
}

impl OutcomeNotice {
    pub fn for_case(case: &ApprovalCase, outcome: Outcome, decided_at: DateTime<Utc>) -> Self {
        let decided_by = match outcome {
            Outcome::Completed => case.final_approver.clone(),
            Outcome::Rejected => case.current_approver.clone(),
        };

        Self {
            reference_type: case.reference_type.clone(),
            reference_id: case.reference_id.clone(),
            outcome,
            case_id: case.id.clone(),
            case_number: case.case_number.clone(),
            decided_by,
            decided_at,
        }
    }
}

#[async_trait]
pub trait OutcomeDispatcher: Send + Sync {
    async fn notify(&self, notice: &OutcomeNotice) -> Result<(), DispatchError>;
}

/// One atomic mutation of a case and its history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaseWrite {
    Insert {
        case: ApprovalCase,
        history: Vec<HistoryEntry>,
    },
    /// `case.version` must already be `expected_version + 1`.
    Update {
        case: ApprovalCase,
        expected_version: u32,
        settled: Option<HistoryEntry>,
        appended: Vec<HistoryEntry>,
    },
}

impl CaseWrite {
    pub fn case(&self) -> &ApprovalCase {
        match self {
            Self::Insert { case, .. } | Self::Update { case, .. } => case,
        }
    }
}

/// A write that has been applied inside an open unit of work.
///
/// Dropping it without calling [`StagedWrite::commit`] discards the write.
#[async_trait]
pub trait StagedWrite: Send {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CaseRepository: Send + Sync {
    async fn next_sequence(&self, kind: SequenceKind) -> Result<u64, StoreError>;

    async fn find_case(&self, id: &CaseId) -> Result<Option<CaseRecord>, StoreError>;

    async fn find_active_by_reference(
        &self,
        reference_type: &str,
        reference_id: &str,
    ) -> Result<Option<ApprovalCase>, StoreError>;

    async fn list_awaiting(&self, actor: &ActorId) -> Result<Vec<CaseRecord>, StoreError>;

    async fn list_drafted_by(&self, actor: &ActorId) -> Result<Vec<CaseRecord>, StoreError>;

    async fn list_decided_by(&self, actor: &ActorId) -> Result<Vec<CaseRecord>, StoreError>;

    /// Applies `write` without making it visible. Version or reference conflicts are
    /// reported here, before any side effect runs.
    async fn stage(&self, write: CaseWrite) -> Result<Box<dyn StagedWrite>, StoreError>;
}

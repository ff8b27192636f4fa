use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Actor recorded on history rows the engine settles on its own (skipped optional steps).
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Draft,
    Review,
    Approve,
    Final,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Approve => "approve",
            Self::Final => "final",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "review" => Some(Self::Review),
            "approve" => Some(Self::Approve),
            "final" => Some(Self::Final),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverRule {
    FixedUser,
    DepartmentHead,
    PositionHolder,
}

impl ApproverRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedUser => "fixed_user",
            Self::DepartmentHead => "department_head",
            Self::PositionHolder => "position_holder",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed_user" => Some(Self::FixedUser),
            "department_head" => Some(Self::DepartmentHead),
            "position_holder" => Some(Self::PositionHolder),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateStep {
    pub order: u32,
    pub name: String,
    pub step_type: StepType,
    pub approver_rule: ApproverRule,
    pub approver_ref: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TemplateViolation {
    #[error("template `{0}` has no steps")]
    Empty(TemplateId),
    #[error("template `{template_id}` step orders must be contiguous from 1 (expected {expected}, found {found})")]
    NonContiguous { template_id: TemplateId, expected: u32, found: u32 },
    #[error("template `{template_id}` must start with a draft step (found {found:?})")]
    FirstStepNotDraft { template_id: TemplateId, found: StepType },
}

/// Reusable, ordered approval line. Resolved by value; the engine never mutates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLineTemplate {
    pub id: TemplateId,
    pub work_type: String,
    pub name: String,
    pub steps: Vec<TemplateStep>,
}

impl ApprovalLineTemplate {
    pub fn step_count(&self) -> u32 {
        u32::try_from(self.steps.len()).unwrap_or(u32::MAX)
    }

    pub fn step(&self, order: u32) -> Option<&TemplateStep> {
        self.steps.iter().find(|step| step.order == order)
    }

    /// Steps sorted by order, checked for contiguity and a leading draft step.
    pub fn validate(&self) -> Result<(), TemplateViolation> {
        if self.steps.is_empty() {
            return Err(TemplateViolation::Empty(self.id.clone()));
        }

        let mut orders: Vec<&TemplateStep> = self.steps.iter().collect();
        orders.sort_by_key(|step| step.order);

        for (index, step) in orders.iter().enumerate() {
            let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
            if step.order != expected {
                return Err(TemplateViolation::NonContiguous {
                    template_id: self.id.clone(),
                    expected,
                    found: step.order,
                });
            }
        }

        let first = orders[0];
        if first.step_type != StepType::Draft {
            return Err(TemplateViolation::FirstStepNotDraft {
                template_id: self.id.clone(),
                found: first.step_type,
            });
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Draft,
    InProgress,
    Completed,
    Rejected,
    Withdrawn,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            "withdrawn" => Some(Self::Withdrawn),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Withdrawn)
    }

    pub fn accepts_actions(&self) -> bool {
        matches!(self, Self::Draft | Self::InProgress)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// What happened (or is awaited) on a history row.
///
/// `Pending` marks the single row waiting on the current approver; `Draft` only ever
/// records the drafting act on step 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCode {
    Draft,
    Pending,
    Approve,
    Reject,
    Withdraw,
    Forward,
}

impl ActionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Withdraw => "withdraw",
            Self::Forward => "forward",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "withdraw" => Some(Self::Withdraw),
            "forward" => Some(Self::Forward),
            _ => None,
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(self, Self::Approve | Self::Reject)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalCase {
    pub id: CaseId,
    pub case_number: String,
    pub template_id: TemplateId,
    pub reference_type: String,
    pub reference_id: String,
    pub drafter: ActorId,
    pub current_step_order: u32,
    pub total_steps: u32,
    pub current_approver: Option<ActorId>,
    pub final_approver: Option<ActorId>,
    pub status: CaseStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub reject_reason: Option<String>,
    pub version: u32,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalCase {
    /// Order of the step whose decision is outstanding.
    pub fn awaiting_step_order(&self) -> u32 {
        self.current_step_order + 1
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub case_id: CaseId,
    pub step_order: u32,
    pub step_name: String,
    pub step_type: StepType,
    pub actor: ActorId,
    pub action: ActionCode,
    pub acted_at: DateTime<Utc>,
    pub comment: Option<String>,
    pub delegate_from: Option<ActorId>,
}

impl HistoryEntry {
    pub fn is_pending(&self) -> bool {
        self.action == ActionCode::Pending
    }
}

/// A case together with its full history, ordered by allocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case: ApprovalCase,
    pub history: Vec<HistoryEntry>,
}

impl CaseRecord {
    pub fn pending_entry(&self) -> Option<&HistoryEntry> {
        let awaiting = self.case.awaiting_step_order();
        self.history.iter().find(|entry| entry.step_order == awaiting && entry.is_pending())
    }

    pub fn pending_count(&self) -> usize {
        self.history.iter().filter(|entry| entry.is_pending()).count()
    }
}

/// What an approver resolver gets to see about the case being routed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseContext {
    pub template_id: TemplateId,
    pub reference_type: String,
    pub reference_id: String,
    pub drafter: ActorId,
}

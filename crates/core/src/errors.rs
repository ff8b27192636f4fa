use thiserror::Error;

use crate::approvals::ports::{DispatchError, StoreError};
use crate::domain::approval::{ActorId, CaseId, CaseStatus, TemplateId, TemplateViolation};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("template `{0}` not found")]
    TemplateNotFound(TemplateId),
    #[error("case `{0}` not found")]
    CaseNotFound(CaseId),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("actor `{actor}` may not {action} case `{case_id}`")]
    Authorization { case_id: CaseId, actor: ActorId, action: &'static str },
    #[error("case `{case_id}` is not processable in status {status:?}")]
    NotProcessable { case_id: CaseId, status: CaseStatus },
    #[error("case `{case_id}` has no pending history at step {step_order}")]
    HistoryMissing { case_id: CaseId, step_order: u32 },
    #[error("an active case already references {reference_type}/{reference_id}")]
    DuplicateCase { reference_type: String, reference_id: String },
    #[error("case `{0}` was modified by a concurrent operation")]
    Conflict(CaseId),
    #[error("outcome dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<StoreError> for ApprovalError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(case_id) => Self::Conflict(case_id),
            StoreError::DuplicateReference { reference_type, reference_id } => {
                Self::DuplicateCase { reference_type, reference_id }
            }
            StoreError::Backend(message) => Self::Persistence(message),
        }
    }
}

impl From<TemplateViolation> for ApprovalError {
    fn from(value: TemplateViolation) -> Self {
        Self::Validation(value.to_string())
    }
}

impl ApprovalError {
    /// Stable machine-readable class used in logs and API payloads.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::TemplateNotFound(_) | Self::CaseNotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Authorization { .. } => "authorization",
            Self::NotProcessable { .. } => "state",
            Self::HistoryMissing { .. } => "integrity",
            Self::DuplicateCase { .. } => "duplicate_case",
            Self::Conflict(_) => "conflict",
            Self::Dispatch(_) => "dispatch",
            Self::Persistence(_) => "persistence",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let error_class = self.error_class();
        let message = self.to_string();

        let kind = match self {
            Self::TemplateNotFound(_) | Self::CaseNotFound(_) => InterfaceErrorKind::NotFound,
            Self::Validation(_) => InterfaceErrorKind::BadRequest,
            Self::Authorization { .. } => InterfaceErrorKind::Forbidden,
            Self::NotProcessable { .. }
            | Self::HistoryMissing { .. }
            | Self::DuplicateCase { .. }
            | Self::Conflict(_) => InterfaceErrorKind::Conflict,
            Self::Dispatch(_) => InterfaceErrorKind::BadGateway,
            Self::Persistence(_) => InterfaceErrorKind::ServiceUnavailable,
        };

        InterfaceError { kind, error_class, message, correlation_id }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceErrorKind {
    NotFound,
    BadRequest,
    Forbidden,
    Conflict,
    BadGateway,
    ServiceUnavailable,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{error_class}: {message}")]
pub struct InterfaceError {
    pub kind: InterfaceErrorKind,
    pub error_class: &'static str,
    pub message: String,
    pub correlation_id: String,
}

impl InterfaceError {
    pub fn status_code(&self) -> u16 {
        match self.kind {
            InterfaceErrorKind::NotFound => 404,
            InterfaceErrorKind::BadRequest => 400,
            InterfaceErrorKind::Forbidden => 403,
            InterfaceErrorKind::Conflict => 409,
            InterfaceErrorKind::BadGateway => 502,
            InterfaceErrorKind::ServiceUnavailable => 503,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self.kind {
            InterfaceErrorKind::NotFound => "The requested approval record does not exist.",
            InterfaceErrorKind::BadRequest => {
                "The request could not be processed. Check inputs and try again."
            }
            InterfaceErrorKind::Forbidden => "You are not allowed to act on this approval.",
            InterfaceErrorKind::Conflict => {
                "The approval is no longer in a state that allows this action."
            }
            InterfaceErrorKind::BadGateway => {
                "The originating document could not be notified; nothing was changed."
            }
            InterfaceErrorKind::ServiceUnavailable => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }
}

pub mod approvals;
pub mod config;
pub mod domain;
pub mod errors;
pub mod numbering;

pub use approvals::{
    ApprovalEngine, ApproverResolver, CaseRepository, CaseWrite, CreateCaseRequest, Decision,
    DecisionRequest, DispatchError, Outcome, OutcomeDispatcher, OutcomeNotice,
    RecordingOutcomeDispatcher, StagedWrite, StaticApproverResolver, StoreError, TemplateStore,
    TracingOutcomeDispatcher,
};
pub use domain::approval::{
    ActionCode, ActorId, ApprovalCase, ApprovalLineTemplate, ApproverRule, CaseId, CaseRecord,
    CaseStatus, HistoryEntry, HistoryId, Priority, StepType, TemplateId, TemplateStep,
};
pub use errors::{ApprovalError, InterfaceError, InterfaceErrorKind};

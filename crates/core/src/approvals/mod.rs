pub mod dispatch;
pub mod engine;
pub mod ports;
pub mod resolver;

pub use dispatch::{RecordingOutcomeDispatcher, TracingOutcomeDispatcher};
pub use engine::{ApprovalEngine, CreateCaseRequest, Decision, DecisionRequest};
pub use ports::{
    ApproverResolver, CaseRepository, CaseWrite, DispatchError, Outcome, OutcomeDispatcher,
    OutcomeNotice, StagedWrite, StoreError, TemplateStore,
};
pub use resolver::StaticApproverResolver;

//! Approval workflow engine.
//!
//! Every mutating operation follows the same shape: load the case, check preconditions in a
//! fixed order, compute the next case state and history rows, stage them in one unit of work,
//! run the outcome dispatch (if the case just reached Completed/Rejected), then commit. A
//! failed dispatch drops the staged write, so the case and its history stay untouched.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::approvals::ports::{
    ApproverResolver, CaseRepository, CaseWrite, Outcome, OutcomeDispatcher, OutcomeNotice,
    TemplateStore,
};
use crate::domain::approval::{
    ActionCode, ActorId, ApprovalCase, ApprovalLineTemplate, CaseContext, CaseId, CaseRecord,
    CaseStatus, HistoryEntry, Priority, TemplateId, TemplateStep, SYSTEM_ACTOR,
};
use crate::errors::ApprovalError;
use crate::numbering::{self, SequenceKind};

const FORWARD_COMMENT: &str = "no approver resolved for optional step";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCaseRequest {
    pub template_id: TemplateId,
    pub reference_type: String,
    pub reference_id: String,
    pub drafter: ActorId,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    fn action(&self) -> ActionCode {
        match self {
            Self::Approve => ActionCode::Approve,
            Self::Reject => ActionCode::Reject,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub case_id: CaseId,
    pub actor: ActorId,
    pub decision: Decision,
    pub comment: Option<String>,
}

/// Steps walked while looking for the next approver.
struct Route {
    forwarded: Vec<TemplateStep>,
    next: Option<(TemplateStep, ActorId)>,
}

#[derive(Clone)]
pub struct ApprovalEngine {
    cases: Arc<dyn CaseRepository>,
    templates: Arc<dyn TemplateStore>,
    resolver: Arc<dyn ApproverResolver>,
    dispatcher: Arc<dyn OutcomeDispatcher>,
}

impl ApprovalEngine {
    pub fn new(
        cases: Arc<dyn CaseRepository>,
        templates: Arc<dyn TemplateStore>,
        resolver: Arc<dyn ApproverResolver>,
        dispatcher: Arc<dyn OutcomeDispatcher>,
    ) -> Self {
        Self { cases, templates, resolver, dispatcher }
    }

    /// Instantiates a case for a reference document.
    ///
    /// Step 1 is recorded as the drafter's own act. If a later step resolves to an approver
    /// the case waits on it; a template with nothing after the draft completes immediately
    /// and notifies the referenced document.
    pub async fn create_case(
        &self,
        request: CreateCaseRequest,
    ) -> Result<CaseRecord, ApprovalError> {
        validate_create_request(&request)?;
        let template = self.load_template(&request.template_id).await?;

        if let Some(active) = self
            .cases
            .find_active_by_reference(&request.reference_type, &request.reference_id)
            .await?
        {
            warn!(
                event_name = "approval.case.duplicate_reference",
                case_id = %active.id,
                reference_type = %request.reference_type,
                reference_id = %request.reference_id,
                "reference already governed by an active case"
            );
            return Err(ApprovalError::DuplicateCase {
                reference_type: request.reference_type,
                reference_id: request.reference_id,
            });
        }

        let context = CaseContext {
            template_id: template.id.clone(),
            reference_type: request.reference_type.clone(),
            reference_id: request.reference_id.clone(),
            drafter: request.drafter.clone(),
        };
        let total_steps = template.step_count();
        let route = self.route_from(&template, 2, total_steps, &context).await?;
        let draft_step = template.step(1).cloned().ok_or_else(|| {
            ApprovalError::Validation(format!("template `{}` has no draft step", template.id))
        })?;

        let now = Utc::now();
        let case_id = numbering::case_id(self.cases.next_sequence(SequenceKind::Case).await?);
        let number_sequence =
            self.cases.next_sequence(SequenceKind::CaseNumber { year: now.year() }).await?;

        let mut case = ApprovalCase {
            id: case_id,
            case_number: numbering::case_number(now.year(), number_sequence),
            template_id: template.id.clone(),
            reference_type: request.reference_type,
            reference_id: request.reference_id,
            drafter: request.drafter.clone(),
            current_step_order: 1,
            total_steps,
            current_approver: None,
            final_approver: None,
            status: CaseStatus::Draft,
            priority: request.priority,
            created_at: now,
            completed_at: None,
            rejected_at: None,
            withdrawn_at: None,
            reject_reason: None,
            version: 1,
            updated_at: now,
        };

        let mut history = vec![
            self.history_entry(&case.id, &draft_step, &request.drafter, ActionCode::Draft, now, None)
                .await?,
        ];
        history.extend(self.forward_entries(&mut case, &route.forwarded, now).await?);

        let outcome = match route.next {
            Some((step, approver)) => {
                history.push(
                    self.history_entry(&case.id, &step, &approver, ActionCode::Pending, now, None)
                        .await?,
                );
                case.current_approver = Some(approver);
                case.status = CaseStatus::InProgress;
                None
            }
            None => {
                case.current_step_order = case.total_steps;
                case.status = CaseStatus::Completed;
                case.completed_at = Some(now);
                Some(Outcome::Completed)
            }
        };

        self.commit(CaseWrite::Insert { case: case.clone(), history: history.clone() }, outcome, now)
            .await?;

        info!(
            event_name = "approval.case.created",
            case_id = %case.id,
            case_number = %case.case_number,
            template_id = %case.template_id,
            reference_type = %case.reference_type,
            reference_id = %case.reference_id,
            drafter = %case.drafter,
            status = case.status.as_str(),
            "approval case created"
        );

        Ok(CaseRecord { case, history })
    }

    /// Applies an approve/reject decision from the current approver.
    ///
    /// Preconditions are checked in order: case exists, case accepts actions, actor is the
    /// current approver, the pending history row exists.
    pub async fn process_decision(
        &self,
        request: DecisionRequest,
    ) -> Result<CaseRecord, ApprovalError> {
        let record = self.load_case(&request.case_id).await?;

        if !record.case.status.accepts_actions() {
            warn!(
                event_name = "approval.decision.not_processable",
                case_id = %record.case.id,
                actor = %request.actor,
                status = record.case.status.as_str(),
                "decision rejected: case is not processable"
            );
            return Err(ApprovalError::NotProcessable {
                case_id: record.case.id,
                status: record.case.status,
            });
        }

        if record.case.current_approver.as_ref() != Some(&request.actor) {
            warn!(
                event_name = "approval.decision.unauthorized",
                case_id = %record.case.id,
                actor = %request.actor,
                "decision rejected: actor is not the current approver"
            );
            return Err(ApprovalError::Authorization {
                case_id: record.case.id,
                actor: request.actor,
                action: "decide",
            });
        }

        let Some(pending) = record.pending_entry().cloned() else {
            error!(
                event_name = "approval.integrity.history_missing",
                case_id = %record.case.id,
                step_order = record.case.awaiting_step_order(),
                "pending history row missing for an active case"
            );
            return Err(ApprovalError::HistoryMissing {
                case_id: record.case.id.clone(),
                step_order: record.case.awaiting_step_order(),
            });
        };

        let now = Utc::now();
        let mut settled = pending;
        settled.action = request.decision.action();
        settled.acted_at = now;
        settled.comment = request.comment.clone();

        let CaseRecord { mut case, mut history } = record;
        let expected_version = case.version;
        case.version = expected_version + 1;
        case.updated_at = now;

        let mut appended = Vec::new();
        let outcome = match request.decision {
            Decision::Approve => {
                let template = self.load_template(&case.template_id).await?;
                let context = context_for(&case);
                let route = self
                    .route_from(&template, settled.step_order + 1, case.total_steps, &context)
                    .await?;

                case.current_step_order = settled.step_order;
                appended.extend(self.forward_entries(&mut case, &route.forwarded, now).await?);

                match route.next {
                    Some((step, approver)) => {
                        appended.push(
                            self.history_entry(
                                &case.id,
                                &step,
                                &approver,
                                ActionCode::Pending,
                                now,
                                None,
                            )
                            .await?,
                        );
                        case.current_approver = Some(approver);
                        case.status = CaseStatus::InProgress;
                        None
                    }
                    None => {
                        case.current_step_order = case.total_steps;
                        case.status = CaseStatus::Completed;
                        case.completed_at = Some(now);
                        case.final_approver = Some(request.actor.clone());
                        case.current_approver = None;
                        Some(Outcome::Completed)
                    }
                }
            }
            Decision::Reject => {
                case.status = CaseStatus::Rejected;
                case.rejected_at = Some(now);
                case.reject_reason = request.comment.clone();
                Some(Outcome::Rejected)
            }
        };

        self.commit(
            CaseWrite::Update {
                case: case.clone(),
                expected_version,
                settled: Some(settled.clone()),
                appended: appended.clone(),
            },
            outcome,
            now,
        )
        .await?;

        if let Some(slot) = history.iter_mut().find(|entry| entry.id == settled.id) {
            *slot = settled;
        }
        history.extend(appended);

        info!(
            event_name = "approval.decision.applied",
            case_id = %case.id,
            actor = %request.actor,
            decision = request.decision.action().as_str(),
            status = case.status.as_str(),
            current_step_order = case.current_step_order,
            "approval decision applied"
        );

        Ok(CaseRecord { case, history })
    }

    /// Withdraws an active case on behalf of its drafter. The referenced document is not
    /// notified; callers polling the case see `Withdrawn`.
    pub async fn withdraw(
        &self,
        case_id: &CaseId,
        actor: &ActorId,
    ) -> Result<CaseRecord, ApprovalError> {
        let CaseRecord { mut case, mut history } = self.load_case(case_id).await?;

        if case.drafter != *actor {
            warn!(
                event_name = "approval.withdraw.unauthorized",
                case_id = %case.id,
                actor = %actor,
                "withdrawal rejected: actor is not the drafter"
            );
            return Err(ApprovalError::Authorization {
                case_id: case.id,
                actor: actor.clone(),
                action: "withdraw",
            });
        }

        if !case.status.accepts_actions() {
            warn!(
                event_name = "approval.withdraw.not_processable",
                case_id = %case.id,
                status = case.status.as_str(),
                "withdrawal rejected: case already terminal"
            );
            return Err(ApprovalError::NotProcessable { case_id: case.id, status: case.status });
        }

        let awaiting = case.awaiting_step_order();
        let anchor = history
            .iter()
            .find(|entry| entry.step_order == awaiting && entry.is_pending())
            .or_else(|| history.last())
            .cloned()
            .ok_or_else(|| ApprovalError::HistoryMissing {
                case_id: case.id.clone(),
                step_order: awaiting,
            })?;

        let now = Utc::now();
        let expected_version = case.version;
        case.version = expected_version + 1;
        case.updated_at = now;
        case.status = CaseStatus::Withdrawn;
        case.withdrawn_at = Some(now);

        let entry = HistoryEntry {
            id: numbering::history_id(self.cases.next_sequence(SequenceKind::History).await?),
            case_id: case.id.clone(),
            step_order: anchor.step_order,
            step_name: anchor.step_name,
            step_type: anchor.step_type,
            actor: actor.clone(),
            action: ActionCode::Withdraw,
            acted_at: now,
            comment: None,
            delegate_from: None,
        };

        self.commit(
            CaseWrite::Update {
                case: case.clone(),
                expected_version,
                settled: None,
                appended: vec![entry.clone()],
            },
            None,
            now,
        )
        .await?;
        history.push(entry);

        info!(
            event_name = "approval.case.withdrawn",
            case_id = %case.id,
            actor = %actor,
            "approval case withdrawn; referenced document is not notified"
        );

        Ok(CaseRecord { case, history })
    }

    pub async fn get_case(&self, case_id: &CaseId) -> Result<CaseRecord, ApprovalError> {
        self.load_case(case_id).await
    }

    pub async fn list_cases_awaiting(
        &self,
        actor: &ActorId,
    ) -> Result<Vec<CaseRecord>, ApprovalError> {
        Ok(self.cases.list_awaiting(actor).await?)
    }

    pub async fn list_cases_drafted_by(
        &self,
        actor: &ActorId,
    ) -> Result<Vec<CaseRecord>, ApprovalError> {
        Ok(self.cases.list_drafted_by(actor).await?)
    }

    pub async fn list_cases_decided_by(
        &self,
        actor: &ActorId,
    ) -> Result<Vec<CaseRecord>, ApprovalError> {
        Ok(self.cases.list_decided_by(actor).await?)
    }

    async fn load_case(&self, case_id: &CaseId) -> Result<CaseRecord, ApprovalError> {
        self.cases
            .find_case(case_id)
            .await?
            .ok_or_else(|| ApprovalError::CaseNotFound(case_id.clone()))
    }

    async fn load_template(
        &self,
        template_id: &TemplateId,
    ) -> Result<ApprovalLineTemplate, ApprovalError> {
        let template = self
            .templates
            .resolve_template(template_id)
            .await?
            .ok_or_else(|| ApprovalError::TemplateNotFound(template_id.clone()))?;
        template.validate()?;
        Ok(template)
    }

    /// Walks steps `start..=last` until one resolves to an approver. Optional steps
    /// without an approver are forwarded; a required one fails the operation.
    async fn route_from(
        &self,
        template: &ApprovalLineTemplate,
        start: u32,
        last: u32,
        context: &CaseContext,
    ) -> Result<Route, ApprovalError> {
        let mut forwarded = Vec::new();

        for order in start..=last {
            let Some(step) = template.step(order) else {
                break;
            };

            match self.resolver.resolve(step.approver_rule, &step.approver_ref, context).await? {
                Some(approver) => {
                    return Ok(Route { forwarded, next: Some((step.clone(), approver)) });
                }
                None if step.required => {
                    return Err(ApprovalError::Validation(format!(
                        "no approver resolved for required step {order} (`{}`) of template `{}`",
                        step.name, template.id
                    )));
                }
                None => forwarded.push(step.clone()),
            }
        }

        Ok(Route { forwarded, next: None })
    }

    async fn forward_entries(
        &self,
        case: &mut ApprovalCase,
        forwarded: &[TemplateStep],
        at: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, ApprovalError> {
        let system = ActorId(SYSTEM_ACTOR.to_string());
        let mut entries = Vec::with_capacity(forwarded.len());

        for step in forwarded {
            entries.push(
                self.history_entry(
                    &case.id,
                    step,
                    &system,
                    ActionCode::Forward,
                    at,
                    Some(FORWARD_COMMENT.to_string()),
                )
                .await?,
            );
            case.current_step_order = step.order;
        }

        Ok(entries)
    }

    async fn history_entry(
        &self,
        case_id: &CaseId,
        step: &TemplateStep,
        actor: &ActorId,
        action: ActionCode,
        at: DateTime<Utc>,
        comment: Option<String>,
    ) -> Result<HistoryEntry, ApprovalError> {
        let sequence = self.cases.next_sequence(SequenceKind::History).await?;

        Ok(HistoryEntry {
            id: numbering::history_id(sequence),
            case_id: case_id.clone(),
            step_order: step.order,
            step_name: step.name.clone(),
            step_type: step.step_type,
            actor: actor.clone(),
            action,
            acted_at: at,
            comment,
            delegate_from: None,
        })
    }

    async fn commit(
        &self,
        write: CaseWrite,
        outcome: Option<Outcome>,
        at: DateTime<Utc>,
    ) -> Result<(), ApprovalError> {
        let notice = outcome.map(|outcome| OutcomeNotice::for_case(write.case(), outcome, at));
        let case_id = write.case().id.clone();
        let staged = self.cases.stage(write).await?;

        if let Some(notice) = &notice {
            if let Err(dispatch_error) = self.dispatcher.notify(notice).await {
                warn!(
                    event_name = "approval.outcome.dispatch_failed",
                    case_id = %case_id,
                    outcome = notice.outcome.as_str(),
                    error = %dispatch_error,
                    "outcome dispatch failed; discarding staged case write"
                );
                drop(staged);
                return Err(dispatch_error.into());
            }
        }

        staged.commit().await?;
        Ok(())
    }
}

fn validate_create_request(request: &CreateCaseRequest) -> Result<(), ApprovalError> {
    let fields = [
        ("template_id", request.template_id.0.as_str()),
        ("reference_type", request.reference_type.as_str()),
        ("reference_id", request.reference_id.as_str()),
        ("drafter", request.drafter.0.as_str()),
    ];

    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(ApprovalError::Validation(format!("{name} must not be empty")));
        }
    }

    Ok(())
}

fn context_for(case: &ApprovalCase) -> CaseContext {
    CaseContext {
        template_id: case.template_id.clone(),
        reference_type: case.reference_type.clone(),
        reference_id: case.reference_id.clone(),
        drafter: case.drafter.clone(),
    }
}

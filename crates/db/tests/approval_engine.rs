use std::sync::Arc;

use chrono::{Datelike, Utc};

use compline_core::approvals::{
    ApprovalEngine, ApproverResolver, CaseRepository, CreateCaseRequest, Decision,
    DecisionRequest, DispatchError, Outcome, RecordingOutcomeDispatcher, StaticApproverResolver,
    TemplateStore,
};
use compline_core::domain::approval::{
    ActionCode, ActorId, ApprovalLineTemplate, ApproverRule, CaseId, CaseRecord, CaseStatus,
    Priority, StepType, TemplateId, TemplateStep,
};
use compline_core::errors::ApprovalError;
use compline_db::{
    connect_with_settings, migrations, InMemoryCaseRepository, InMemoryTemplateStore,
    SqlApproverResolver, SqlCaseRepository, SqlTemplateRepository,
};

const DRAFTER: &str = "U-DRAFTER";
const REVIEWER: &str = "U-REVIEWER";
const FINAL: &str = "U-CCO";

fn actor(id: &str) -> ActorId {
    ActorId(id.to_string())
}

fn step(
    order: u32,
    step_type: StepType,
    rule: ApproverRule,
    reference: &str,
    required: bool,
) -> TemplateStep {
    TemplateStep {
        order,
        name: format!("{} {order}", step_type.as_str()),
        step_type,
        approver_rule: rule,
        approver_ref: reference.to_string(),
        required,
    }
}

fn template(id: &str, steps: Vec<TemplateStep>) -> ApprovalLineTemplate {
    ApprovalLineTemplate {
        id: TemplateId(id.to_string()),
        work_type: "audit".to_string(),
        name: format!("template {id}"),
        steps,
    }
}

/// Draft -> department head review -> CCO final sign-off.
fn three_step() -> ApprovalLineTemplate {
    template(
        "TPL-AUDIT",
        vec![
            step(1, StepType::Draft, ApproverRule::FixedUser, "", true),
            step(2, StepType::Review, ApproverRule::DepartmentHead, "compliance", true),
            step(3, StepType::Final, ApproverRule::PositionHolder, "cco", true),
        ],
    )
}

fn single_step() -> ApprovalLineTemplate {
    template("TPL-NOTE", vec![step(1, StepType::Draft, ApproverRule::FixedUser, "", true)])
}

/// Step 2 is optional and routed to a department nobody heads.
fn optional_review() -> ApprovalLineTemplate {
    template(
        "TPL-OPTIONAL",
        vec![
            step(1, StepType::Draft, ApproverRule::FixedUser, "", true),
            step(2, StepType::Review, ApproverRule::DepartmentHead, "legal", false),
            step(3, StepType::Approve, ApproverRule::FixedUser, FINAL, true),
        ],
    )
}

fn unresolvable_required() -> ApprovalLineTemplate {
    template(
        "TPL-VACANT",
        vec![
            step(1, StepType::Draft, ApproverRule::FixedUser, "", true),
            step(2, StepType::Approve, ApproverRule::PositionHolder, "ceo", true),
        ],
    )
}

fn all_templates() -> Vec<ApprovalLineTemplate> {
    vec![
        three_step(),
        single_step(),
        optional_review(),
        unresolvable_required(),
        template("TPL-EMPTY", Vec::new()),
    ]
}

struct Harness {
    engine: ApprovalEngine,
    dispatcher: RecordingOutcomeDispatcher,
}

fn memory_harness_with(dispatcher: RecordingOutcomeDispatcher) -> Harness {
    let cases: Arc<dyn CaseRepository> = Arc::new(InMemoryCaseRepository::default());
    let templates: Arc<dyn TemplateStore> =
        Arc::new(InMemoryTemplateStore::with_templates(all_templates()));
    let resolver: Arc<dyn ApproverResolver> = Arc::new(
        StaticApproverResolver::new()
            .with_department_head("compliance", REVIEWER)
            .with_position_holder("cco", FINAL),
    );

    Harness {
        engine: ApprovalEngine::new(cases, templates, resolver, Arc::new(dispatcher.clone())),
        dispatcher,
    }
}

fn memory_harness() -> Harness {
    memory_harness_with(RecordingOutcomeDispatcher::default())
}

async fn sql_harness_with(dispatcher: RecordingOutcomeDispatcher) -> (Harness, sqlx::SqlitePool) {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    let harness = seeded_sql_harness(&pool, dispatcher).await;
    (harness, pool)
}

async fn seeded_sql_harness(
    pool: &sqlx::SqlitePool,
    dispatcher: RecordingOutcomeDispatcher,
) -> Harness {
    migrations::run_pending(pool).await.expect("migrations");

    let templates = SqlTemplateRepository::new(pool.clone());
    for template in all_templates() {
        templates.save_template(&template).await.expect("seed template");
    }

    let resolver = SqlApproverResolver::new(pool.clone());
    resolver.assign_department_head("Compliance", &actor(REVIEWER)).await.expect("seed head");
    resolver.assign_position_holder("CCO", &actor(FINAL)).await.expect("seed holder");

    Harness {
        engine: ApprovalEngine::new(
            Arc::new(SqlCaseRepository::new(pool.clone())),
            Arc::new(templates),
            Arc::new(resolver),
            Arc::new(dispatcher.clone()),
        ),
        dispatcher,
    }
}

async fn sql_harness() -> (Harness, sqlx::SqlitePool) {
    sql_harness_with(RecordingOutcomeDispatcher::default()).await
}

fn create_request(template_id: &str, reference_id: &str) -> CreateCaseRequest {
    CreateCaseRequest {
        template_id: TemplateId(template_id.to_string()),
        reference_type: "audit_detail".to_string(),
        reference_id: reference_id.to_string(),
        drafter: actor(DRAFTER),
        priority: Priority::Normal,
    }
}

fn decision(case_id: &CaseId, by: &str, decision: Decision, comment: Option<&str>) -> DecisionRequest {
    DecisionRequest {
        case_id: case_id.clone(),
        actor: actor(by),
        decision,
        comment: comment.map(str::to_string),
    }
}

fn actions(record: &CaseRecord) -> Vec<(u32, ActionCode)> {
    record.history.iter().map(|entry| (entry.step_order, entry.action)).collect()
}

async fn walk_three_step_to_completion(harness: &Harness) {
    let created =
        harness.engine.create_case(create_request("TPL-AUDIT", "AD-100")).await.expect("create");

    assert_eq!(created.case.status, CaseStatus::InProgress);
    assert_eq!(created.case.current_step_order, 1);
    assert_eq!(created.case.total_steps, 3);
    assert_eq!(created.case.current_approver, Some(actor(REVIEWER)));
    assert_eq!(actions(&created), vec![(1, ActionCode::Draft), (2, ActionCode::Pending)]);

    let reviewed = harness
        .engine
        .process_decision(decision(&created.case.id, REVIEWER, Decision::Approve, Some("ok")))
        .await
        .expect("review");
    assert_eq!(reviewed.case.status, CaseStatus::InProgress);
    assert_eq!(reviewed.case.current_step_order, 2);
    assert_eq!(reviewed.case.current_approver, Some(actor(FINAL)));
    assert_eq!(reviewed.pending_count(), 1);
    assert!(harness.dispatcher.notices().is_empty());

    let completed = harness
        .engine
        .process_decision(decision(&created.case.id, FINAL, Decision::Approve, None))
        .await
        .expect("final");
    assert_eq!(completed.case.status, CaseStatus::Completed);
    assert_eq!(completed.case.current_step_order, 3);
    assert_eq!(completed.case.final_approver, Some(actor(FINAL)));
    assert_eq!(completed.case.current_approver, None);
    assert!(completed.case.completed_at.is_some());
    assert!(completed.case.rejected_at.is_none() && completed.case.withdrawn_at.is_none());
    assert_eq!(completed.pending_count(), 0);
    assert_eq!(
        actions(&completed),
        vec![(1, ActionCode::Draft), (2, ActionCode::Approve), (3, ActionCode::Approve)]
    );

    let stored = harness.engine.get_case(&created.case.id).await.expect("get");
    assert_eq!(stored, completed);

    let notices = harness.dispatcher.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].outcome, Outcome::Completed);
    assert_eq!(notices[0].reference_id, "AD-100");
    assert_eq!(notices[0].decided_by, Some(actor(FINAL)));
}

#[tokio::test]
async fn three_step_case_completes_in_memory() {
    walk_three_step_to_completion(&memory_harness()).await;
}

#[tokio::test]
async fn three_step_case_completes_against_sqlite() {
    let (harness, _pool) = sql_harness().await;
    walk_three_step_to_completion(&harness).await;
}

#[tokio::test]
async fn identifiers_follow_persisted_formats() {
    let (harness, _pool) = sql_harness().await;
    let year = Utc::now().year();

    let first = harness.engine.create_case(create_request("TPL-AUDIT", "AD-1")).await.expect("1");
    let second = harness.engine.create_case(create_request("TPL-AUDIT", "AD-2")).await.expect("2");

    assert_eq!(first.case.id.0, "APR00000001");
    assert_eq!(second.case.id.0, "APR00000002");
    assert_eq!(first.case.case_number, format!("APR-{year}-00001"));
    assert_eq!(second.case.case_number, format!("APR-{year}-00002"));
    assert_eq!(first.history[0].id.0, "AH00000001");
    assert_eq!(first.history[1].id.0, "AH00000002");
    assert_eq!(second.history[0].id.0, "AH00000003");
}

#[tokio::test]
async fn single_step_template_completes_at_creation() {
    let harness = memory_harness();

    let record =
        harness.engine.create_case(create_request("TPL-NOTE", "AD-7")).await.expect("create");

    assert_eq!(record.case.status, CaseStatus::Completed);
    assert_eq!(record.case.current_step_order, 1);
    assert_eq!(record.case.total_steps, 1);
    assert_eq!(record.case.current_approver, None);
    assert_eq!(record.case.final_approver, None);
    assert!(record.case.completed_at.is_some());
    assert_eq!(actions(&record), vec![(1, ActionCode::Draft)]);

    let notices = harness.dispatcher.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].outcome, Outcome::Completed);
}

#[tokio::test]
async fn rejection_records_reason_and_notifies() {
    let (harness, _pool) = sql_harness().await;
    let created =
        harness.engine.create_case(create_request("TPL-AUDIT", "AD-9")).await.expect("create");

    let rejected = harness
        .engine
        .process_decision(decision(
            &created.case.id,
            REVIEWER,
            Decision::Reject,
            Some("evidence missing"),
        ))
        .await
        .expect("reject");

    assert_eq!(rejected.case.status, CaseStatus::Rejected);
    assert_eq!(rejected.case.reject_reason.as_deref(), Some("evidence missing"));
    assert!(rejected.case.rejected_at.is_some());
    assert!(rejected.case.completed_at.is_none());
    assert_eq!(rejected.case.final_approver, None);
    assert_eq!(rejected.pending_count(), 0);
    assert_eq!(rejected.history[1].action, ActionCode::Reject);
    assert_eq!(rejected.history[1].comment.as_deref(), Some("evidence missing"));

    let notices = harness.dispatcher.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].outcome, Outcome::Rejected);
    assert_eq!(notices[0].decided_by, Some(actor(REVIEWER)));

    let again = harness
        .engine
        .process_decision(decision(&created.case.id, REVIEWER, Decision::Approve, None))
        .await;
    assert!(matches!(again, Err(ApprovalError::NotProcessable { status: CaseStatus::Rejected, .. })));
}

#[tokio::test]
async fn only_the_current_approver_may_decide() {
    let harness = memory_harness();
    let created =
        harness.engine.create_case(create_request("TPL-AUDIT", "AD-3")).await.expect("create");

    let result = harness
        .engine
        .process_decision(decision(&created.case.id, FINAL, Decision::Approve, None))
        .await;

    assert!(matches!(result, Err(ApprovalError::Authorization { action: "decide", .. })));
    let unchanged = harness.engine.get_case(&created.case.id).await.expect("get");
    assert_eq!(unchanged, created);
}

#[tokio::test]
async fn unknown_case_is_not_found() {
    let harness = memory_harness();

    let result = harness
        .engine
        .process_decision(decision(&CaseId("APR99999999".to_string()), REVIEWER, Decision::Approve, None))
        .await;

    assert!(matches!(result, Err(ApprovalError::CaseNotFound(_))));
}

#[tokio::test]
async fn withdraw_is_reserved_to_the_drafter_and_frees_the_reference() {
    let (harness, _pool) = sql_harness().await;
    let created =
        harness.engine.create_case(create_request("TPL-AUDIT", "AD-4")).await.expect("create");

    let by_reviewer = harness.engine.withdraw(&created.case.id, &actor(REVIEWER)).await;
    assert!(matches!(by_reviewer, Err(ApprovalError::Authorization { action: "withdraw", .. })));

    let withdrawn =
        harness.engine.withdraw(&created.case.id, &actor(DRAFTER)).await.expect("withdraw");
    assert_eq!(withdrawn.case.status, CaseStatus::Withdrawn);
    assert!(withdrawn.case.withdrawn_at.is_some());
    let last = withdrawn.history.last().expect("history");
    assert_eq!(last.action, ActionCode::Withdraw);
    assert_eq!(last.step_order, 2);
    assert_eq!(last.actor, actor(DRAFTER));
    assert!(harness.dispatcher.notices().is_empty());

    let decide = harness
        .engine
        .process_decision(decision(&created.case.id, REVIEWER, Decision::Approve, None))
        .await;
    assert!(matches!(decide, Err(ApprovalError::NotProcessable { .. })));

    let twice = harness.engine.withdraw(&created.case.id, &actor(DRAFTER)).await;
    assert!(matches!(twice, Err(ApprovalError::NotProcessable { .. })));

    let replacement =
        harness.engine.create_case(create_request("TPL-AUDIT", "AD-4")).await.expect("recreate");
    assert_ne!(replacement.case.id, created.case.id);
}

#[tokio::test]
async fn withdraw_leaves_completed_and_rejected_cases_untouched() {
    let (harness, _pool) = sql_harness().await;
    let completed =
        harness.engine.create_case(create_request("TPL-NOTE", "AD-40")).await.expect("complete");
    assert_eq!(completed.case.status, CaseStatus::Completed);

    let created =
        harness.engine.create_case(create_request("TPL-AUDIT", "AD-41")).await.expect("create");
    let rejected = harness
        .engine
        .process_decision(decision(&created.case.id, REVIEWER, Decision::Reject, Some("no")))
        .await
        .expect("reject");

    for (before, status) in [(completed, CaseStatus::Completed), (rejected, CaseStatus::Rejected)] {
        let result = harness.engine.withdraw(&before.case.id, &actor(DRAFTER)).await;
        assert!(
            matches!(result, Err(ApprovalError::NotProcessable { status: found, .. }) if found == status),
            "withdrawing a {status:?} case should be refused"
        );

        let after = harness.engine.get_case(&before.case.id).await.expect("get");
        assert_eq!(after, before);
    }
    assert_eq!(harness.dispatcher.notices().len(), 2);
}

#[tokio::test]
async fn second_active_case_for_a_reference_is_rejected() {
    let (harness, _pool) = sql_harness().await;
    harness.engine.create_case(create_request("TPL-AUDIT", "AD-5")).await.expect("create");

    let duplicate = harness.engine.create_case(create_request("TPL-OPTIONAL", "AD-5")).await;

    assert!(matches!(duplicate, Err(ApprovalError::DuplicateCase { .. })));
    let drafted = harness.engine.list_cases_drafted_by(&actor(DRAFTER)).await.expect("list");
    assert_eq!(drafted.len(), 1);
}

#[tokio::test]
async fn template_problems_are_reported_before_anything_is_stored() {
    let harness = memory_harness();

    let missing = harness.engine.create_case(create_request("TPL-NOPE", "AD-6")).await;
    assert!(matches!(missing, Err(ApprovalError::TemplateNotFound(_))));

    let empty = harness.engine.create_case(create_request("TPL-EMPTY", "AD-6")).await;
    assert!(matches!(empty, Err(ApprovalError::Validation(_))));

    let vacant = harness.engine.create_case(create_request("TPL-VACANT", "AD-6")).await;
    assert!(matches!(vacant, Err(ApprovalError::Validation(_))));

    let blank = harness.engine.create_case(create_request("TPL-AUDIT", "  ")).await;
    assert!(matches!(blank, Err(ApprovalError::Validation(_))));

    let drafted = harness.engine.list_cases_drafted_by(&actor(DRAFTER)).await.expect("list");
    assert!(drafted.is_empty());
}

#[tokio::test]
async fn optional_step_without_approver_is_forwarded() {
    let harness = memory_harness();

    let record =
        harness.engine.create_case(create_request("TPL-OPTIONAL", "AD-8")).await.expect("create");

    assert_eq!(record.case.status, CaseStatus::InProgress);
    assert_eq!(record.case.current_step_order, 2);
    assert_eq!(record.case.current_approver, Some(actor(FINAL)));
    assert_eq!(
        actions(&record),
        vec![(1, ActionCode::Draft), (2, ActionCode::Forward), (3, ActionCode::Pending)]
    );
    assert_eq!(record.history[1].actor.0, "system");
    assert!(record.pending_entry().is_some());

    let completed = harness
        .engine
        .process_decision(decision(&record.case.id, FINAL, Decision::Approve, None))
        .await
        .expect("approve");
    assert_eq!(completed.case.status, CaseStatus::Completed);
    assert_eq!(completed.case.current_step_order, 3);
}

#[tokio::test]
async fn failed_dispatch_leaves_the_case_untouched() {
    let failing = RecordingOutcomeDispatcher::failing(DispatchError::Refused {
        endpoint: "http://audit.internal/outcomes".to_string(),
        status: 503,
    });
    let (harness, _pool) = sql_harness_with(failing).await;
    let created =
        harness.engine.create_case(create_request("TPL-AUDIT", "AD-11")).await.expect("create");
    let reviewed = harness
        .engine
        .process_decision(decision(&created.case.id, REVIEWER, Decision::Approve, None))
        .await
        .expect("review");

    let result = harness
        .engine
        .process_decision(decision(&created.case.id, FINAL, Decision::Approve, None))
        .await;

    assert!(matches!(result, Err(ApprovalError::Dispatch(DispatchError::Refused { status: 503, .. }))));
    let stored = harness.engine.get_case(&created.case.id).await.expect("get");
    assert_eq!(stored, reviewed);
    assert_eq!(stored.case.status, CaseStatus::InProgress);
    assert_eq!(stored.pending_count(), 1);

    let burned = harness.engine.create_case(create_request("TPL-NOTE", "AD-12")).await;
    assert!(matches!(burned, Err(ApprovalError::Dispatch(_))));
    let next =
        harness.engine.create_case(create_request("TPL-AUDIT", "AD-13")).await.expect("next");
    assert_eq!(next.case.id.0, "APR00000003", "the rolled-back creation keeps its id");
}

#[tokio::test]
async fn failed_dispatch_on_creation_stores_no_case() {
    let failing = RecordingOutcomeDispatcher::failing(DispatchError::Unreachable {
        endpoint: "http://audit.internal/outcomes".to_string(),
        message: "connection refused".to_string(),
    });
    let harness = memory_harness_with(failing);

    let result = harness.engine.create_case(create_request("TPL-NOTE", "AD-12")).await;

    assert!(matches!(result, Err(ApprovalError::Dispatch(_))));
    let drafted = harness.engine.list_cases_drafted_by(&actor(DRAFTER)).await.expect("list");
    assert!(drafted.is_empty());
}

#[tokio::test]
async fn concurrent_final_decisions_apply_exactly_once() {
    for sqlite in [false, true] {
        let (harness, _pool) = if sqlite {
            let (harness, pool) = sql_harness().await;
            (harness, Some(pool))
        } else {
            (memory_harness(), None)
        };
        let created = harness
            .engine
            .create_case(create_request("TPL-OPTIONAL", "AD-13"))
            .await
            .expect("create");

        let (left, right) = tokio::join!(
            harness.engine.process_decision(decision(&created.case.id, FINAL, Decision::Approve, None)),
            harness.engine.process_decision(decision(&created.case.id, FINAL, Decision::Reject, None)),
        );

        let successes = [left.is_ok(), right.is_ok()].into_iter().filter(|ok| *ok).count();
        assert_eq!(successes, 1, "exactly one decision should win (sqlite: {sqlite})");
        for result in [left, right] {
            if let Err(error) = result {
                assert!(
                    matches!(error, ApprovalError::Conflict(_) | ApprovalError::NotProcessable { .. }),
                    "losing decision should see a conflict, got {error:?}"
                );
            }
        }

        let stored = harness.engine.get_case(&created.case.id).await.expect("get");
        let decided = stored.history.iter().filter(|entry| entry.action.is_decision()).count();
        assert_eq!(decided, 1);
        assert_eq!(stored.case.version, 2);
        assert_eq!(harness.dispatcher.notices().len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_deciders_on_a_shared_database_apply_exactly_once() {
    const ROUNDS: usize = 20;
    const DECIDERS: usize = 4;

    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("race.db").display());
    let pool = connect_with_settings(&url, 8, 30).await.expect("connect");
    let harness = seeded_sql_harness(&pool, RecordingOutcomeDispatcher::default()).await;

    let mut conflicts = 0;
    for round in 0..ROUNDS {
        let created = harness
            .engine
            .create_case(create_request("TPL-OPTIONAL", &format!("AD-RACE-{round}")))
            .await
            .expect("create");

        let barrier = Arc::new(tokio::sync::Barrier::new(DECIDERS));
        let deciders: Vec<_> = (0..DECIDERS)
            .map(|index| {
                let engine = harness.engine.clone();
                let barrier = barrier.clone();
                let verdict = if index % 2 == 0 { Decision::Approve } else { Decision::Reject };
                let request = decision(&created.case.id, FINAL, verdict, None);
                tokio::spawn(async move {
                    barrier.wait().await;
                    engine.process_decision(request).await
                })
            })
            .collect();

        let mut successes = 0;
        for decider in deciders {
            match decider.await.expect("decider task") {
                Ok(_) => successes += 1,
                Err(ApprovalError::Conflict(_)) => conflicts += 1,
                Err(ApprovalError::NotProcessable { .. }) => {}
                Err(other) => panic!("losing decision failed unexpectedly: {other:?}"),
            }
        }
        assert_eq!(successes, 1, "round {round}: exactly one decider should win");

        let stored = harness.engine.get_case(&created.case.id).await.expect("get");
        assert_eq!(stored.history.iter().filter(|entry| entry.action.is_decision()).count(), 1);
        assert_eq!(stored.case.version, 2);
        assert!(stored.case.status.is_terminal());
    }

    assert!(conflicts > 0, "no decider lost on the version check across {ROUNDS} rounds");
    assert_eq!(harness.dispatcher.notices().len(), ROUNDS);
    pool.close().await;
}

#[tokio::test]
async fn missing_pending_row_is_an_integrity_error() {
    let (harness, pool) = sql_harness().await;
    let created =
        harness.engine.create_case(create_request("TPL-AUDIT", "AD-14")).await.expect("create");

    sqlx::query("DELETE FROM approval_history WHERE case_id = ? AND action_code = 'pending'")
        .bind(&created.case.id.0)
        .execute(&pool)
        .await
        .expect("corrupt history");

    let result = harness
        .engine
        .process_decision(decision(&created.case.id, REVIEWER, Decision::Approve, None))
        .await;

    assert!(matches!(result, Err(ApprovalError::HistoryMissing { step_order: 2, .. })));
}

#[tokio::test]
async fn listings_follow_each_actor_role() {
    let (harness, _pool) = sql_harness().await;
    let first =
        harness.engine.create_case(create_request("TPL-AUDIT", "AD-20")).await.expect("first");
    let second =
        harness.engine.create_case(create_request("TPL-AUDIT", "AD-21")).await.expect("second");
    harness
        .engine
        .process_decision(decision(&first.case.id, REVIEWER, Decision::Approve, None))
        .await
        .expect("review first");

    let reviewer_queue =
        harness.engine.list_cases_awaiting(&actor(REVIEWER)).await.expect("awaiting reviewer");
    assert_eq!(reviewer_queue.len(), 1);
    assert_eq!(reviewer_queue[0].case.id, second.case.id);

    let final_queue =
        harness.engine.list_cases_awaiting(&actor(FINAL)).await.expect("awaiting final");
    assert_eq!(final_queue.len(), 1);
    assert_eq!(final_queue[0].case.id, first.case.id);
    assert_eq!(final_queue[0].history.len(), 3);

    let decided = harness.engine.list_cases_decided_by(&actor(REVIEWER)).await.expect("decided");
    assert_eq!(decided.len(), 1);
    assert_eq!(decided[0].case.id, first.case.id);

    let drafted = harness.engine.list_cases_drafted_by(&actor(DRAFTER)).await.expect("drafted");
    assert_eq!(drafted.len(), 2);
    assert!(harness.engine.list_cases_drafted_by(&actor(REVIEWER)).await.expect("none").is_empty());
}

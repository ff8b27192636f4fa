use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use compline_core::approvals::{ApprovalEngine, CreateCaseRequest, Decision, DecisionRequest};
use compline_core::domain::approval::{ActorId, CaseId, CaseRecord};
use compline_core::errors::ApprovalError;

#[derive(Clone)]
pub struct ApiState {
    engine: ApprovalEngine,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionBody {
    pub actor: ActorId,
    pub decision: Decision,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawBody {
    pub actor: ActorId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub detail: String,
    pub error_class: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub fn router(engine: ApprovalEngine) -> Router {
    Router::new()
        .route("/api/v1/cases", post(create_case))
        .route("/api/v1/cases/{case_id}", get(get_case))
        .route("/api/v1/cases/{case_id}/decisions", post(decide))
        .route("/api/v1/cases/{case_id}/withdraw", post(withdraw))
        .route("/api/v1/actors/{actor}/awaiting", get(list_awaiting))
        .route("/api/v1/actors/{actor}/drafted", get(list_drafted))
        .route("/api/v1/actors/{actor}/decided", get(list_decided))
        .with_state(ApiState { engine })
}

async fn create_case(
    State(state): State<ApiState>,
    Json(body): Json<CreateCaseRequest>,
) -> ApiResult<(StatusCode, Json<CaseRecord>)> {
    let record = state.engine.create_case(body).await.map_err(|error| reject("create", error))?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_case(
    Path(case_id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<CaseRecord>> {
    let record =
        state.engine.get_case(&CaseId(case_id)).await.map_err(|error| reject("get", error))?;
    Ok(Json(record))
}

async fn decide(
    Path(case_id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<DecisionBody>,
) -> ApiResult<Json<CaseRecord>> {
    let request = DecisionRequest {
        case_id: CaseId(case_id),
        actor: body.actor,
        decision: body.decision,
        comment: body.comment,
    };
    let record =
        state.engine.process_decision(request).await.map_err(|error| reject("decide", error))?;
    Ok(Json(record))
}

async fn withdraw(
    Path(case_id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<WithdrawBody>,
) -> ApiResult<Json<CaseRecord>> {
    let record = state
        .engine
        .withdraw(&CaseId(case_id), &body.actor)
        .await
        .map_err(|error| reject("withdraw", error))?;
    Ok(Json(record))
}

async fn list_awaiting(
    Path(actor): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<Vec<CaseRecord>>> {
    let records = state
        .engine
        .list_cases_awaiting(&ActorId(actor))
        .await
        .map_err(|error| reject("list_awaiting", error))?;
    Ok(Json(records))
}

async fn list_drafted(
    Path(actor): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<Vec<CaseRecord>>> {
    let records = state
        .engine
        .list_cases_drafted_by(&ActorId(actor))
        .await
        .map_err(|error| reject("list_drafted", error))?;
    Ok(Json(records))
}

async fn list_decided(
    Path(actor): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<Vec<CaseRecord>>> {
    let records = state
        .engine
        .list_cases_decided_by(&ActorId(actor))
        .await
        .map_err(|error| reject("list_decided", error))?;
    Ok(Json(records))
}

fn reject(operation: &'static str, error: ApprovalError) -> (StatusCode, Json<ApiError>) {
    let correlation_id = Uuid::new_v4().simple().to_string();
    let interface = error.into_interface(correlation_id);

    warn!(
        event_name = "approval.api.request_failed",
        correlation_id = %interface.correlation_id,
        operation,
        error_class = interface.error_class,
        error = %interface.message,
        "approval request failed"
    );

    let status =
        StatusCode::from_u16(interface.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiError {
            error: interface.user_message().to_string(),
            detail: interface.message,
            error_class: interface.error_class.to_string(),
            correlation_id: interface.correlation_id,
        }),
    )
}

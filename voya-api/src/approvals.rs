use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use voya_approval::{ApprovalOptions, BatchOutcome, ReleaseOptions};
use voya_store::Store;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn approve_request<S: Store>(
    State(state): State<AppState<S>>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<ApprovalOptions>>,
) -> Result<Json<Value>, ApiError> {
    let options = body.map(|Json(options)| options).unwrap_or_default();
    let allocation = state.approvals.approve_request(request_id, &options).await?;
    Ok(Json(json!({
        "success": true,
        "allocation": allocation,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BatchApproveBody {
    pub request_ids: Vec<Uuid>,
    #[serde(default)]
    pub options: ApprovalOptions,
}

pub async fn approve_batch<S: Store>(
    State(state): State<AppState<S>>,
    Json(body): Json<BatchApproveBody>,
) -> Json<BatchOutcome> {
    let outcome = state
        .approvals
        .batch_approve(&body.request_ids, &body.options)
        .await;
    Json(outcome)
}

pub async fn release_allocation<S: Store>(
    State(state): State<AppState<S>>,
    Path(allocation_id): Path<Uuid>,
    body: Option<Json<ReleaseOptions>>,
) -> Result<Json<Value>, ApiError> {
    let options = body.map(|Json(options)| options).unwrap_or_default();
    state
        .approvals
        .release_allocation(allocation_id, &options)
        .await?;
    Ok(Json(json!({ "success": true })))
}

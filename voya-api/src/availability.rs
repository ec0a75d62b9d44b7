use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use voya_domain::ProviderType;
use voya_store::Store;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub async fn availability<S: Store>(
    State(state): State<AppState<S>>,
    Path((provider_type, item_id)): Path<(String, Uuid)>,
    Query(range): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let provider: ProviderType = match provider_type.parse() {
        Ok(provider) => provider,
        Err(message) => {
            let body = Json(json!({ "success": false, "message": message }));
            return Ok((StatusCode::BAD_REQUEST, body).into_response());
        }
    };

    let days = state
        .approvals
        .availability_summary(provider, item_id, range.start, range.end)
        .await?;
    let body = Json(json!({
        "provider_type": provider,
        "item_id": item_id,
        "days": days,
    }));
    Ok(body.into_response())
}

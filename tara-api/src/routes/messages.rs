use axum::extract::{Path, State};
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;

use tara_shared::errors::{AppError, AppResult};
use tara_shared::types::api::ApiResponse;

use crate::models::Message;
use crate::schema::messages;
use crate::AppState;

/// GET /messages/:cpin - full chat history, oldest first
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(cpin): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<Message>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let items: Vec<Message> = messages::table
        .filter(messages::cpin.eq(&cpin))
        .order(messages::sent_at.asc())
        .load::<Message>(&mut conn)?;

    Ok(Json(ApiResponse::ok(items)))
}

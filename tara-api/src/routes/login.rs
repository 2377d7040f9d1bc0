use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use tara_shared::errors::{AppError, AppResult, ErrorCode};
use tara_shared::types::api::ApiResponse;

use crate::models::Couple;
use crate::schema::couples;
use crate::services::activity;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 5, max = 20, message = "invalid phone number"))]
    pub phone: String,
    #[validate(length(min = 1, message = "cpin required"))]
    pub cpin: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub partner: Option<String>,
}

/// POST /login - resume a session or pair as the second member
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let couple: Couple = couples::table
        .find(&req.cpin)
        .first::<Couple>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::CoupleNotFound, "invalid cpin or phone number"))?;

    // Existing member logging back in
    if couple.is_member(&req.phone) {
        activity::touch_last_active(&mut conn, &req.cpin)?;

        return Ok(Json(ApiResponse::ok_with_message(
            LoginResponse {
                partner: couple.partner_of(&req.phone).map(String::from),
            },
            "login successful",
        )));
    }

    // Open second slot: pair this phone as user2
    if couple.user2.is_none() {
        diesel::update(couples::table.find(&req.cpin))
            .set(couples::user2.eq(&req.phone))
            .execute(&mut conn)?;

        activity::touch_last_active(&mut conn, &req.cpin)?;

        tracing::info!(cpin = %req.cpin, "couple paired");

        return Ok(Json(ApiResponse::ok_with_message(
            LoginResponse {
                partner: couple.user1.clone(),
            },
            "paired successfully",
        )));
    }

    // Full couple, unknown third phone
    Err(AppError::new(
        ErrorCode::AlreadyPaired,
        "invalid cpin or phone number",
    ))
}

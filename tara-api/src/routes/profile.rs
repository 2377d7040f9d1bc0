use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sql_types::{Date as DieselDate, Nullable, Text, VarChar};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use tara_shared::errors::{AppError, AppResult, ErrorCode};
use tara_shared::types::api::ApiResponse;

use crate::models::Profile;
use crate::schema::profiles;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub cpin: String,
    pub user_phone: String,
    pub display_name: Option<String>,
    pub status_message: Option<String>,
    pub anniversary_date: Option<NaiveDate>,
    pub profile_pic_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemovePhotoRequest {
    pub cpin: String,
    pub user_phone: String,
}

#[derive(Debug, Serialize)]
pub struct CoupleProfileResponse {
    pub me: Option<Profile>,
    pub partner: Option<Profile>,
}

/// GET /profile/couple/:cpin/:phone - both members' profiles, split into
/// me/partner from the caller's perspective
pub async fn get_couple_profile(
    State(state): State<Arc<AppState>>,
    Path((cpin, phone)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<CoupleProfileResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let rows: Vec<Profile> = profiles::table
        .filter(profiles::cpin.eq(&cpin))
        .load::<Profile>(&mut conn)?;

    let (me, partner) = rows
        .into_iter()
        .fold((None, None), |(me, partner), p| {
            if p.user_phone == phone {
                (Some(p), partner)
            } else {
                (me, Some(p))
            }
        });

    Ok(Json(ApiResponse::ok(CoupleProfileResponse { me, partner })))
}

/// POST /profile/update - upsert the caller's profile fields
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    if req.cpin.is_empty() || req.user_phone.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "missing parameters"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let old_pic: Option<String> = profiles::table
        .filter(profiles::cpin.eq(&req.cpin))
        .filter(profiles::user_phone.eq(&req.user_phone))
        .select(profiles::profile_pic_url)
        .first::<Option<String>>(&mut conn)
        .optional()?
        .flatten();

    diesel::sql_query(
        "INSERT INTO profiles \
           (cpin, user_phone, display_name, status_message, anniversary_date, profile_pic_url, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, now()) \
         ON CONFLICT (cpin, user_phone) DO UPDATE SET \
           display_name = EXCLUDED.display_name, \
           status_message = EXCLUDED.status_message, \
           profile_pic_url = EXCLUDED.profile_pic_url, \
           updated_at = now()"
    )
    .bind::<VarChar, _>(&req.cpin)
    .bind::<VarChar, _>(&req.user_phone)
    .bind::<Nullable<VarChar>, _>(&req.display_name)
    .bind::<Nullable<VarChar>, _>(&req.status_message)
    .bind::<Nullable<DieselDate>, _>(req.anniversary_date)
    .bind::<Nullable<Text>, _>(&req.profile_pic_url)
    .execute(&mut conn)?;

    // The anniversary belongs to the couple, not the member
    if let Some(anniversary) = req.anniversary_date {
        diesel::update(profiles::table.filter(profiles::cpin.eq(&req.cpin)))
            .set((
                profiles::anniversary_date.eq(anniversary),
                profiles::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)?;
    }
    drop(conn);

    // Replaced photo: clean up the old object, non-fatally
    if let Some(old) = old_pic {
        if req.profile_pic_url.as_deref() != Some(old.as_str()) {
            if let Err(e) = state.storage.delete(&old).await {
                tracing::warn!(cpin = %req.cpin, path = %old, error = %e, "old profile photo delete failed");
            }
        }
    }

    Ok(Json(ApiResponse::ok(())))
}

/// POST /profile/remove-photo - clear the caller's profile photo
pub async fn remove_photo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RemovePhotoRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    if req.cpin.is_empty() || req.user_phone.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "missing parameters"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    diesel::update(
        profiles::table
            .filter(profiles::cpin.eq(&req.cpin))
            .filter(profiles::user_phone.eq(&req.user_phone)),
    )
    .set((
        profiles::profile_pic_url.eq(None::<String>),
        profiles::updated_at.eq(diesel::dsl::now),
    ))
    .execute(&mut conn)?;

    Ok(Json(ApiResponse::ok(())))
}

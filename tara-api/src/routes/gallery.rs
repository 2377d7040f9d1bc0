use axum::extract::{Path, State};
use axum::Json;
use chrono::{Duration, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use tara_shared::errors::{AppError, AppResult, ErrorCode};
use tara_shared::types::api::ApiResponse;

use crate::models::{MediaItem, NewMediaItem, VisibilityType};
use crate::schema::{media_items, media_views};
use crate::services::media;
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct UploadRequestBody {
    pub cpin: String,
    pub uploader: String,
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmUploadRequest {
    pub cpin: String,
    pub uploader: String,
    pub storage_path: String,
    pub media_type: String,
    pub visibility_type: String,
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MediaActionRequest {
    pub media_id: Uuid,
    pub viewer: String,
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct UploadRequestResponse {
    pub upload_url: String,
    pub storage_path: String,
}

#[derive(Debug, Serialize)]
pub struct GalleryEntry {
    #[serde(flatten)]
    pub item: MediaItem,
    pub view_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    pub deleted: bool,
}

// --- Handlers ---

/// POST /gallery/upload-request - issue a presigned upload URL namespaced
/// by couple
pub async fn upload_request(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UploadRequestBody>,
) -> AppResult<Json<ApiResponse<UploadRequestResponse>>> {
    if req.cpin.is_empty() || req.uploader.is_empty() || req.file_name.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "missing fields"));
    }

    let storage_path = format!("{}/{}-{}", req.cpin, Uuid::new_v4(), req.file_name);

    let upload_url = state
        .storage
        .presigned_upload_url(&storage_path)
        .await
        .map_err(AppError::internal)?;

    tracing::info!(cpin = %req.cpin, uploader = %req.uploader, "upload URL issued");

    Ok(Json(ApiResponse::ok(UploadRequestResponse {
        upload_url,
        storage_path,
    })))
}

/// POST /gallery/confirm - register an uploaded object as a media item
pub async fn confirm_upload(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfirmUploadRequest>,
) -> AppResult<Json<ApiResponse<MediaItem>>> {
    if req.cpin.is_empty() || req.uploader.is_empty() || req.storage_path.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "missing fields"));
    }

    let visibility: VisibilityType = req
        .visibility_type
        .parse()
        .map_err(|e: String| AppError::new(ErrorCode::ValidationError, e))?;

    let expires_at = match visibility {
        VisibilityType::Timed => {
            let secs = req.duration_seconds.ok_or_else(|| {
                AppError::new(ErrorCode::ValidationError, "duration_seconds required for timed media")
            })?;
            Some(Utc::now() + Duration::seconds(secs))
        }
        _ => None,
    };

    let max_views = match visibility {
        VisibilityType::OneTime => Some(1),
        _ => None,
    };

    let download_url = state
        .storage
        .presigned_download_url(&req.storage_path)
        .await
        .map_err(AppError::internal)?;

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let item: MediaItem = diesel::insert_into(media_items::table)
        .values(&NewMediaItem {
            cpin: req.cpin.clone(),
            uploader: req.uploader.clone(),
            storage_path: req.storage_path.clone(),
            download_url,
            media_type: req.media_type.clone(),
            visibility_type: visibility.as_str().to_string(),
            expires_at,
            max_views,
        })
        .get_result(&mut conn)?;

    tracing::info!(
        cpin = %req.cpin,
        uploader = %req.uploader,
        media_id = %item.id,
        visibility = %visibility.as_str(),
        "upload confirmed"
    );

    Ok(Json(ApiResponse::ok(item)))
}

/// GET /gallery/:cpin - non-expired media, newest first, with view counts
pub async fn list_gallery(
    State(state): State<Arc<AppState>>,
    Path(cpin): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<GalleryEntry>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let items: Vec<MediaItem> = media_items::table
        .filter(media_items::cpin.eq(&cpin))
        .filter(
            media_items::expires_at
                .is_null()
                .or(media_items::expires_at.gt(Utc::now())),
        )
        .order(media_items::uploaded_at.desc())
        .load::<MediaItem>(&mut conn)?;

    let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
    let counts: HashMap<Uuid, i64> = media_views::table
        .filter(media_views::media_id.eq_any(&ids))
        .group_by(media_views::media_id)
        .select((media_views::media_id, count_star()))
        .load::<(Uuid, i64)>(&mut conn)?
        .into_iter()
        .collect();

    let entries = items
        .into_iter()
        .map(|item| {
            let view_count = counts.get(&item.id).copied().unwrap_or(0);
            GalleryEntry { item, view_count }
        })
        .collect();

    Ok(Json(ApiResponse::ok(entries)))
}

/// POST /gallery/view - authorize a single view of a media item
pub async fn view_media(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MediaActionRequest>,
) -> AppResult<Json<ApiResponse<media::ViewOutcome>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let outcome = media::authorize_view(&mut conn, req.media_id, &req.viewer)?;

    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /gallery/consume - consume an item, deleting ephemeral media
pub async fn consume_media(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MediaActionRequest>,
) -> AppResult<Json<ApiResponse<ConsumeResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let outcome = media::consume(&mut conn, req.media_id, &req.viewer)?;

    // DB deletion is authoritative; a failed object delete only gets logged
    if let Some(path) = &outcome.storage_path {
        if let Err(e) = state.storage.delete(path).await {
            tracing::error!(media_id = %req.media_id, path = %path, error = %e, "storage delete failed");
        }
    }

    Ok(Json(ApiResponse::ok(ConsumeResponse {
        deleted: outcome.deleted,
    })))
}

use axum::extract::{Path, State};
use axum::Json;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

use tara_shared::errors::{AppError, AppResult, ErrorCode};
use tara_shared::types::api::ApiResponse;

use crate::models::Location;
use crate::schema::locations;
use crate::AppState;

/// Store a member's last-known position, claiming the first free slot for
/// a phone not seen before. Shared by the REST handler and the realtime
/// `location-update` socket event.
pub fn upsert_location(
    conn: &mut PgConnection,
    cpin: &str,
    phone: &str,
    lat: f64,
    lon: f64,
) -> AppResult<()> {
    let existing: Option<Location> = locations::table
        .find(cpin)
        .first::<Location>(conn)
        .optional()?;

    let Some(row) = existing else {
        diesel::insert_into(locations::table)
            .values((
                locations::cpin.eq(cpin),
                locations::user1_phone.eq(phone),
                locations::user1_lat.eq(lat),
                locations::user1_lon.eq(lon),
                locations::user1_updated.eq(diesel::dsl::now),
            ))
            .execute(conn)?;
        return Ok(());
    };

    if row.user1_phone.as_deref() == Some(phone) {
        diesel::update(locations::table.find(cpin))
            .set((
                locations::user1_lat.eq(lat),
                locations::user1_lon.eq(lon),
                locations::user1_updated.eq(diesel::dsl::now),
            ))
            .execute(conn)?;
    } else if row.user2_phone.as_deref() == Some(phone) || row.user2_phone.is_none() {
        diesel::update(locations::table.find(cpin))
            .set((
                locations::user2_phone.eq(phone),
                locations::user2_lat.eq(lat),
                locations::user2_lon.eq(lon),
                locations::user2_updated.eq(diesel::dsl::now),
            ))
            .execute(conn)?;
    } else {
        return Err(AppError::new(
            ErrorCode::LocationSlotsFull,
            "both members already set for this couple",
        ));
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpdateLocationRequest {
    pub cpin: String,
    pub phone: String,
    pub lat: f64,
    pub lon: f64,
}

/// POST /map/update - update a member's location
pub async fn update_location(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateLocationRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    if req.cpin.is_empty() || req.phone.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "missing parameters"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    upsert_location(&mut conn, &req.cpin, &req.phone, req.lat, req.lon)?;

    tracing::debug!(cpin = %req.cpin, "location updated");

    Ok(Json(ApiResponse::ok(())))
}

/// GET /map/:cpin - both members' last-known locations
pub async fn get_locations(
    State(state): State<Arc<AppState>>,
    Path(cpin): Path<String>,
) -> AppResult<Json<ApiResponse<Location>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let row: Location = locations::table
        .find(&cpin)
        .first::<Location>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::LocationNotFound, "no location data"))?;

    Ok(Json(ApiResponse::ok(row)))
}

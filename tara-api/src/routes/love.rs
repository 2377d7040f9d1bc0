use axum::extract::{Path, State};
use axum::Json;
use chrono::{Local, NaiveDate};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use tara_shared::errors::{AppError, AppResult, ErrorCode};
use tara_shared::types::api::ApiResponse;

use crate::models::{Couple, CoupleState};
use crate::schema::{completed_days, couple_state, couples, daily_quests, quest_actions};
use crate::services::{activity, quests};
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct InteractRequest {
    pub cpin: String,
    pub user: String,
    pub event: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteQuestRequest {
    pub cpin: String,
    pub user_phone: String,
    pub quest_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ApproveQuestRequest {
    pub cpin: String,
    pub approver_phone: String,
    pub quest_id: Uuid,
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegisterFcmRequest {
    pub cpin: String,
    pub phone: String,
    pub fcm_token: String,
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct QuestWithAction {
    pub quest_id: Uuid,
    pub quest_text: String,
    pub date: NaiveDate,
    pub action_type: String,
    pub user_phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoveStateResponse {
    pub love_score: i32,
    pub streak_days: i32,
    pub last_streak_date: Option<NaiveDate>,
    pub last_active_date: Option<NaiveDate>,
    pub today_completed: bool,
    pub todays_quests: Vec<QuestWithAction>,
}

// --- Helpers ---

fn load_couple(conn: &mut PgConnection, cpin: &str) -> AppResult<Couple> {
    couples::table
        .find(cpin)
        .first::<Couple>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::CoupleNotFound, "unknown couple"))
}

fn load_quests_with_actions(
    conn: &mut PgConnection,
    cpin: &str,
    date: Option<NaiveDate>,
) -> AppResult<Vec<QuestWithAction>> {
    let mut query = daily_quests::table
        .inner_join(quest_actions::table)
        .filter(daily_quests::cpin.eq(cpin))
        .select((
            daily_quests::quest_id,
            daily_quests::quest_text,
            daily_quests::date,
            quest_actions::action_type,
            quest_actions::user_phone,
        ))
        .order(daily_quests::created_at.asc())
        .into_boxed();

    if let Some(date) = date {
        query = query.filter(daily_quests::date.eq(date));
    }

    let rows: Vec<(Uuid, String, NaiveDate, String, Option<String>)> = query.load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(quest_id, quest_text, date, action_type, user_phone)| QuestWithAction {
            quest_id,
            quest_text,
            date,
            action_type,
            user_phone,
        })
        .collect())
}

/// Best-effort push to the acting member's partner. Failures are logged,
/// never surfaced: the authoritative state change already committed.
async fn push_to_partner(
    state: &AppState,
    couple: &Couple,
    actor: &str,
    title: &str,
    body: &str,
    data: HashMap<String, String>,
) {
    let token = couple.partner_fcm(actor);
    if let Err(e) = state.push.send(token, title, body, data).await {
        tracing::warn!(cpin = %couple.cpin, error = %e, "partner push failed");
    }
}

// --- Handlers ---

/// POST /love/interact - log an interaction event and mark the couple
/// active today
pub async fn interact(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InteractRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    if req.cpin.is_empty() || req.user.is_empty() || req.event.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "missing params"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    activity::log_interaction(&mut conn, &req.cpin, &req.user, &req.event)?;
    activity::touch_last_active(&mut conn, &req.cpin)?;

    Ok(Json(ApiResponse::ok(())))
}

/// GET /love/state/:cpin - derived couple state plus today's quests
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Path(cpin): Path<String>,
) -> AppResult<Json<ApiResponse<LoveStateResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;
    let today = Local::now().date_naive();

    let couple_row: Option<CoupleState> = couple_state::table
        .find(&cpin)
        .first::<CoupleState>(&mut conn)
        .optional()?;

    let today_completed: bool = completed_days::table
        .filter(completed_days::cpin.eq(&cpin))
        .filter(completed_days::date.eq(today))
        .select(completed_days::has_completed)
        .first::<bool>(&mut conn)
        .optional()?
        .unwrap_or(false);

    let todays_quests = load_quests_with_actions(&mut conn, &cpin, Some(today))?;

    let (love_score, streak_days, last_streak_date, last_active_date) = couple_row
        .map(|s| (s.love_score, s.streak_days, s.last_streak_date, s.last_active_date))
        .unwrap_or((0, 0, None, None));

    Ok(Json(ApiResponse::ok(LoveStateResponse {
        love_score,
        streak_days,
        last_streak_date,
        last_active_date,
        today_completed,
        todays_quests,
    })))
}

/// GET /love/quests/:cpin - the couple's active quests with their action
/// state
pub async fn list_quests(
    State(state): State<Arc<AppState>>,
    Path(cpin): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<QuestWithAction>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let rows = load_quests_with_actions(&mut conn, &cpin, None)?;

    Ok(Json(ApiResponse::ok(rows)))
}

/// POST /love/quest/complete - claim a quest as done and ask the partner
/// for approval
pub async fn complete_quest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompleteQuestRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    if req.cpin.is_empty() || req.user_phone.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "missing params"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    quests::claim_completion(&mut conn, req.quest_id, &req.cpin, &req.user_phone)?;

    let couple = load_couple(&mut conn, &req.cpin)?;
    drop(conn);

    // Foreground clients get the socket event, backgrounded ones the push
    let _ = state.io.to(req.cpin.clone()).emit(
        "quest-pending",
        &serde_json::json!({
            "cpin": req.cpin,
            "quest_id": req.quest_id,
            "from": req.user_phone,
        }),
    );

    push_to_partner(
        &state,
        &couple,
        &req.user_phone,
        "Quest pending approval ❤️",
        "Your partner completed a quest. Tap to review.",
        HashMap::from([
            ("type".to_string(), "quest_pending".to_string()),
            ("quest_id".to_string(), req.quest_id.to_string()),
            ("cpin".to_string(), req.cpin.clone()),
        ]),
    )
    .await;

    Ok(Json(ApiResponse::ok(())))
}

/// POST /love/quest/approve - approve or reject the partner's completion
/// claim
pub async fn approve_quest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApproveQuestRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    if req.cpin.is_empty() || req.approver_phone.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "missing params"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let outcome = quests::record_approval(
        &mut conn,
        req.quest_id,
        &req.cpin,
        &req.approver_phone,
        req.approved,
    )?;

    if outcome.day_completed {
        tracing::info!(cpin = %req.cpin, "mutual completion reached for today");
    }

    let couple = load_couple(&mut conn, &req.cpin)?;
    drop(conn);

    let _ = state.io.to(req.cpin.clone()).emit(
        "quest-updated",
        &serde_json::json!({
            "cpin": req.cpin,
            "quest_id": req.quest_id,
            "approved": req.approved,
            "by": req.approver_phone,
        }),
    );

    let (title, body) = if req.approved {
        ("Quest approved 🎉", "Your partner approved your quest!")
    } else {
        ("Quest rejected", "Your partner rejected the quest.")
    };

    push_to_partner(
        &state,
        &couple,
        &req.approver_phone,
        title,
        body,
        HashMap::from([
            ("type".to_string(), "quest_updated".to_string()),
            ("quest_id".to_string(), req.quest_id.to_string()),
            ("approved".to_string(), req.approved.to_string()),
            ("cpin".to_string(), req.cpin.clone()),
        ]),
    )
    .await;

    Ok(Json(ApiResponse::ok(())))
}

/// POST /love/fcm - register a member's device token
pub async fn register_fcm(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterFcmRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    if req.cpin.is_empty() || req.phone.is_empty() || req.fcm_token.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "missing params"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let couple = load_couple(&mut conn, &req.cpin)?;

    if couple.user1.as_deref() == Some(req.phone.as_str()) {
        diesel::update(couples::table.find(&req.cpin))
            .set(couples::user1_fcm.eq(&req.fcm_token))
            .execute(&mut conn)?;
    } else if couple.user2.as_deref() == Some(req.phone.as_str()) {
        diesel::update(couples::table.find(&req.cpin))
            .set(couples::user2_fcm.eq(&req.fcm_token))
            .execute(&mut conn)?;
    } else {
        return Err(AppError::new(
            ErrorCode::NotCoupleMember,
            "phone is not a member of this couple",
        ));
    }

    Ok(Json(ApiResponse::ok(())))
}

use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use tara_shared::errors::{AppError, AppResult, ErrorCode};
use tara_shared::types::api::ApiResponse;

use crate::models::NewCouple;
use crate::schema::couples;
use crate::AppState;

const CPIN_LENGTH: usize = 7;
const CPIN_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random 7-char lowercase alphanumeric pairing code.
pub fn generate_cpin<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CPIN_LENGTH)
        .map(|_| CPIN_CHARS[rng.gen_range(0..CPIN_CHARS.len())] as char)
        .collect()
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 5, max = 20, message = "invalid phone number"))]
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub cpin: String,
}

/// POST /register - create a new couple with this phone as the first member
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<ApiResponse<RegisterResponse>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    // A phone can belong to exactly one couple
    let existing: Option<String> = couples::table
        .filter(couples::user1.eq(&req.phone).or(couples::user2.eq(&req.phone)))
        .select(couples::cpin)
        .first::<String>(&mut conn)
        .optional()?;

    if let Some(cpin) = existing {
        return Err(AppError::with_details(
            ErrorCode::AlreadyRegistered,
            "phone already registered",
            serde_json::json!({ "cpin": cpin }),
        ));
    }

    // Retry on the (unlikely) cpin collision
    let cpin = loop {
        let candidate = generate_cpin(&mut rand::thread_rng());
        let taken: i64 = couples::table
            .filter(couples::cpin.eq(&candidate))
            .count()
            .get_result(&mut conn)?;
        if taken == 0 {
            break candidate;
        }
    };

    diesel::insert_into(couples::table)
        .values(&NewCouple {
            cpin: cpin.clone(),
            user1: Some(req.phone.clone()),
        })
        .execute(&mut conn)?;

    tracing::info!(cpin = %cpin, "new couple registered");

    Ok(Json(ApiResponse::ok_with_message(
        RegisterResponse { cpin },
        "new user registered",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn cpin_is_seven_lowercase_alphanumeric_chars() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let cpin = generate_cpin(&mut rng);
            assert_eq!(cpin.len(), CPIN_LENGTH);
            assert!(cpin
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn cpins_vary_across_draws() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = generate_cpin(&mut rng);
        let b = generate_cpin(&mut rng);
        assert_ne!(a, b);
    }
}

use chrono::Local;
use diesel::prelude::*;
use diesel::sql_types::{Integer, VarChar};

use tara_shared::errors::AppResult;

use crate::models::CoupleState;
use crate::schema::{completed_days, couple_state, interaction_events, media_items, messages};

/// Activity counters feeding the love score formula.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActivityCounts {
    pub messages: i64,
    pub media: i64,
    pub completed_days: i64,
    pub streak_days: i64,
    pub games: i64,
    pub days_inactive: i64,
}

/// The love score formula. Weights are fixed for compatibility with
/// existing client expectations; change them and every stored score
/// shifts meaning.
pub fn compute_score(counts: &ActivityCounts) -> i32 {
    let inactivity_penalty = (counts.days_inactive - 3).max(0) as f64;

    let score = 3.0 * (counts.messages as f64).ln_1p()
        + 6.0 * (counts.media as f64).ln_1p()
        + 8.0 * (counts.completed_days as f64).sqrt()
        + 5.0 * (counts.streak_days as f64).sqrt()
        + 4.0 * (counts.games as f64).ln_1p()
        - 2.0 * inactivity_penalty;

    (score.round().max(0.0)) as i32
}

/// Gather activity counters for a couple from the store.
pub fn gather_counts(conn: &mut PgConnection, cpin: &str) -> AppResult<ActivityCounts> {
    let today = Local::now().date_naive();

    let message_count: i64 = messages::table
        .filter(messages::cpin.eq(cpin))
        .filter(messages::message.ne(""))
        .count()
        .get_result(conn)?;

    let media_count: i64 = media_items::table
        .filter(media_items::cpin.eq(cpin))
        .count()
        .get_result(conn)?;

    let completed_count: i64 = completed_days::table
        .filter(completed_days::cpin.eq(cpin))
        .filter(completed_days::has_completed.eq(true))
        .count()
        .get_result(conn)?;

    let game_count: i64 = interaction_events::table
        .filter(interaction_events::cpin.eq(cpin))
        .filter(interaction_events::event_type.eq("game_played"))
        .count()
        .get_result(conn)?;

    let state: Option<CoupleState> = couple_state::table
        .find(cpin)
        .first::<CoupleState>(conn)
        .optional()?;

    let streak = state.as_ref().map_or(0, |s| s.streak_days) as i64;
    let days_inactive = state
        .as_ref()
        .and_then(|s| s.last_active_date)
        .map_or(0, |last| (today - last).num_days().max(0));

    Ok(ActivityCounts {
        messages: message_count,
        media: media_count,
        completed_days: completed_count,
        streak_days: streak,
        games: game_count,
        days_inactive,
    })
}

/// Recompute and persist the love score for a couple.
///
/// Pure aggregation over the store plus one upsert; no other side effects,
/// so it is safe to call redundantly from the approval flow and from the
/// nightly sweep.
pub fn recompute_score(conn: &mut PgConnection, cpin: &str) -> AppResult<i32> {
    let counts = gather_counts(conn, cpin)?;
    let score = compute_score(&counts);
    let today = Local::now().date_naive();

    diesel::sql_query(
        "INSERT INTO couple_state (cpin, love_score, updated_at) \
         VALUES ($1, $2, now()) \
         ON CONFLICT (cpin) DO UPDATE SET love_score = EXCLUDED.love_score, updated_at = now()"
    )
    .bind::<VarChar, _>(cpin)
    .bind::<Integer, _>(score)
    .execute(conn)?;

    tracing::debug!(
        cpin = %cpin,
        score = score,
        messages = counts.messages,
        media = counts.media,
        completed_days = counts.completed_days,
        streak = counts.streak_days,
        games = counts.games,
        date = %today,
        "love score recomputed"
    );

    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_matches_reference_example() {
        // 3·ln(11) + 6·ln(3) + 8·sqrt(4) + 5·sqrt(6) + 4·ln(2) ≈ 44.8 → 45
        let counts = ActivityCounts {
            messages: 10,
            media: 2,
            completed_days: 4,
            streak_days: 6,
            games: 1,
            days_inactive: 0,
        };
        assert_eq!(compute_score(&counts), 45);
    }

    #[test]
    fn score_for_inactive_new_couple_is_zero() {
        assert_eq!(compute_score(&ActivityCounts::default()), 0);
    }

    #[test]
    fn score_never_goes_negative() {
        let counts = ActivityCounts {
            days_inactive: 100,
            ..Default::default()
        };
        assert_eq!(compute_score(&counts), 0);
    }

    #[test]
    fn inactivity_penalty_has_three_day_grace() {
        let active = ActivityCounts {
            messages: 100,
            days_inactive: 3,
            ..Default::default()
        };
        let stale = ActivityCounts {
            messages: 100,
            days_inactive: 5,
            ..Default::default()
        };
        // 2 days past the grace window costs 2·2 = 4 points
        assert_eq!(compute_score(&active) - compute_score(&stale), 4);
    }
}

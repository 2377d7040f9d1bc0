use chrono::{Local, NaiveDate};
use diesel::prelude::*;
use diesel::sql_types::{Date as DieselDate, Integer, VarChar};

use tara_shared::errors::AppResult;

use crate::models::CoupleState;
use crate::schema::couple_state;

/// Compute the streak value a touch should write today, or `None` when
/// today is already counted.
///
/// Gaps longer than one day are not detected here; the reset on a missed
/// day happens during daily quest generation, which runs before any touch
/// can occur for the new day.
pub fn next_streak(
    streak_days: i32,
    last_streak_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<i32> {
    match last_streak_date {
        None => Some(1),
        Some(last) if last == today => None,
        Some(_) => Some(streak_days + 1),
    }
}

/// Extend the couple's streak for today. Idempotent per calendar day.
pub fn touch_streak(conn: &mut PgConnection, cpin: &str) -> AppResult<()> {
    let today = Local::now().date_naive();

    let state: Option<CoupleState> = couple_state::table
        .find(cpin)
        .first::<CoupleState>(conn)
        .optional()?;

    let (streak_days, last_date) = state
        .map(|s| (s.streak_days, s.last_streak_date))
        .unwrap_or((0, None));

    let Some(new_streak) = next_streak(streak_days, last_date, today) else {
        // already counted today
        return Ok(());
    };

    diesel::sql_query(
        "INSERT INTO couple_state (cpin, streak_days, last_streak_date, updated_at) \
         VALUES ($1, $2, $3, now()) \
         ON CONFLICT (cpin) DO UPDATE SET \
           streak_days = EXCLUDED.streak_days, \
           last_streak_date = EXCLUDED.last_streak_date, \
           updated_at = now()"
    )
    .bind::<VarChar, _>(cpin)
    .bind::<Integer, _>(new_streak)
    .bind::<DieselDate, _>(today)
    .execute(conn)?;

    tracing::debug!(cpin = %cpin, streak_days = new_streak, "streak touched");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_touch_starts_streak_at_one() {
        let today = date(2024, 3, 10);
        assert_eq!(next_streak(0, None, today), Some(1));
    }

    #[test]
    fn touch_after_yesterday_extends_streak() {
        let today = date(2024, 3, 10);
        assert_eq!(next_streak(5, Some(date(2024, 3, 9)), today), Some(6));
    }

    #[test]
    fn second_touch_same_day_is_noop() {
        let today = date(2024, 3, 10);
        assert_eq!(next_streak(6, Some(today), today), None);
    }

    #[test]
    fn older_gap_still_extends_without_reset() {
        // reset-on-miss is quest generation's job, not the tracker's
        let today = date(2024, 3, 10);
        assert_eq!(next_streak(3, Some(date(2024, 3, 5)), today), Some(4));
    }
}

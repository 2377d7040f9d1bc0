use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use diesel::prelude::*;

use tara_shared::clients::db::DbPool;

use crate::schema::couple_state;
use crate::services::{quests, score};
use crate::AppState;

/// Daily quest generation runs at local midnight; the score sweep follows
/// shortly after so it sees post-reset streaks.
const QUEST_GENERATION_TIME: (u32, u32) = (0, 0);
const SCORE_SWEEP_TIME: (u32, u32) = (0, 5);

/// Seconds from `now` until the next occurrence of `target` local time.
pub fn seconds_until_next(now: NaiveDateTime, target: NaiveTime) -> u64 {
    let today_target = now.date().and_time(target);
    let next = if now < today_target {
        today_target
    } else {
        today_target + Duration::days(1)
    };
    (next - now).num_seconds().max(1) as u64
}

/// Recompute the love score for every couple. Idempotent and re-runnable.
pub fn sweep_scores(pool: &DbPool) -> anyhow::Result<usize> {
    let mut conn = pool.get()?;

    let cpins: Vec<String> = couple_state::table
        .select(couple_state::cpin)
        .load(&mut conn)?;

    let mut updated = 0;
    for cpin in &cpins {
        match score::recompute_score(&mut conn, cpin) {
            Ok(_) => updated += 1,
            Err(e) => {
                tracing::error!(cpin = %cpin, error = %e, "score sweep failed for couple");
            }
        }
    }

    tracing::info!(couples = cpins.len(), updated = updated, "nightly score sweep completed");

    Ok(updated)
}

/// Spawn the background task that regenerates daily quests at midnight.
pub fn spawn_quest_generation_task(state: Arc<AppState>) {
    let (hour, min) = QUEST_GENERATION_TIME;
    spawn_daily_task(state, "quest generation", hour, min, |pool| {
        let mut conn = pool.get()?;
        Ok(quests::generate_daily_quests(&mut conn)?)
    });
}

/// Spawn the background task that runs the nightly score sweep.
pub fn spawn_score_sweep_task(state: Arc<AppState>) {
    let (hour, min) = SCORE_SWEEP_TIME;
    spawn_daily_task(state, "score sweep", hour, min, sweep_scores);
}

fn spawn_daily_task<F>(state: Arc<AppState>, name: &'static str, hour: u32, min: u32, job: F)
where
    F: Fn(&DbPool) -> anyhow::Result<usize> + Send + 'static,
{
    tokio::spawn(async move {
        let target = NaiveTime::from_hms_opt(hour, min, 0).expect("valid schedule time");

        loop {
            let wait = seconds_until_next(Local::now().naive_local(), target);
            tokio::time::sleep(std::time::Duration::from_secs(wait)).await;

            tracing::info!(job = name, "running scheduled job");
            match job(&state.db) {
                Ok(n) => {
                    tracing::info!(job = name, couples = n, "scheduled job completed");
                }
                Err(e) => {
                    tracing::error!(job = name, error = %e, "scheduled job failed");
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn waits_until_later_today() {
        let target = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        assert_eq!(seconds_until_next(at(22, 0, 0), target), 3600);
    }

    #[test]
    fn rolls_over_to_tomorrow_when_past_target() {
        let target = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        // 1 second past midnight -> almost a full day
        assert_eq!(seconds_until_next(at(0, 0, 1), target), 86_399);
    }

    #[test]
    fn exactly_at_target_schedules_tomorrow() {
        let target = NaiveTime::from_hms_opt(0, 5, 0).unwrap();
        assert_eq!(seconds_until_next(at(0, 5, 0), target), 86_400);
    }
}

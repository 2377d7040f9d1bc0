use chrono::{Duration, Local, NaiveDate};
use diesel::prelude::*;
use diesel::sql_types::{Date as DieselDate, VarChar};
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use tara_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{DailyQuest, NewDailyQuest, NewQuestAction, QuestAction, QuestActionType};
use crate::schema::{completed_days, couple_state, couples, daily_quests, quest_actions};
use crate::services::{score, streak};

pub const QUESTS_PER_DAY: usize = 3;

/// Fixed quest catalog.
pub const QUEST_CATALOG: [&str; 10] = [
    "Send your partner a selfie today",
    "Tell your partner one thing you love about them",
    "Ask your partner a question you've never asked before",
    "Share a voice message today",
    "Tell partner today's highlight",
    "Send a funny meme",
    "Recall a shared memory in one message",
    "Play one game together",
    "Send a good morning or good night message",
    "Share a picture of something near you",
];

/// Pick the day's quest texts at random, without replacement.
pub fn pick_quest_texts<R: Rng + ?Sized>(rng: &mut R) -> Vec<&'static str> {
    QUEST_CATALOG
        .choose_multiple(rng, QUESTS_PER_DAY)
        .copied()
        .collect()
}

/// Guard conditions for recording an approval, in the order callers must
/// observe them: the quest has to be in `completed`, the claimant may not
/// approve their own claim, and each member gets one approval per day for
/// the couple regardless of which quest it lands on.
pub fn approval_guard(
    action_type: QuestActionType,
    claimant: Option<&str>,
    approver: &str,
    approver_already_approved_today: bool,
) -> Result<(), AppError> {
    if action_type != QuestActionType::Completed {
        return Err(AppError::new(
            ErrorCode::QuestNotCompleted,
            "quest not marked completed yet",
        ));
    }
    if claimant == Some(approver) {
        return Err(AppError::new(
            ErrorCode::SelfApproval,
            "cannot approve your own completion",
        ));
    }
    if approver_already_approved_today {
        return Err(AppError::new(
            ErrorCode::DuplicateApproval,
            "already approved a quest today",
        ));
    }
    Ok(())
}

/// A completion claim is only valid for a quest dated today; older quests
/// are replaced at midnight and can no longer be acted on.
pub fn claim_guard(quest_date: NaiveDate, today: NaiveDate) -> Result<(), AppError> {
    if quest_date != today {
        return Err(AppError::new(ErrorCode::StaleQuest, "quest not valid today"));
    }
    Ok(())
}

/// Mutual completion requires approvals from two distinct members. They do
/// not have to approve the same quest.
pub fn is_day_completed(distinct_approvers: usize) -> bool {
    distinct_approvers >= 2
}

pub fn distinct_approver_count(phones: &[Option<String>]) -> usize {
    let mut seen: Vec<&str> = phones.iter().flatten().map(String::as_str).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Replace every couple's quests for today and reset streaks for couples
/// that missed yesterday.
///
/// Keyed off the calendar date, so re-running within the same day just
/// regenerates today's set without touching streak state twice.
pub fn generate_daily_quests(conn: &mut PgConnection) -> AppResult<usize> {
    let today = Local::now().date_naive();
    let yesterday = today - Duration::days(1);

    let cpins: Vec<String> = couples::table.select(couples::cpin).load(conn)?;

    for cpin in &cpins {
        conn.transaction::<_, AppError, _>(|conn| {
            generate_for_couple(conn, cpin, today, yesterday)
        })?;
    }

    tracing::info!(couples = cpins.len(), date = %today, "daily quests generated");

    Ok(cpins.len())
}

fn generate_for_couple(
    conn: &mut PgConnection,
    cpin: &str,
    today: NaiveDate,
    yesterday: NaiveDate,
) -> AppResult<()> {
    let completed_yesterday: i64 = completed_days::table
        .filter(completed_days::cpin.eq(cpin))
        .filter(completed_days::date.eq(yesterday))
        .filter(completed_days::has_completed.eq(true))
        .count()
        .get_result(conn)?;

    if completed_yesterday == 0 {
        // broke the chain
        diesel::update(couple_state::table.find(cpin))
            .set((
                couple_state::streak_days.eq(0),
                couple_state::last_streak_date.eq(None::<NaiveDate>),
                couple_state::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)?;
    }

    // Prior quests are replaced, not retained
    diesel::delete(quest_actions::table.filter(quest_actions::cpin.eq(cpin))).execute(conn)?;
    diesel::delete(daily_quests::table.filter(daily_quests::cpin.eq(cpin))).execute(conn)?;

    let texts = pick_quest_texts(&mut rand::thread_rng());

    for text in texts {
        let quest_id = Uuid::new_v4();

        diesel::insert_into(daily_quests::table)
            .values(&NewDailyQuest {
                quest_id,
                cpin: cpin.to_string(),
                date: today,
                quest_text: text.to_string(),
            })
            .execute(conn)?;

        diesel::insert_into(quest_actions::table)
            .values(&NewQuestAction {
                quest_id,
                cpin: cpin.to_string(),
                user_phone: None,
                action_type: QuestActionType::Pending.as_str().to_string(),
            })
            .execute(conn)?;
    }

    Ok(())
}

/// One partner claims a quest as done. Not authoritative until the other
/// partner approves.
pub fn claim_completion(
    conn: &mut PgConnection,
    quest_id: Uuid,
    cpin: &str,
    actor: &str,
) -> AppResult<DailyQuest> {
    let today = Local::now().date_naive();

    conn.transaction::<_, AppError, _>(|conn| {
        let quest: DailyQuest = daily_quests::table
            .find(quest_id)
            .first::<DailyQuest>(conn)
            .optional()?
            .filter(|q| q.cpin == cpin)
            .ok_or_else(|| AppError::new(ErrorCode::QuestNotFound, "unknown quest"))?;

        claim_guard(quest.date, today)?;

        // Lock the status cell so racing claims/approvals serialize on it
        let _action: QuestAction = quest_actions::table
            .find(quest_id)
            .for_update()
            .first::<QuestAction>(conn)?;

        diesel::update(quest_actions::table.find(quest_id))
            .set((
                quest_actions::action_type.eq(QuestActionType::Completed.as_str()),
                quest_actions::user_phone.eq(Some(actor)),
                quest_actions::action_at.eq(diesel::dsl::now),
            ))
            .execute(conn)?;

        Ok(quest)
    })
}

#[derive(Debug)]
pub struct ApprovalOutcome {
    pub quest: DailyQuest,
    pub approved: bool,
    pub day_completed: bool,
}

/// The partner approves or rejects a claimed completion.
///
/// The approval itself commits first; mutual completion is then settled
/// from committed rows, and on the approval that brings the day's distinct
/// approvers to two the completed-day flag is upserted and streak/score
/// are recomputed. Streak/score failures are logged, never propagated, so
/// the recorded approval stands.
pub fn record_approval(
    conn: &mut PgConnection,
    quest_id: Uuid,
    cpin: &str,
    approver: &str,
    approved: bool,
) -> AppResult<ApprovalOutcome> {
    let today = Local::now().date_naive();

    let quest = conn.transaction::<_, AppError, _>(|conn| {
        let quest: DailyQuest = daily_quests::table
            .find(quest_id)
            .first::<DailyQuest>(conn)
            .optional()?
            .filter(|q| q.cpin == cpin)
            .ok_or_else(|| AppError::new(ErrorCode::QuestNotFound, "unknown quest"))?;

        let action: QuestAction = quest_actions::table
            .find(quest_id)
            .for_update()
            .first::<QuestAction>(conn)?;

        let action_type: QuestActionType = action
            .action_type
            .parse()
            .map_err(|e: String| AppError::internal(e))?;

        let prior_approvals: i64 = quest_actions::table
            .inner_join(daily_quests::table)
            .filter(daily_quests::cpin.eq(&quest.cpin))
            .filter(daily_quests::date.eq(today))
            .filter(quest_actions::action_type.eq(QuestActionType::Approved.as_str()))
            .filter(quest_actions::user_phone.eq(approver))
            .count()
            .get_result(conn)?;

        approval_guard(
            action_type,
            action.user_phone.as_deref(),
            approver,
            prior_approvals > 0,
        )?;

        let new_type = if approved {
            QuestActionType::Approved
        } else {
            QuestActionType::Rejected
        };

        diesel::update(quest_actions::table.find(quest_id))
            .set((
                quest_actions::action_type.eq(new_type.as_str()),
                quest_actions::user_phone.eq(Some(approver)),
                quest_actions::action_at.eq(diesel::dsl::now),
            ))
            .execute(conn)?;

        Ok(quest)
    })?;

    let day_completed = if approved {
        settle_day_completion(conn, &quest.cpin, today)?
    } else {
        false
    };

    if day_completed {
        if let Err(e) = streak::touch_streak(conn, &quest.cpin) {
            tracing::error!(cpin = %quest.cpin, error = %e, "streak update failed after approval");
        }
        if let Err(e) = score::recompute_score(conn, &quest.cpin) {
            tracing::error!(cpin = %quest.cpin, error = %e, "score recompute failed after approval");
        }
    }

    Ok(ApprovalOutcome {
        quest,
        approved,
        day_completed,
    })
}

/// Counts committed approvals only, so it must run after the approval
/// transaction commits. Partners approving different quests concurrently
/// lock different rows, and a count taken inside either transaction could
/// miss the other's uncommitted write; counted afterwards, whichever
/// approval lands second sees both. The upsert is idempotent.
fn settle_day_completion(
    conn: &mut PgConnection,
    cpin: &str,
    today: NaiveDate,
) -> AppResult<bool> {
    let approvers: Vec<Option<String>> = quest_actions::table
        .inner_join(daily_quests::table)
        .filter(daily_quests::cpin.eq(cpin))
        .filter(daily_quests::date.eq(today))
        .filter(quest_actions::action_type.eq(QuestActionType::Approved.as_str()))
        .select(quest_actions::user_phone)
        .load(conn)?;

    if !is_day_completed(distinct_approver_count(&approvers)) {
        return Ok(false);
    }

    diesel::sql_query(
        "INSERT INTO completed_days (cpin, date, has_completed) \
         VALUES ($1, $2, true) \
         ON CONFLICT (cpin, date) DO UPDATE SET has_completed = true"
    )
    .bind::<VarChar, _>(cpin)
    .bind::<DieselDate, _>(today)
    .execute(conn)?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn picks_three_distinct_texts() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let texts = pick_quest_texts(&mut rng);
            assert_eq!(texts.len(), QUESTS_PER_DAY);
            let mut unique: Vec<_> = texts.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), QUESTS_PER_DAY, "duplicate text for seed {seed}");
            for t in texts {
                assert!(QUEST_CATALOG.contains(&t));
            }
        }
    }

    #[test]
    fn catalog_has_no_duplicates() {
        let mut texts: Vec<_> = QUEST_CATALOG.to_vec();
        texts.sort();
        texts.dedup();
        assert_eq!(texts.len(), QUEST_CATALOG.len());
    }

    #[test]
    fn guard_rejects_pending_quest() {
        let err = approval_guard(QuestActionType::Pending, None, "222", false).unwrap_err();
        assert_guard_code(err, ErrorCode::QuestNotCompleted);
    }

    #[test]
    fn guard_rejects_already_decided_quest() {
        let err =
            approval_guard(QuestActionType::Approved, Some("111"), "222", false).unwrap_err();
        assert_guard_code(err, ErrorCode::QuestNotCompleted);
    }

    #[test]
    fn guard_rejects_self_approval() {
        let err =
            approval_guard(QuestActionType::Completed, Some("111"), "111", false).unwrap_err();
        assert_guard_code(err, ErrorCode::SelfApproval);
    }

    #[test]
    fn guard_rejects_second_approval_same_day() {
        let err =
            approval_guard(QuestActionType::Completed, Some("111"), "222", true).unwrap_err();
        assert_guard_code(err, ErrorCode::DuplicateApproval);
    }

    #[test]
    fn guard_allows_partner_first_approval() {
        assert!(approval_guard(QuestActionType::Completed, Some("111"), "222", false).is_ok());
    }

    #[test]
    fn day_completes_only_with_two_distinct_approvers() {
        assert!(!is_day_completed(0));
        assert!(!is_day_completed(1));
        assert!(is_day_completed(2));
        assert!(is_day_completed(3));
    }

    #[test]
    fn approvals_on_different_quests_by_both_members_complete_the_day() {
        // Each member approved the other's quest; the rows are distinct
        let approvers = vec![Some("111".to_string()), Some("222".to_string())];
        assert_eq!(distinct_approver_count(&approvers), 2);
        assert!(is_day_completed(distinct_approver_count(&approvers)));
    }

    #[test]
    fn one_member_approving_twice_does_not_complete_the_day() {
        let approvers = vec![Some("111".to_string()), Some("111".to_string()), None];
        assert_eq!(distinct_approver_count(&approvers), 1);
        assert!(!is_day_completed(distinct_approver_count(&approvers)));
    }

    #[test]
    fn claiming_yesterdays_quest_is_stale() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let err = claim_guard(today - Duration::days(1), today).unwrap_err();
        assert_guard_code(err, ErrorCode::StaleQuest);
    }

    #[test]
    fn claiming_todays_quest_passes_the_date_guard() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert!(claim_guard(today, today).is_ok());
    }

    fn assert_guard_code(err: AppError, expected: ErrorCode) {
        match err {
            AppError::Known { code, .. } => assert_eq!(code, expected),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}

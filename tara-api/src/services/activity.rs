use diesel::prelude::*;
use diesel::sql_types::VarChar;

use tara_shared::errors::AppResult;

use crate::models::NewInteractionEvent;
use crate::schema::interaction_events;

/// Append an interaction event to the couple's activity log.
pub fn log_interaction(
    conn: &mut PgConnection,
    cpin: &str,
    user_phone: &str,
    event_type: &str,
) -> AppResult<()> {
    diesel::insert_into(interaction_events::table)
        .values(&NewInteractionEvent {
            cpin: cpin.to_string(),
            user_phone: user_phone.to_string(),
            event_type: event_type.to_string(),
        })
        .execute(conn)?;

    Ok(())
}

/// Mark the couple active today, creating the state row lazily if this is
/// their first activity.
pub fn touch_last_active(conn: &mut PgConnection, cpin: &str) -> AppResult<()> {
    diesel::sql_query(
        "INSERT INTO couple_state (cpin, last_active_date, updated_at) \
         VALUES ($1, CURRENT_DATE, now()) \
         ON CONFLICT (cpin) DO UPDATE SET last_active_date = CURRENT_DATE, updated_at = now()"
    )
    .bind::<VarChar, _>(cpin)
    .execute(conn)?;

    Ok(())
}

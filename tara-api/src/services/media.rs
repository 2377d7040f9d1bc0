use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use tara_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{MediaItem, NewMediaView, VisibilityType};
use crate::schema::{media_items, media_views};

/// Outcome of a view authorization check, decided before any row is
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDecision {
    /// Uploader views are free and unlimited; nothing is recorded.
    AllowUploader,
    /// First view by this partner; a view row gets recorded.
    Allow,
    Expired,
    AlreadyViewed,
}

/// Decide whether a viewer may see a media item.
///
/// The one-logical-view rule applies to every non-uploader viewer, even on
/// permanent media.
pub fn decide_view(
    uploader: &str,
    viewer: &str,
    visibility: VisibilityType,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    already_viewed: bool,
) -> ViewDecision {
    if uploader == viewer {
        return ViewDecision::AllowUploader;
    }

    if visibility == VisibilityType::Timed {
        if let Some(expiry) = expires_at {
            if expiry < now {
                return ViewDecision::Expired;
            }
        }
    }

    if already_viewed {
        return ViewDecision::AlreadyViewed;
    }

    ViewDecision::Allow
}

/// Whether a consume call by this viewer deletes the item.
pub fn consume_deletes(uploader: &str, viewer: &str, visibility: VisibilityType) -> bool {
    uploader != viewer && visibility.is_ephemeral()
}

#[derive(Debug, serde::Serialize)]
pub struct ViewOutcome {
    pub allowed: bool,
    pub uploader_view: bool,
}

/// Authorize a single view of a media item, recording it for non-uploader
/// viewers.
pub fn authorize_view(
    conn: &mut PgConnection,
    media_id: Uuid,
    viewer: &str,
) -> AppResult<ViewOutcome> {
    let item: MediaItem = media_items::table
        .find(media_id)
        .first::<MediaItem>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::MediaNotFound, "media not found"))?;

    let visibility: VisibilityType = item
        .visibility_type
        .parse()
        .map_err(|e: String| AppError::internal(e))?;

    let already_viewed: i64 = media_views::table
        .filter(media_views::media_id.eq(media_id))
        .filter(media_views::viewer_phone.eq(viewer))
        .count()
        .get_result(conn)?;

    match decide_view(
        &item.uploader,
        viewer,
        visibility,
        item.expires_at,
        Utc::now(),
        already_viewed > 0,
    ) {
        ViewDecision::AllowUploader => Ok(ViewOutcome {
            allowed: true,
            uploader_view: true,
        }),
        ViewDecision::Allow => {
            diesel::insert_into(media_views::table)
                .values(&NewMediaView {
                    media_id,
                    viewer_phone: viewer.to_string(),
                })
                .execute(conn)?;

            Ok(ViewOutcome {
                allowed: true,
                uploader_view: false,
            })
        }
        ViewDecision::Expired => Err(AppError::new(ErrorCode::MediaExpired, "media expired")),
        ViewDecision::AlreadyViewed => {
            Err(AppError::new(ErrorCode::AlreadyViewed, "already viewed"))
        }
    }
}

#[derive(Debug)]
pub struct ConsumeOutcome {
    pub deleted: bool,
    /// Set when the row was deleted; the caller owes a best-effort delete
    /// of the backing object after commit.
    pub storage_path: Option<String>,
}

/// Consume a media item, deleting ephemeral items viewed by the partner.
///
/// Runs under a row lock so two concurrent consumers cannot both observe
/// the item and double-delete. A missing item is a soft success, not an
/// error: the other partner got there first.
pub fn consume(conn: &mut PgConnection, media_id: Uuid, viewer: &str) -> AppResult<ConsumeOutcome> {
    conn.transaction::<_, AppError, _>(|conn| {
        let item: Option<MediaItem> = media_items::table
            .find(media_id)
            .for_update()
            .first::<MediaItem>(conn)
            .optional()?;

        let Some(item) = item else {
            // already gone
            return Ok(ConsumeOutcome {
                deleted: false,
                storage_path: None,
            });
        };

        let visibility: VisibilityType = item
            .visibility_type
            .parse()
            .map_err(|e: String| AppError::internal(e))?;

        if !consume_deletes(&item.uploader, viewer, visibility) {
            return Ok(ConsumeOutcome {
                deleted: false,
                storage_path: None,
            });
        }

        diesel::delete(media_views::table.filter(media_views::media_id.eq(media_id)))
            .execute(conn)?;
        diesel::delete(media_items::table.find(media_id)).execute(conn)?;

        Ok(ConsumeOutcome {
            deleted: true,
            storage_path: Some(item.storage_path),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const UPLOADER: &str = "111";
    const PARTNER: &str = "222";

    #[test]
    fn uploader_always_allowed_without_recording() {
        let now = Utc::now();
        let decision = decide_view(
            UPLOADER,
            UPLOADER,
            VisibilityType::Timed,
            Some(now - Duration::hours(1)), // even past expiry
            now,
            true,
        );
        assert_eq!(decision, ViewDecision::AllowUploader);
    }

    #[test]
    fn partner_first_view_allowed() {
        let now = Utc::now();
        let decision = decide_view(UPLOADER, PARTNER, VisibilityType::Permanent, None, now, false);
        assert_eq!(decision, ViewDecision::Allow);
    }

    #[test]
    fn partner_second_view_rejected_even_on_permanent() {
        let now = Utc::now();
        let decision = decide_view(UPLOADER, PARTNER, VisibilityType::Permanent, None, now, true);
        assert_eq!(decision, ViewDecision::AlreadyViewed);
    }

    #[test]
    fn timed_item_past_expiry_rejected() {
        let now = Utc::now();
        let decision = decide_view(
            UPLOADER,
            PARTNER,
            VisibilityType::Timed,
            Some(now - Duration::seconds(1)),
            now,
            false,
        );
        assert_eq!(decision, ViewDecision::Expired);
    }

    #[test]
    fn timed_item_before_expiry_allowed() {
        let now = Utc::now();
        let decision = decide_view(
            UPLOADER,
            PARTNER,
            VisibilityType::Timed,
            Some(now + Duration::minutes(5)),
            now,
            false,
        );
        assert_eq!(decision, ViewDecision::Allow);
    }

    #[test]
    fn consume_deletes_ephemeral_for_partner_only() {
        assert!(consume_deletes(UPLOADER, PARTNER, VisibilityType::OneTime));
        assert!(consume_deletes(UPLOADER, PARTNER, VisibilityType::Timed));
        assert!(!consume_deletes(UPLOADER, PARTNER, VisibilityType::Permanent));
        assert!(!consume_deletes(UPLOADER, UPLOADER, VisibilityType::OneTime));
        assert!(!consume_deletes(UPLOADER, UPLOADER, VisibilityType::Timed));
    }
}

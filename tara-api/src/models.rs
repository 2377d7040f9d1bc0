use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{
    completed_days, couple_state, couples, daily_quests, interaction_events, locations,
    media_items, media_views, messages, profiles,
};
use crate::schema::quest_actions;

// --- Couple ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = couples, primary_key(cpin))]
pub struct Couple {
    pub cpin: String,
    pub user1: Option<String>,
    pub user2: Option<String>,
    pub user1_fcm: Option<String>,
    pub user2_fcm: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Couple {
    /// The other member's phone, given one member's phone.
    pub fn partner_of(&self, phone: &str) -> Option<&str> {
        if self.user1.as_deref() == Some(phone) {
            self.user2.as_deref()
        } else if self.user2.as_deref() == Some(phone) {
            self.user1.as_deref()
        } else {
            None
        }
    }

    /// The other member's device token, given the acting member's phone.
    pub fn partner_fcm(&self, phone: &str) -> Option<&str> {
        if self.user1.as_deref() == Some(phone) {
            self.user2_fcm.as_deref()
        } else if self.user2.as_deref() == Some(phone) {
            self.user1_fcm.as_deref()
        } else {
            None
        }
    }

    pub fn is_member(&self, phone: &str) -> bool {
        self.user1.as_deref() == Some(phone) || self.user2.as_deref() == Some(phone)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = couples)]
pub struct NewCouple {
    pub cpin: String,
    pub user1: Option<String>,
}

// --- CoupleState ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = couple_state, primary_key(cpin))]
pub struct CoupleState {
    pub cpin: String,
    pub love_score: i32,
    pub streak_days: i32,
    pub last_streak_date: Option<NaiveDate>,
    pub last_active_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

// --- InteractionEvent ---

#[derive(Debug, Queryable, Identifiable, Serialize)]
#[diesel(table_name = interaction_events)]
pub struct InteractionEvent {
    pub id: Uuid,
    pub cpin: String,
    pub user_phone: String,
    pub event_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = interaction_events)]
pub struct NewInteractionEvent {
    pub cpin: String,
    pub user_phone: String,
    pub event_type: String,
}

// --- Message ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub cpin: String,
    pub sender: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub cpin: String,
    pub sender: String,
    pub message: String,
}

// --- DailyQuest / QuestAction ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = daily_quests, primary_key(quest_id))]
pub struct DailyQuest {
    pub quest_id: Uuid,
    pub cpin: String,
    pub date: NaiveDate,
    pub quest_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = daily_quests)]
pub struct NewDailyQuest {
    pub quest_id: Uuid,
    pub cpin: String,
    pub date: NaiveDate,
    pub quest_text: String,
}

/// Quest action status. One mutable status cell per quest, not a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestActionType {
    Pending,
    Completed,
    Approved,
    Rejected,
}

impl QuestActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for QuestActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("unknown quest action type: {s}")),
        }
    }
}

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = quest_actions, primary_key(quest_id))]
pub struct QuestAction {
    pub quest_id: Uuid,
    pub cpin: String,
    pub user_phone: Option<String>,
    pub action_type: String,
    pub action_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = quest_actions)]
pub struct NewQuestAction {
    pub quest_id: Uuid,
    pub cpin: String,
    pub user_phone: Option<String>,
    pub action_type: String,
}

// --- CompletedDay ---

#[derive(Debug, Queryable, Insertable, Serialize)]
#[diesel(table_name = completed_days)]
pub struct CompletedDay {
    pub cpin: String,
    pub date: NaiveDate,
    pub has_completed: bool,
}

// --- MediaItem / MediaView ---

/// Media visibility kinds. `timed` and `one_time` items are ephemeral and
/// get deleted on consumption; `permanent` items never auto-delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityType {
    Permanent,
    Timed,
    OneTime,
}

impl VisibilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permanent => "permanent",
            Self::Timed => "timed",
            Self::OneTime => "one_time",
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Timed | Self::OneTime)
    }
}

impl std::str::FromStr for VisibilityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permanent" => Ok(Self::Permanent),
            "timed" => Ok(Self::Timed),
            "one_time" => Ok(Self::OneTime),
            _ => Err(format!("unknown visibility type: {s}")),
        }
    }
}

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = media_items)]
pub struct MediaItem {
    pub id: Uuid,
    pub cpin: String,
    pub uploader: String,
    pub storage_path: String,
    pub download_url: String,
    pub media_type: String,
    pub visibility_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<i32>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = media_items)]
pub struct NewMediaItem {
    pub cpin: String,
    pub uploader: String,
    pub storage_path: String,
    pub download_url: String,
    pub media_type: String,
    pub visibility_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<i32>,
}

#[derive(Debug, Queryable, Identifiable, Serialize)]
#[diesel(table_name = media_views)]
pub struct MediaView {
    pub id: Uuid,
    pub media_id: Uuid,
    pub viewer_phone: String,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = media_views)]
pub struct NewMediaView {
    pub media_id: Uuid,
    pub viewer_phone: String,
}

// --- Location ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = locations, primary_key(cpin))]
pub struct Location {
    pub cpin: String,
    pub user1_phone: Option<String>,
    pub user1_lat: Option<f64>,
    pub user1_lon: Option<f64>,
    pub user1_updated: Option<DateTime<Utc>>,
    pub user2_phone: Option<String>,
    pub user2_lat: Option<f64>,
    pub user2_lon: Option<f64>,
    pub user2_updated: Option<DateTime<Utc>>,
}

// --- Profile ---

#[derive(Debug, Queryable, Serialize, Clone)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub cpin: String,
    pub user_phone: String,
    pub display_name: Option<String>,
    pub status_message: Option<String>,
    pub anniversary_date: Option<NaiveDate>,
    pub profile_pic_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn couple(user1: Option<&str>, user2: Option<&str>) -> Couple {
        Couple {
            cpin: "abc1234".into(),
            user1: user1.map(String::from),
            user2: user2.map(String::from),
            user1_fcm: user1.map(|u| format!("fcm-{u}")),
            user2_fcm: user2.map(|u| format!("fcm-{u}")),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn partner_of_resolves_both_directions() {
        let c = couple(Some("111"), Some("222"));
        assert_eq!(c.partner_of("111"), Some("222"));
        assert_eq!(c.partner_of("222"), Some("111"));
        assert_eq!(c.partner_of("333"), None);
    }

    #[test]
    fn partner_fcm_returns_other_members_token() {
        let c = couple(Some("111"), Some("222"));
        assert_eq!(c.partner_fcm("111"), Some("fcm-222"));
        assert_eq!(c.partner_fcm("222"), Some("fcm-111"));
        assert_eq!(c.partner_fcm("333"), None);
    }

    #[test]
    fn partner_of_unpaired_couple_is_none() {
        let c = couple(Some("111"), None);
        assert_eq!(c.partner_of("111"), None);
        assert!(c.is_member("111"));
        assert!(!c.is_member("222"));
    }

    #[test]
    fn quest_action_type_round_trips() {
        for t in [
            QuestActionType::Pending,
            QuestActionType::Completed,
            QuestActionType::Approved,
            QuestActionType::Rejected,
        ] {
            assert_eq!(QuestActionType::from_str(t.as_str()), Ok(t));
        }
        assert!(QuestActionType::from_str("done").is_err());
    }

    #[test]
    fn visibility_type_ephemeral_flags() {
        assert!(!VisibilityType::Permanent.is_ephemeral());
        assert!(VisibilityType::Timed.is_ephemeral());
        assert!(VisibilityType::OneTime.is_ephemeral());
        assert_eq!(VisibilityType::from_str("one_time"), Ok(VisibilityType::OneTime));
    }
}

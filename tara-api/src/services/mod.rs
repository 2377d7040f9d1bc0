pub mod activity;
pub mod jobs;
pub mod media;
pub mod quests;
pub mod score;
pub mod streak;

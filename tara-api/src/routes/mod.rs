pub mod gallery;
pub mod health;
pub mod login;
pub mod love;
pub mod map;
pub mod messages;
pub mod profile;
pub mod register;

pub mod analytics;
pub mod auth;
pub mod exchange;
pub mod favorite;
pub mod file_upload;
pub mod health;
pub mod message;
pub mod notification;
pub mod profile;
pub mod recommend;
pub mod report;
pub mod review;
pub mod search;
pub mod session;
pub mod settings;
pub mod skill;
pub mod wallet;

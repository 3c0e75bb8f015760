pub mod auth;
pub mod export;
pub mod extraction;
pub mod jobs;

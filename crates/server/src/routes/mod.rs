pub mod auth;
pub mod dashboard;
pub mod health;
pub mod projects;
pub mod samples;
pub mod users;

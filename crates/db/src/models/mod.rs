#![allow(clippy::useless_conversion)]

pub mod audit;
pub mod dashboard;
pub mod ids;
pub mod line_item;
pub mod line_item_message;
pub mod project;
pub mod task;
pub mod user;

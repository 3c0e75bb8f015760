pub mod line_item;
pub mod line_item_audit_log;
pub mod line_item_message;
pub mod line_item_message_audit_log;
pub mod project;
pub mod task;
pub mod user;

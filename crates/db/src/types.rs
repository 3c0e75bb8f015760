use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LineItemStatus {
    #[default]
    #[sea_orm(string_value = "UNLABELED")]
    Unlabeled,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    #[sea_orm(string_value = "STATUS_CHANGE")]
    StatusChange,
    #[sea_orm(string_value = "UPDATE")]
    Update,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn line_item_status_round_trips_through_strings() {
        assert_eq!(LineItemStatus::Unlabeled.to_string(), "UNLABELED");
        assert_eq!(
            LineItemStatus::from_str("CONFIRMED").unwrap(),
            LineItemStatus::Confirmed
        );
        assert_eq!(LineItemStatus::default(), LineItemStatus::Unlabeled);
    }

    #[test]
    fn audit_action_uses_screaming_snake_case() {
        assert_eq!(AuditAction::StatusChange.to_string(), "STATUS_CHANGE");
        assert_eq!(AuditAction::Update.to_string(), "UPDATE");
    }
}

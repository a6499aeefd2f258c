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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    #[sea_orm(string_value = "low")]
    Low,
    #[default]
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    /// Parses user input such as `" High "`. Only the three enumerated values
    /// are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().to_ascii_lowercase().parse().ok()
    }
}

/// `status` filter of the list view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Done,
}

/// Sort keys accepted by the list view. A leading `-` means descending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display, Serialize)]
#[strum(ascii_case_insensitive)]
pub enum TodoSort {
    #[strum(serialize = "created")]
    #[serde(rename = "created")]
    CreatedAsc,
    #[default]
    #[strum(serialize = "-created")]
    #[serde(rename = "-created")]
    CreatedDesc,
    #[strum(serialize = "due")]
    #[serde(rename = "due")]
    DueAsc,
    #[strum(serialize = "-due")]
    #[serde(rename = "-due")]
    DueDesc,
}

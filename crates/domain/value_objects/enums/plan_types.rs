use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    #[default]
    Free,
    Pro,
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plan = match self {
            PlanType::Free => "free",
            PlanType::Pro => "pro",
        };
        write!(f, "{}", plan)
    }
}

impl PlanType {
    /// Unknown values read back from the table fall back to `Free`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "pro" => PlanType::Pro,
            _ => PlanType::Free,
        }
    }
}

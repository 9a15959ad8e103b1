use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_PRIORITY_WEIGHT;
use crate::errors::{Error, Result};
use crate::money::{format_amount, parse_amount, quantize};
use crate::schema::goals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionLevel {
    #[default]
    Flexible,
    Protected,
}

impl ProtectionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionLevel::Flexible => "flexible",
            ProtectionLevel::Protected => "protected",
        }
    }
}

impl FromStr for ProtectionLevel {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "flexible" => Ok(ProtectionLevel::Flexible),
            "protected" => Ok(ProtectionLevel::Protected),
            other => Err(Error::invalid_input(format!("Unknown protection level '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Active,
    Completed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
        }
    }
}

impl FromStr for GoalStatus {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "active" => Ok(GoalStatus::Active),
            "completed" => Ok(GoalStatus::Completed),
            other => Err(Error::invalid_input(format!("Unknown goal status '{}'", other))),
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A savings goal. `current_amount` is committed progress and only moves
/// when a month is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub priority_weight: i32,
    pub protection_level: ProtectionLevel,
    pub protection_reason: Option<String>,
    pub is_locked: bool,
    pub is_essential: bool,
    pub is_active: bool,
    pub status: GoalStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Goal {
    pub fn is_completed(&self) -> bool {
        self.status == GoalStatus::Completed
    }

    /// Eligible to receive new allocations
    pub fn accepts_allocation(&self) -> bool {
        self.is_active && !self.is_locked && !self.is_completed()
    }

    /// Remaining gap once `pending` (not yet finalized) allocations land.
    pub fn gap_after(&self, pending: Decimal) -> Decimal {
        quantize(self.target_amount - self.current_amount - pending)
    }
}

/// Input for creating a goal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub user_id: String,
    pub title: String,
    pub target_amount: Decimal,
    #[serde(default)]
    pub current_amount: Decimal,
    pub priority_weight: i32,
    #[serde(default)]
    pub protection_level: ProtectionLevel,
    pub protection_reason: Option<String>,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_essential: bool,
}

impl NewGoal {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::invalid_input("userId cannot be empty"));
        }
        validate_title(&self.title)?;
        validate_target(self.target_amount)?;
        if self.current_amount < Decimal::ZERO {
            return Err(Error::invalid_amount("currentAmount", "must not be negative"));
        }
        if self.current_amount > self.target_amount {
            return Err(Error::invalid_amount(
                "currentAmount",
                "must not exceed the target amount",
            ));
        }
        validate_priority(self.priority_weight)
    }

    pub fn into_goal(self, id: String, now: NaiveDateTime) -> Goal {
        let current_amount = quantize(self.current_amount);
        let target_amount = quantize(self.target_amount);
        let status = if current_amount >= target_amount {
            GoalStatus::Completed
        } else {
            GoalStatus::Active
        };
        Goal {
            id,
            user_id: self.user_id.trim().to_string(),
            title: self.title.trim().to_string(),
            target_amount,
            current_amount,
            priority_weight: self.priority_weight,
            protection_level: self.protection_level,
            protection_reason: self.protection_reason,
            is_locked: self.is_locked,
            is_essential: self.is_essential,
            is_active: true,
            status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The fields a caller may change on a goal. Progress and status are owned
/// by finalization and are not part of the allow-list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub target_amount: Option<Decimal>,
    pub priority_weight: Option<i32>,
    pub protection_level: Option<ProtectionLevel>,
    pub protection_reason: Option<String>,
    pub is_locked: Option<bool>,
    pub is_essential: Option<bool>,
    pub is_active: Option<bool>,
}

impl GoalUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.target_amount.is_none()
            && self.priority_weight.is_none()
            && self.protection_level.is_none()
            && self.protection_reason.is_none()
            && self.is_locked.is_none()
            && self.is_essential.is_none()
            && self.is_active.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(target) = self.target_amount {
            validate_target(target)?;
        }
        if let Some(weight) = self.priority_weight {
            validate_priority(weight)?;
        }
        Ok(())
    }

    pub fn apply_to(&self, goal: &mut Goal, now: NaiveDateTime) {
        if let Some(title) = &self.title {
            goal.title = title.trim().to_string();
        }
        if let Some(target) = self.target_amount {
            goal.target_amount = quantize(target);
        }
        if let Some(weight) = self.priority_weight {
            goal.priority_weight = weight;
        }
        if let Some(level) = self.protection_level {
            goal.protection_level = level;
        }
        if let Some(reason) = &self.protection_reason {
            goal.protection_reason = Some(reason.trim().to_string()).filter(|r| !r.is_empty());
        }
        if let Some(locked) = self.is_locked {
            goal.is_locked = locked;
        }
        if let Some(essential) = self.is_essential {
            goal.is_essential = essential;
        }
        if let Some(active) = self.is_active {
            goal.is_active = active;
        }
        goal.updated_at = now;
    }
}

fn validate_title(title: &str) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::invalid_input("Goal title cannot be empty"));
    }
    if title.chars().count() > 255 {
        return Err(Error::invalid_input("Goal title cannot exceed 255 characters"));
    }
    Ok(())
}

fn validate_target(target: Decimal) -> Result<()> {
    if target <= Decimal::ZERO {
        return Err(Error::invalid_amount("targetAmount", "must be positive"));
    }
    Ok(())
}

fn validate_priority(weight: i32) -> Result<()> {
    if !(0..=MAX_PRIORITY_WEIGHT).contains(&weight) {
        return Err(Error::invalid_input(format!(
            "priorityWeight must be between 0 and {}, got {}",
            MAX_PRIORITY_WEIGHT, weight
        )));
    }
    Ok(())
}

/// Database row for `goals`
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = goals)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GoalDB {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub target_amount: String,
    pub current_amount: String,
    pub priority_weight: i32,
    pub protection_level: String,
    pub protection_reason: Option<String>,
    pub is_locked: bool,
    pub is_essential: bool,
    pub is_active: bool,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<GoalDB> for Goal {
    type Error = Error;

    fn try_from(row: GoalDB) -> Result<Self> {
        Ok(Goal {
            target_amount: parse_amount(&row.target_amount)?,
            current_amount: parse_amount(&row.current_amount)?,
            protection_level: row.protection_level.parse()?,
            status: row.status.parse()?,
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            priority_weight: row.priority_weight,
            protection_reason: row.protection_reason,
            is_locked: row.is_locked,
            is_essential: row.is_essential,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Goal> for GoalDB {
    fn from(goal: &Goal) -> Self {
        GoalDB {
            id: goal.id.clone(),
            user_id: goal.user_id.clone(),
            title: goal.title.clone(),
            target_amount: format_amount(goal.target_amount),
            current_amount: format_amount(goal.current_amount),
            priority_weight: goal.priority_weight,
            protection_level: goal.protection_level.as_str().to_string(),
            protection_reason: goal.protection_reason.clone(),
            is_locked: goal.is_locked,
            is_essential: goal.is_essential,
            is_active: goal.is_active,
            status: goal.status.as_str().to_string(),
            created_at: goal.created_at,
            updated_at: goal.updated_at,
        }
    }
}

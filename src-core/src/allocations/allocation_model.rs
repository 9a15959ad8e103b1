use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::money::{format_amount, parse_amount};
use crate::schema::goal_allocations;

/// Lifecycle of a monthly allocation row:
/// `Proposed` (distributor) -> `Revised` (pullback, any number of times) -> `Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStage {
    Proposed,
    Revised,
    Finalized,
}

impl AllocationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStage::Proposed => "proposed",
            AllocationStage::Revised => "revised",
            AllocationStage::Finalized => "finalized",
        }
    }
}

impl FromStr for AllocationStage {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "proposed" => Ok(AllocationStage::Proposed),
            "revised" => Ok(AllocationStage::Revised),
            "finalized" => Ok(AllocationStage::Finalized),
            other => Err(Error::invalid_input(format!("Unknown allocation stage '{}'", other))),
        }
    }
}

/// One row per (user, goal, month)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAllocation {
    pub id: String,
    pub user_id: String,
    pub goal_id: String,
    pub month: String,
    pub allocated_amount: Decimal,
    pub stage: AllocationStage,
    pub is_finalized: bool,
    pub finalized_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Allocations of one month keyed by goal id
pub type AllocationsByGoal = BTreeMap<String, Vec<GoalAllocation>>;

pub fn group_by_goal(allocations: Vec<GoalAllocation>) -> AllocationsByGoal {
    let mut grouped = AllocationsByGoal::new();
    for allocation in allocations {
        grouped
            .entry(allocation.goal_id.clone())
            .or_default()
            .push(allocation);
    }
    grouped
}

/// Database row for `goal_allocations`
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = goal_allocations)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GoalAllocationDB {
    pub id: String,
    pub user_id: String,
    pub goal_id: String,
    pub month: String,
    pub allocated_amount: String,
    pub stage: String,
    pub is_finalized: bool,
    pub finalized_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<GoalAllocationDB> for GoalAllocation {
    type Error = Error;

    fn try_from(row: GoalAllocationDB) -> Result<Self> {
        Ok(GoalAllocation {
            allocated_amount: parse_amount(&row.allocated_amount)?,
            stage: row.stage.parse()?,
            id: row.id,
            user_id: row.user_id,
            goal_id: row.goal_id,
            month: row.month,
            is_finalized: row.is_finalized,
            finalized_at: row.finalized_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&GoalAllocation> for GoalAllocationDB {
    fn from(allocation: &GoalAllocation) -> Self {
        GoalAllocationDB {
            id: allocation.id.clone(),
            user_id: allocation.user_id.clone(),
            goal_id: allocation.goal_id.clone(),
            month: allocation.month.clone(),
            allocated_amount: format_amount(allocation.allocated_amount),
            stage: allocation.stage.as_str().to_string(),
            is_finalized: allocation.is_finalized,
            finalized_at: allocation.finalized_at,
            created_at: allocation.created_at,
            updated_at: allocation.updated_at,
        }
    }
}

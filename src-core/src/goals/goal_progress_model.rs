use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::allocations::{AllocationStage, GoalAllocation};
use crate::goals::goals_model::{Goal, GoalStatus};
use crate::money::{percent_of, quantize};

/// Progress of a goal combining committed and pending allocations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgressSnapshot {
    pub goal_id: String,
    pub goal_title: String,
    pub status: GoalStatus,
    pub target_amount: Decimal,
    /// Finalized progress
    pub committed_amount: Decimal,
    /// Sum of allocations not yet finalized
    pub pending_amount: Decimal,
    /// committed + pending
    pub projected_amount: Decimal,
    pub remaining_gap: Decimal,
    pub completion_percent: Decimal,
    pub allocation_details: Vec<AllocationDetail>,
}

/// One month of allocation towards a goal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationDetail {
    pub allocation_id: String,
    pub month: String,
    pub allocated_amount: Decimal,
    pub stage: AllocationStage,
    pub finalized_at: Option<NaiveDateTime>,
}

impl From<&GoalAllocation> for AllocationDetail {
    fn from(allocation: &GoalAllocation) -> Self {
        AllocationDetail {
            allocation_id: allocation.id.clone(),
            month: allocation.month.clone(),
            allocated_amount: allocation.allocated_amount,
            stage: allocation.stage,
            finalized_at: allocation.finalized_at,
        }
    }
}

impl GoalProgressSnapshot {
    pub fn build(goal: &Goal, allocations: &[GoalAllocation]) -> Self {
        let pending_amount = quantize(
            allocations
                .iter()
                .filter(|a| !a.is_finalized)
                .map(|a| a.allocated_amount)
                .sum(),
        );
        let projected_amount = quantize(goal.current_amount + pending_amount);
        let remaining_gap = goal.gap_after(pending_amount).max(Decimal::ZERO);
        let completion_percent = percent_of(projected_amount, goal.target_amount)
            .min(Decimal::ONE_HUNDRED);

        GoalProgressSnapshot {
            goal_id: goal.id.clone(),
            goal_title: goal.title.clone(),
            status: goal.status,
            target_amount: goal.target_amount,
            committed_amount: goal.current_amount,
            pending_amount,
            projected_amount,
            remaining_gap,
            completion_percent,
            allocation_details: allocations.iter().map(AllocationDetail::from).collect(),
        }
    }
}

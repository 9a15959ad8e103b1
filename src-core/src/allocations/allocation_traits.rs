use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::allocations::allocation_model::{AllocationsByGoal, GoalAllocation};
use crate::errors::Result;

/// Storage for monthly goal allocations
#[async_trait]
pub trait AllocationRepositoryTrait: Send + Sync {
    fn get_allocation(
        &self,
        user_id: &str,
        goal_id: &str,
        month: &str,
    ) -> Result<Option<GoalAllocation>>;

    /// Allocated amount of `goal_id` in `month`, zero when there is no row
    fn get_total_allocated_for_goal(&self, goal_id: &str, month: &str) -> Result<Decimal>;

    /// Sum of every non-finalized allocation of `goal_id`, across months
    fn get_pending_total_for_goal(&self, goal_id: &str) -> Result<Decimal>;

    fn get_allocations_by_month(&self, month: &str) -> Result<AllocationsByGoal>;

    fn get_allocations_by_user(&self, user_id: &str) -> Result<Vec<GoalAllocation>>;

    fn get_allocations_for_goal(&self, goal_id: &str) -> Result<Vec<GoalAllocation>>;

    /// When any allocation of the user's month was finalized
    fn get_month_finalization(&self, user_id: &str, month: &str) -> Result<Option<NaiveDateTime>>;

    /// Creates the row or overwrites its amount. Finalized rows are refused.
    async fn upsert_allocation(
        &self,
        user_id: &str,
        goal_id: &str,
        month: &str,
        amount: Decimal,
    ) -> Result<GoalAllocation>;
}

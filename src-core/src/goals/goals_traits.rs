use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::allocations::GoalAllocation;
use crate::errors::Result;
use crate::goals::goal_progress_model::GoalProgressSnapshot;
use crate::goals::goals_model::{Goal, GoalUpdate, NewGoal};

/// Storage for goals
#[async_trait]
pub trait GoalRepositoryTrait: Send + Sync {
    fn load_goals(&self, user_id: &str) -> Result<Vec<Goal>>;
    fn get_goal(&self, goal_id: &str) -> Result<Option<Goal>>;
    /// Every goal flagged active, completed ones included
    fn get_active_goals(&self, user_id: &str) -> Result<Vec<Goal>>;
    async fn insert_new_goal(&self, new_goal: NewGoal) -> Result<Goal>;
    async fn update_goal(&self, goal_id: &str, update: GoalUpdate) -> Result<Goal>;
    /// Adds `delta` to committed progress and completes the goal once the
    /// target is reached
    async fn update_goal_progress(&self, goal_id: &str, delta: Decimal) -> Result<Goal>;
    async fn delete_goal(&self, goal_id: String) -> Result<usize>;
}

#[async_trait]
pub trait GoalServiceTrait: Send + Sync {
    fn get_goals(&self, user_id: &str) -> Result<Vec<Goal>>;
    fn get_goal(&self, goal_id: &str) -> Result<Goal>;
    fn get_goal_progress(&self, goal_id: &str) -> Result<GoalProgressSnapshot>;
    fn load_goal_allocations(&self, goal_id: &str) -> Result<Vec<GoalAllocation>>;
    async fn create_goal(&self, new_goal: NewGoal) -> Result<Goal>;
    async fn update_goal(&self, goal_id: &str, update: GoalUpdate) -> Result<Goal>;
    async fn delete_goal(&self, goal_id: String) -> Result<usize>;
}

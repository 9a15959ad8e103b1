use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use crate::allocations::{AllocationRepositoryTrait, GoalAllocation};
use crate::errors::{Error, Result};
use crate::goals::goal_progress_model::GoalProgressSnapshot;
use crate::goals::goals_model::{Goal, GoalUpdate, NewGoal};
use crate::goals::goals_traits::{GoalRepositoryTrait, GoalServiceTrait};

pub struct GoalService<T: GoalRepositoryTrait> {
    goal_repo: Arc<T>,
    allocation_repo: Arc<dyn AllocationRepositoryTrait>,
}

impl<T: GoalRepositoryTrait> GoalService<T> {
    pub fn new(goal_repo: Arc<T>, allocation_repo: Arc<dyn AllocationRepositoryTrait>) -> Self {
        GoalService {
            goal_repo,
            allocation_repo,
        }
    }

    fn require_goal(&self, goal_id: &str) -> Result<Goal> {
        self.goal_repo
            .get_goal(goal_id)?
            .ok_or_else(|| Error::not_found("Goal", goal_id))
    }
}

#[async_trait]
impl<T: GoalRepositoryTrait + Send + Sync> GoalServiceTrait for GoalService<T> {
    fn get_goals(&self, user_id: &str) -> Result<Vec<Goal>> {
        self.goal_repo.load_goals(user_id)
    }

    fn get_goal(&self, goal_id: &str) -> Result<Goal> {
        self.require_goal(goal_id)
    }

    fn get_goal_progress(&self, goal_id: &str) -> Result<GoalProgressSnapshot> {
        let goal = self.require_goal(goal_id)?;
        let allocations = self.allocation_repo.get_allocations_for_goal(goal_id)?;
        Ok(GoalProgressSnapshot::build(&goal, &allocations))
    }

    fn load_goal_allocations(&self, goal_id: &str) -> Result<Vec<GoalAllocation>> {
        self.require_goal(goal_id)?;
        self.allocation_repo.get_allocations_for_goal(goal_id)
    }

    async fn create_goal(&self, new_goal: NewGoal) -> Result<Goal> {
        new_goal.validate()?;
        let goal = self.goal_repo.insert_new_goal(new_goal).await?;
        info!(
            "Created goal {} for user {} (target {}, weight {})",
            goal.id, goal.user_id, goal.target_amount, goal.priority_weight
        );
        Ok(goal)
    }

    async fn update_goal(&self, goal_id: &str, update: GoalUpdate) -> Result<Goal> {
        if update.is_empty() {
            return Err(Error::invalid_input("No updatable goal fields supplied"));
        }
        update.validate()?;
        let goal = self.goal_repo.update_goal(goal_id, update).await?;
        debug!("Updated goal {} (status {})", goal.id, goal.status);
        Ok(goal)
    }

    async fn delete_goal(&self, goal_id: String) -> Result<usize> {
        self.require_goal(&goal_id)?;
        let deleted = self.goal_repo.delete_goal(goal_id.clone()).await?;
        info!("Deleted goal {}", goal_id);
        Ok(deleted)
    }
}

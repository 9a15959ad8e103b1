use std::sync::Arc;

use log::{info, warn};
use rust_decimal::Decimal;

use crate::allocations::AllocationRepositoryTrait;
use crate::errors::{Error, Result, ValidationError};
use crate::goals::GoalRepositoryTrait;
use crate::money::quantize;
use crate::period::Period;
use crate::recalculation::locks::LockRegistry;
use crate::recalculation::recalculation_model::{
    FinalizationChangeset, FinalizationResult, FinalizedGoal, GoalProgressWrite,
    SkippedFinalization,
};
use crate::recalculation::unit_of_work::UnitOfWorkTrait;

/// Makes a month's allocations permanent and applies them to goal progress.
pub struct FinalizationService {
    goal_repo: Arc<dyn GoalRepositoryTrait>,
    allocation_repo: Arc<dyn AllocationRepositoryTrait>,
    unit_of_work: Arc<dyn UnitOfWorkTrait>,
    locks: Arc<LockRegistry>,
}

impl FinalizationService {
    pub fn new(
        goal_repo: Arc<dyn GoalRepositoryTrait>,
        allocation_repo: Arc<dyn AllocationRepositoryTrait>,
        unit_of_work: Arc<dyn UnitOfWorkTrait>,
        locks: Arc<LockRegistry>,
    ) -> Self {
        FinalizationService {
            goal_repo,
            allocation_repo,
            unit_of_work,
            locks,
        }
    }

    /// Finalizes `month` (`YYYY-MM`) for every user.
    pub async fn finalize_month(&self, month: &str) -> Result<FinalizationResult> {
        self.finalize(month, None).await
    }

    pub async fn finalize_user_month(
        &self,
        user_id: &str,
        month: &str,
    ) -> Result<FinalizationResult> {
        self.finalize(month, Some(user_id)).await
    }

    async fn finalize(&self, month: &str, user_id: Option<&str>) -> Result<FinalizationResult> {
        let month = month.parse::<Period>()?.month_key();
        let _guard = self.locks.lock_finalization(&month).await;

        let mut grouped = self.allocation_repo.get_allocations_by_month(&month)?;
        if let Some(user_id) = user_id {
            for rows in grouped.values_mut() {
                rows.retain(|a| a.user_id == user_id);
            }
            grouped.retain(|_, rows| !rows.is_empty());
        }
        if grouped.is_empty() {
            return Err(Error::NotFound(format!("Allocations for month {}", month)));
        }

        if grouped.values().flatten().all(|a| a.is_finalized) {
            let finalized_at = grouped
                .values()
                .flatten()
                .map(|a| a.finalized_at.unwrap_or(a.updated_at))
                .max()
                .unwrap_or_else(|| chrono::Utc::now().naive_utc());
            return Err(ValidationError::MonthAlreadyFinalized {
                month,
                finalized_at,
            }
            .into());
        }

        let mut progress = Vec::new();
        let mut allocation_ids = Vec::new();
        let mut skipped = Vec::new();
        for (goal_id, rows) in &grouped {
            let pending: Vec<_> = rows.iter().filter(|a| !a.is_finalized).collect();
            if pending.is_empty() {
                continue;
            }
            let amount = quantize(pending.iter().map(|a| a.allocated_amount).sum());
            allocation_ids.extend(pending.iter().map(|a| a.id.clone()));

            match self.goal_repo.get_goal(goal_id)? {
                Some(_) => {
                    progress.push(GoalProgressWrite {
                        goal_id: goal_id.clone(),
                        delta: amount,
                    });
                }
                None => {
                    warn!("Goal {} no longer exists; freezing {} without progress", goal_id, amount);
                    skipped.push(SkippedFinalization {
                        goal_id: goal_id.clone(),
                        amount,
                        reason: "Goal no longer exists".to_string(),
                    });
                }
            }
        }

        let applied: Vec<Decimal> = progress.iter().map(|p| p.delta).collect();
        let commit = self
            .unit_of_work
            .commit_finalization(FinalizationChangeset {
                month: month.clone(),
                progress,
                allocation_ids,
            })
            .await?;

        let goals: Vec<FinalizedGoal> = commit
            .goals
            .iter()
            .zip(applied)
            .map(|(goal, amount_applied)| FinalizedGoal {
                goal_id: goal.id.clone(),
                goal_title: goal.title.clone(),
                amount_applied,
                current_amount: goal.current_amount,
                target_amount: goal.target_amount,
                completed: goal.is_completed(),
            })
            .collect();
        let total_finalized = quantize(goals.iter().map(|g| g.amount_applied).sum());
        let completed_goals = goals.iter().filter(|g| g.completed).count();

        info!(
            "Finalized {} for {}: {} allocation(s), {} applied, {} goal(s) completed",
            month,
            user_id.unwrap_or("all users"),
            commit.allocations_finalized,
            total_finalized,
            completed_goals
        );

        Ok(FinalizationResult {
            month,
            user_id: user_id.map(str::to_string),
            allocations_finalized: commit.allocations_finalized,
            total_finalized,
            goals,
            completed_goals,
            skipped,
            finalized_at: commit.finalized_at,
        })
    }
}

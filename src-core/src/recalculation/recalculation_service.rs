use std::sync::Arc;

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::allocations::{AllocationRepositoryTrait, AllocationStage};
use crate::constants::{DEFICIT_CATEGORY, DEFICIT_REPAYMENT_CATEGORY, SAVING_CATEGORY};
use crate::errors::{Error, Result, ValidationError};
use crate::goals::GoalRepositoryTrait;
use crate::ledger::{LedgerRepositoryTrait, NewLedgerEntry};
use crate::money::quantize;
use crate::period::Period;
use crate::profiles::{FinancialProfile, PeriodSnapshot, ProfileRepositoryTrait};
use crate::recalculation::deficit::resolve_deficit;
use crate::recalculation::delta::compute_delta;
use crate::recalculation::distributor::{distribute, DistributionCandidate};
use crate::recalculation::locks::LockRegistry;
use crate::recalculation::pullback::{plan_pullback, PullbackCandidate};
use crate::recalculation::recalculation_model::{
    AllocationWrite, RecalculationChangeset, RecalculationResult, RecalculationStatus,
};
use crate::recalculation::savings::sink_leftover;
use crate::recalculation::unit_of_work::UnitOfWorkTrait;

/// Attempts per recalculation when the store reports a retryable failure
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Turns new ledger activity into deficit, goal and savings movements.
pub struct RecalculationService {
    profile_repo: Arc<dyn ProfileRepositoryTrait>,
    goal_repo: Arc<dyn GoalRepositoryTrait>,
    allocation_repo: Arc<dyn AllocationRepositoryTrait>,
    ledger_repo: Arc<dyn LedgerRepositoryTrait>,
    unit_of_work: Arc<dyn UnitOfWorkTrait>,
    locks: Arc<LockRegistry>,
}

/// Working state of one recalculation before it is committed
struct Plan {
    profile: FinancialProfile,
    result: RecalculationResult,
    allocations: Vec<AllocationWrite>,
    entries: Vec<NewLedgerEntry>,
}

impl RecalculationService {
    pub fn new(
        profile_repo: Arc<dyn ProfileRepositoryTrait>,
        goal_repo: Arc<dyn GoalRepositoryTrait>,
        allocation_repo: Arc<dyn AllocationRepositoryTrait>,
        ledger_repo: Arc<dyn LedgerRepositoryTrait>,
        unit_of_work: Arc<dyn UnitOfWorkTrait>,
        locks: Arc<LockRegistry>,
    ) -> Self {
        RecalculationService {
            profile_repo,
            goal_repo,
            allocation_repo,
            ledger_repo,
            unit_of_work,
            locks,
        }
    }

    /// Recalculates the current calendar month.
    pub async fn recalculate(&self, user_id: &str) -> Result<RecalculationResult> {
        self.recalculate_for_period(user_id, Period::current()).await
    }

    pub async fn recalculate_for_period(
        &self,
        user_id: &str,
        period: Period,
    ) -> Result<RecalculationResult> {
        let month = period.month_key();
        let _guard = self.locks.lock_recalculation(user_id, &month).await;

        let mut attempt = 1;
        loop {
            match self.run_once(user_id, &period).await {
                Err(err) if err.is_retryable() && attempt < MAX_COMMIT_ATTEMPTS => {
                    warn!(
                        "Recalculation for user {} month {} failed (attempt {}): {}; retrying",
                        user_id, month, attempt, err
                    );
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn run_once(&self, user_id: &str, period: &Period) -> Result<RecalculationResult> {
        let month = period.month_key();
        let profile = self
            .profile_repo
            .get_profile(user_id)?
            .ok_or_else(|| Error::not_found("Financial profile", user_id))?;

        if let Some(finalized_at) = self.allocation_repo.get_month_finalization(user_id, &month)? {
            return Err(ValidationError::MonthAlreadyFinalized {
                month,
                finalized_at,
            }
            .into());
        }

        let previous = self.profile_repo.get_period_snapshot(user_id, &month)?;
        let totals = self.ledger_repo.get_period_totals(user_id, period)?;
        let delta = compute_delta(&profile, previous.as_ref(), &totals, &month);
        debug!(
            "User {} month {}: income delta {}, expense delta {}, net change {}",
            user_id, month, delta.income_delta, delta.expense_delta, delta.net_change
        );
        if delta.is_no_activity() {
            info!("No new activity for user {} in {}", user_id, month);
            return Ok(RecalculationResult::new(&profile, delta));
        }

        let now = chrono::Utc::now().naive_utc();
        let guard = profile.snapshot_guard(previous.as_ref());
        let net_change = delta.net_change;
        let mut plan = Plan {
            result: RecalculationResult::new(&profile, delta),
            profile,
            allocations: Vec::new(),
            entries: Vec::new(),
        };

        if net_change > Decimal::ZERO {
            self.apply_positive(&mut plan, net_change, &month, now)?;
        } else {
            self.apply_shortfall(&mut plan, -net_change, &month, now)?;
        }

        let snapshot = PeriodSnapshot {
            user_id: user_id.to_string(),
            month: month.clone(),
            total_income: plan.result.delta.total_income,
            total_expense: plan.result.delta.total_expense,
            updated_at: now,
        };
        let profile = &mut plan.profile;
        profile.total_income_snapshot = plan.result.delta.total_income;
        profile.total_expense_snapshot = plan.result.delta.total_expense;
        profile.snapshot_month = Some(month.clone());
        profile.last_calculated_at = Some(now);
        profile.updated_at = now;

        let committed = self
            .unit_of_work
            .commit_recalculation(RecalculationChangeset {
                user_id: user_id.to_string(),
                guard,
                profile: plan.profile,
                snapshot,
                allocations: plan.allocations,
                entries: plan.entries,
            })
            .await?;

        let mut result = plan.result;
        result.savings_balance = committed.savings_balance;
        result.deficit_balance = committed.deficit_balance;
        result.calculated_at = committed.last_calculated_at;
        info!(
            "Recalculated user {} month {}: {} (net {}, allocated {}, saved {}, deficit {})",
            user_id,
            month,
            result.status.as_str(),
            result.delta.net_change,
            result.total_allocated,
            result.savings_added,
            result.deficit_balance
        );
        Ok(result)
    }

    /// Deficit first, then goals, then savings.
    fn apply_positive(
        &self,
        plan: &mut Plan,
        net_change: Decimal,
        month: &str,
        now: NaiveDateTime,
    ) -> Result<()> {
        let user_id = plan.profile.user_id.clone();
        let mut available = net_change;
        if plan.profile.include_savings_in_alloc && plan.profile.savings_balance > Decimal::ZERO {
            let pooled = plan.profile.savings_balance;
            available = quantize(available + pooled);
            plan.profile.savings_balance = quantize(Decimal::ZERO);
            plan.result.savings_pooled = pooled;
            debug!("Pooled {} of savings for user {}", pooled, user_id);
        }
        plan.result.available_funds = available;

        if plan.profile.deficit_balance > Decimal::ZERO {
            let outcome = resolve_deficit(plan.profile.deficit_balance, available);
            plan.profile.deficit_balance = outcome.remaining_deficit;
            plan.result.deficit_repaid = outcome.repaid;
            self.post(
                plan,
                DEFICIT_REPAYMENT_CATEGORY,
                outcome.repaid,
                format!("Deficit repayment for {}", month),
                now,
            )?;
            if outcome.is_partial() {
                info!(
                    "User {} repaid {} of deficit in {}, {} outstanding",
                    user_id, outcome.repaid, month, outcome.remaining_deficit
                );
                plan.result.status = RecalculationStatus::DeficitPartial;
                return Ok(());
            }
            available = outcome.remaining_funds;
            if available <= Decimal::ZERO {
                plan.result.status = RecalculationStatus::DeficitRepaid;
                return Ok(());
            }
        }

        let mut candidates = Vec::new();
        let mut month_totals = Vec::new();
        for goal in self.goal_repo.get_active_goals(&user_id)? {
            if !goal.accepts_allocation() {
                continue;
            }
            let pending_amount = self.allocation_repo.get_pending_total_for_goal(&goal.id)?;
            month_totals.push(
                self.allocation_repo
                    .get_total_allocated_for_goal(&goal.id, month)?,
            );
            candidates.push(DistributionCandidate {
                goal,
                pending_amount,
            });
        }

        let distribution = distribute(available, &candidates);
        for share in &distribution.shares {
            let existing = candidates
                .iter()
                .zip(&month_totals)
                .find(|(c, _)| c.goal.id == share.goal_id)
                .map(|(_, total)| *total)
                .unwrap_or(Decimal::ZERO);
            debug!(
                "Goal {} receives {} (proposed {}, gap {})",
                share.goal_id, share.allocated, share.proposed, share.gap
            );
            plan.allocations.push(AllocationWrite {
                goal_id: share.goal_id.clone(),
                month: month.to_string(),
                amount: quantize(existing + share.allocated),
                stage: AllocationStage::Proposed,
            });
        }
        plan.result.total_allocated = distribution.total_allocated;

        if let Some(deposit) = sink_leftover(
            available,
            distribution.total_allocated,
            candidates.len(),
            distribution.total_gap,
        ) {
            plan.profile.savings_balance = quantize(plan.profile.savings_balance + deposit.amount);
            plan.result.savings_added = deposit.amount;
            plan.result.savings_reason = Some(deposit.reason);
            self.post(
                plan,
                SAVING_CATEGORY,
                deposit.amount,
                format!("Savings deposit ({}): {}", deposit.reason.as_str(), deposit.reason.describe()),
                now,
            )?;
        }
        plan.result.allocations = distribution.shares;
        plan.result.status = if plan.result.total_allocated > Decimal::ZERO {
            RecalculationStatus::Allocated
        } else {
            RecalculationStatus::Saved
        };
        Ok(())
    }

    /// Savings first, then flexible goals, then deficit.
    fn apply_shortfall(
        &self,
        plan: &mut Plan,
        shortfall: Decimal,
        month: &str,
        now: NaiveDateTime,
    ) -> Result<()> {
        let user_id = plan.profile.user_id.clone();
        // Inactive goals are listed too so their allocations show up as skipped.
        let mut candidates = Vec::new();
        for goal in self.goal_repo.load_goals(&user_id)? {
            let month_allocation = self
                .allocation_repo
                .get_allocation(&user_id, &goal.id, month)?
                .filter(|a| !a.is_finalized)
                .map(|a| a.allocated_amount)
                .unwrap_or(Decimal::ZERO);
            if month_allocation <= Decimal::ZERO {
                continue;
            }
            let pending = self.allocation_repo.get_pending_total_for_goal(&goal.id)?;
            let projected_amount = quantize(goal.current_amount + pending);
            candidates.push(PullbackCandidate {
                goal,
                month_allocation,
                projected_amount,
            });
        }

        let pullback = plan_pullback(shortfall, plan.profile.savings_balance, &candidates);

        if pullback.from_savings > Decimal::ZERO {
            plan.profile.savings_balance =
                quantize(plan.profile.savings_balance - pullback.from_savings);
            self.post(
                plan,
                SAVING_CATEGORY,
                pullback.from_savings,
                format!("Savings withdrawal to cover shortfall in {}", month),
                now,
            )?;
        }
        for reduction in &pullback.goal_reductions {
            debug!(
                "Pulled {} back from goal {} (score {}), {} left this month",
                reduction.amount, reduction.goal_id, reduction.pull_score, reduction.resulting_allocation
            );
            plan.allocations.push(AllocationWrite {
                goal_id: reduction.goal_id.clone(),
                month: month.to_string(),
                amount: reduction.resulting_allocation,
                stage: AllocationStage::Revised,
            });
        }
        for skipped in &pullback.protected_skipped {
            debug!("Goal {} protected from pullback: {}", skipped.goal_id, skipped.reason);
        }
        if pullback.new_deficit > Decimal::ZERO {
            plan.profile.deficit_balance =
                quantize(plan.profile.deficit_balance + pullback.new_deficit);
            warn!(
                "User {} ran a deficit of {} in {}",
                user_id, pullback.new_deficit, month
            );
            self.post(
                plan,
                DEFICIT_CATEGORY,
                pullback.new_deficit,
                format!("Uncovered shortfall in {}", month),
                now,
            )?;
        }

        plan.result.status = RecalculationStatus::ExpenseProcessed;
        plan.result.pullback = Some(pullback);
        Ok(())
    }

    /// Queues an engine posting. A missing system category only costs the
    /// audit entry, never the recalculation.
    fn post(
        &self,
        plan: &mut Plan,
        category_name: &str,
        amount: Decimal,
        description: String,
        now: NaiveDateTime,
    ) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Ok(());
        }
        match self.ledger_repo.find_category_by_name(category_name)? {
            Some(category) => plan.entries.push(NewLedgerEntry::allocation_posting(
                &plan.profile.user_id,
                &category.id,
                amount,
                description,
                now,
            )),
            None => warn!(
                "Category '{}' not found; skipping posting of {} for user {}",
                category_name, amount, plan.profile.user_id
            ),
        }
        Ok(())
    }
}

//! In-memory implementation of every store trait, for tests and embedding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::allocations::{
    group_by_goal, AllocationRepositoryTrait, AllocationStage, AllocationsByGoal, GoalAllocation,
};
use crate::constants::{DEFICIT_CATEGORY, DEFICIT_REPAYMENT_CATEGORY, SAVING_CATEGORY};
use crate::errors::{DatabaseError, Error, Result, ValidationError};
use crate::goals::goals_repository::ensure_target_covers;
use crate::goals::{Goal, GoalRepositoryTrait, GoalStatus, GoalUpdate, NewGoal};
use crate::ledger::{
    Category, CategoryType, LedgerEntry, LedgerRepositoryTrait, NewCategory, NewLedgerEntry,
    PeriodTotals,
};
use crate::money::quantize;
use crate::period::Period;
use crate::profiles::{
    FinancialProfile, NewFinancialProfile, PeriodSnapshot, ProfileRepositoryTrait, ProfileUpdate,
};
use crate::recalculation::recalculation_model::{
    FinalizationChangeset, FinalizationCommit, RecalculationChangeset,
};
use crate::recalculation::unit_of_work::{snapshot_conflict, UnitOfWorkTrait};

#[derive(Debug, Clone, Default)]
struct State {
    profiles: HashMap<String, FinancialProfile>,
    snapshots: HashMap<(String, String), PeriodSnapshot>,
    goals: Vec<Goal>,
    allocations: Vec<GoalAllocation>,
    categories: Vec<Category>,
    entries: Vec<LedgerEntry>,
}

impl State {
    fn seeded() -> Self {
        let categories = [
            ("system-deficit", DEFICIT_CATEGORY),
            ("system-deficit-repayment", DEFICIT_REPAYMENT_CATEGORY),
            ("system-saving", SAVING_CATEGORY),
        ]
        .into_iter()
        .map(|(id, name)| Category {
            id: id.to_string(),
            name: name.to_string(),
            category_type: CategoryType::Expense,
            is_system: true,
        })
        .collect();
        State {
            categories,
            ..State::default()
        }
    }

    fn goal_mut(&mut self, goal_id: &str) -> Result<&mut Goal> {
        self.goals
            .iter_mut()
            .find(|g| g.id == goal_id)
            .ok_or_else(|| Error::not_found("Goal", goal_id))
    }

    fn category(&self, category_id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == category_id)
    }

    fn upsert_allocation(
        &mut self,
        user_id: &str,
        goal_id: &str,
        month: &str,
        amount: Decimal,
        stage: AllocationStage,
        now: NaiveDateTime,
    ) -> Result<GoalAllocation> {
        let existing = self
            .allocations
            .iter_mut()
            .find(|a| a.user_id == user_id && a.goal_id == goal_id && a.month == month);
        match existing {
            Some(row) if row.is_finalized => Err(ValidationError::MonthAlreadyFinalized {
                month: month.to_string(),
                finalized_at: row.finalized_at.unwrap_or(row.updated_at),
            }
            .into()),
            Some(row) => {
                row.allocated_amount = quantize(amount);
                if stage == AllocationStage::Revised {
                    row.stage = AllocationStage::Revised;
                }
                row.updated_at = now;
                Ok(row.clone())
            }
            None => {
                let row = GoalAllocation {
                    id: uuid::Uuid::new_v4().to_string(),
                    user_id: user_id.to_string(),
                    goal_id: goal_id.to_string(),
                    month: month.to_string(),
                    allocated_amount: quantize(amount),
                    stage,
                    is_finalized: false,
                    finalized_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.allocations.push(row.clone());
                Ok(row)
            }
        }
    }
}

/// A store kept entirely in memory. Commits are applied to a copy of the
/// state and swapped in, so a failed commit leaves nothing behind.
pub struct InMemoryStore {
    state: RwLock<State>,
    fail_next_commit: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// An empty store with the system ledger categories in place.
    pub fn new() -> Self {
        InMemoryStore {
            state: RwLock::new(State::seeded()),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    /// Makes the next unit-of-work commit fail with a retryable store error.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Every ledger entry of a user, engine postings included.
    pub fn entries_for_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| DatabaseError::Internal("in-memory store lock poisoned".to_string()).into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| DatabaseError::Internal("in-memory store lock poisoned".to_string()).into())
    }

    fn take_injected_failure(&self) -> Result<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(DatabaseError::Internal("simulated store failure".to_string()).into());
        }
        Ok(())
    }
}

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

#[async_trait]
impl ProfileRepositoryTrait for InMemoryStore {
    fn get_profile(&self, user_id: &str) -> Result<Option<FinancialProfile>> {
        Ok(self.read()?.profiles.get(user_id).cloned())
    }

    fn get_period_snapshot(&self, user_id: &str, month: &str) -> Result<Option<PeriodSnapshot>> {
        Ok(self
            .read()?
            .snapshots
            .get(&(user_id.to_string(), month.to_string()))
            .cloned())
    }

    async fn create_profile(&self, new_profile: NewFinancialProfile) -> Result<FinancialProfile> {
        let mut state = self.write()?;
        let user_id = new_profile.user_id.trim().to_string();
        if state.profiles.contains_key(&user_id) {
            return Err(Error::invalid_input(format!(
                "Financial profile for user '{}' already exists",
                user_id
            )));
        }
        let profile = new_profile.into_profile(uuid::Uuid::new_v4().to_string(), now());
        state.profiles.insert(user_id, profile.clone());
        Ok(profile)
    }

    async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<FinancialProfile> {
        let mut state = self.write()?;
        let profile = state
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| Error::not_found("Financial profile", user_id))?;
        update.apply_to(profile, now());
        Ok(profile.clone())
    }

    async fn save_profile(&self, profile: FinancialProfile) -> Result<FinancialProfile> {
        let mut state = self.write()?;
        match state.profiles.get_mut(&profile.user_id) {
            Some(stored) => {
                *stored = profile.clone();
                Ok(profile)
            }
            None => Err(Error::not_found("Financial profile", &profile.user_id)),
        }
    }
}

#[async_trait]
impl GoalRepositoryTrait for InMemoryStore {
    fn load_goals(&self, user_id: &str) -> Result<Vec<Goal>> {
        Ok(self
            .read()?
            .goals
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }

    fn get_goal(&self, goal_id: &str) -> Result<Option<Goal>> {
        Ok(self.read()?.goals.iter().find(|g| g.id == goal_id).cloned())
    }

    fn get_active_goals(&self, user_id: &str) -> Result<Vec<Goal>> {
        Ok(self
            .read()?
            .goals
            .iter()
            .filter(|g| g.user_id == user_id && g.is_active)
            .cloned()
            .collect())
    }

    async fn insert_new_goal(&self, new_goal: NewGoal) -> Result<Goal> {
        let goal = new_goal.into_goal(uuid::Uuid::new_v4().to_string(), now());
        self.write()?.goals.push(goal.clone());
        Ok(goal)
    }

    async fn update_goal(&self, goal_id: &str, update: GoalUpdate) -> Result<Goal> {
        let mut state = self.write()?;
        let pending: Decimal = state
            .allocations
            .iter()
            .filter(|a| a.goal_id == goal_id && !a.is_finalized)
            .map(|a| a.allocated_amount)
            .sum();
        let goal = state.goal_mut(goal_id)?;
        if let Some(target) = update.target_amount {
            ensure_target_covers(goal, target, pending)?;
        }
        update.apply_to(goal, now());
        goal.status = if goal.current_amount >= goal.target_amount {
            GoalStatus::Completed
        } else {
            GoalStatus::Active
        };
        Ok(goal.clone())
    }

    async fn update_goal_progress(&self, goal_id: &str, delta: Decimal) -> Result<Goal> {
        let mut state = self.write()?;
        let goal = state.goal_mut(goal_id)?;
        apply_progress(goal, delta, now());
        Ok(goal.clone())
    }

    async fn delete_goal(&self, goal_id: String) -> Result<usize> {
        let mut state = self.write()?;
        if state.allocations.iter().any(|a| a.goal_id == goal_id) {
            return Err(Error::invalid_input(format!(
                "Goal '{}' has allocations; deactivate it instead of deleting",
                goal_id
            )));
        }
        let before = state.goals.len();
        state.goals.retain(|g| g.id != goal_id);
        Ok(before - state.goals.len())
    }
}

fn apply_progress(goal: &mut Goal, delta: Decimal, now: NaiveDateTime) {
    goal.current_amount = quantize(goal.current_amount + delta);
    if goal.current_amount >= goal.target_amount {
        goal.status = GoalStatus::Completed;
    }
    goal.updated_at = now;
}

#[async_trait]
impl AllocationRepositoryTrait for InMemoryStore {
    fn get_allocation(
        &self,
        user_id: &str,
        goal_id: &str,
        month: &str,
    ) -> Result<Option<GoalAllocation>> {
        Ok(self
            .read()?
            .allocations
            .iter()
            .find(|a| a.user_id == user_id && a.goal_id == goal_id && a.month == month)
            .cloned())
    }

    fn get_total_allocated_for_goal(&self, goal_id: &str, month: &str) -> Result<Decimal> {
        Ok(quantize(
            self.read()?
                .allocations
                .iter()
                .filter(|a| a.goal_id == goal_id && a.month == month)
                .map(|a| a.allocated_amount)
                .sum(),
        ))
    }

    fn get_pending_total_for_goal(&self, goal_id: &str) -> Result<Decimal> {
        Ok(quantize(
            self.read()?
                .allocations
                .iter()
                .filter(|a| a.goal_id == goal_id && !a.is_finalized)
                .map(|a| a.allocated_amount)
                .sum(),
        ))
    }

    fn get_allocations_by_month(&self, month: &str) -> Result<AllocationsByGoal> {
        let rows = self
            .read()?
            .allocations
            .iter()
            .filter(|a| a.month == month)
            .cloned()
            .collect();
        Ok(group_by_goal(rows))
    }

    fn get_allocations_by_user(&self, user_id: &str) -> Result<Vec<GoalAllocation>> {
        let mut rows: Vec<GoalAllocation> = self
            .read()?
            .allocations
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.month.cmp(&a.month).then_with(|| a.goal_id.cmp(&b.goal_id)));
        Ok(rows)
    }

    fn get_allocations_for_goal(&self, goal_id: &str) -> Result<Vec<GoalAllocation>> {
        let mut rows: Vec<GoalAllocation> = self
            .read()?
            .allocations
            .iter()
            .filter(|a| a.goal_id == goal_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.month.cmp(&b.month));
        Ok(rows)
    }

    fn get_month_finalization(&self, user_id: &str, month: &str) -> Result<Option<NaiveDateTime>> {
        Ok(self
            .read()?
            .allocations
            .iter()
            .filter(|a| a.user_id == user_id && a.month == month && a.is_finalized)
            .find_map(|a| a.finalized_at))
    }

    async fn upsert_allocation(
        &self,
        user_id: &str,
        goal_id: &str,
        month: &str,
        amount: Decimal,
    ) -> Result<GoalAllocation> {
        self.write()?
            .upsert_allocation(user_id, goal_id, month, amount, AllocationStage::Proposed, now())
    }
}

#[async_trait]
impl LedgerRepositoryTrait for InMemoryStore {
    fn get_period_totals(&self, user_id: &str, period: &Period) -> Result<PeriodTotals> {
        let state = self.read()?;
        let entries: Vec<(&LedgerEntry, CategoryType)> = state
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && period.contains(e.recorded_at))
            .filter_map(|e| state.category(&e.category_id).map(|c| (e, c.category_type)))
            .collect();
        Ok(PeriodTotals::from_entries(entries))
    }

    fn get_entries_for_period(&self, user_id: &str, period: &Period) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .read()?
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && period.contains(e.recorded_at))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.recorded_at);
        Ok(entries)
    }

    fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        Ok(self.read()?.categories.iter().find(|c| c.name == name).cloned())
    }

    fn get_category(&self, category_id: &str) -> Result<Option<Category>> {
        Ok(self.read()?.category(category_id).cloned())
    }

    async fn create_entry(&self, new_entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let mut state = self.write()?;
        if state.category(&new_entry.category_id).is_none() {
            return Err(Error::not_found("Category", &new_entry.category_id));
        }
        let entry = new_entry.into_entry(uuid::Uuid::new_v4().to_string(), now());
        state.entries.push(entry.clone());
        Ok(entry)
    }

    fn get_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>> {
        Ok(self.read()?.entries.iter().find(|e| e.id == entry_id).cloned())
    }

    async fn update_entry(&self, entry: LedgerEntry) -> Result<LedgerEntry> {
        let mut state = self.write()?;
        if state.category(&entry.category_id).is_none() {
            return Err(Error::not_found("Category", &entry.category_id));
        }
        let stored = state
            .entries
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| Error::not_found("Ledger entry", &entry.id))?;
        *stored = entry.clone();
        Ok(entry)
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<usize> {
        let mut state = self.write()?;
        let before = state.entries.len();
        state.entries.retain(|e| e.id != entry_id);
        Ok(before - state.entries.len())
    }

    async fn create_category(&self, new_category: NewCategory) -> Result<Category> {
        let mut state = self.write()?;
        if state.categories.iter().any(|c| c.name == new_category.name.trim()) {
            return Err(Error::invalid_input(format!(
                "Category '{}' already exists",
                new_category.name.trim()
            )));
        }
        let category = new_category.into_category(uuid::Uuid::new_v4().to_string());
        state.categories.push(category.clone());
        Ok(category)
    }
}

#[async_trait]
impl UnitOfWorkTrait for InMemoryStore {
    async fn commit_recalculation(
        &self,
        changeset: RecalculationChangeset,
    ) -> Result<FinancialProfile> {
        self.take_injected_failure()?;
        let mut state = self.write()?;
        let stored = state
            .profiles
            .get(&changeset.user_id)
            .ok_or_else(|| Error::not_found("Financial profile", &changeset.user_id))?;
        let key = (changeset.user_id.clone(), changeset.snapshot.month.clone());
        if !changeset.guard.matches(stored, state.snapshots.get(&key)) {
            return Err(snapshot_conflict(&changeset.user_id));
        }

        let now = now();
        let mut next = (*state).clone();
        for write in &changeset.allocations {
            next.upsert_allocation(
                &changeset.user_id,
                &write.goal_id,
                &write.month,
                write.amount,
                write.stage,
                now,
            )?;
        }
        for new_entry in changeset.entries {
            next.entries
                .push(new_entry.into_entry(uuid::Uuid::new_v4().to_string(), now));
        }
        next.snapshots.insert(key, changeset.snapshot);
        next.profiles
            .insert(changeset.user_id.clone(), changeset.profile.clone());
        *state = next;
        Ok(changeset.profile)
    }

    async fn commit_finalization(
        &self,
        changeset: FinalizationChangeset,
    ) -> Result<FinalizationCommit> {
        self.take_injected_failure()?;
        let mut state = self.write()?;
        let now = now();
        let mut next = (*state).clone();

        let mut goals = Vec::with_capacity(changeset.progress.len());
        for write in &changeset.progress {
            let goal = next.goal_mut(&write.goal_id)?;
            apply_progress(goal, write.delta, now);
            goals.push(goal.clone());
        }
        let mut allocations_finalized = 0;
        for row in next
            .allocations
            .iter_mut()
            .filter(|a| !a.is_finalized && changeset.allocation_ids.contains(&a.id))
        {
            row.is_finalized = true;
            row.finalized_at = Some(now);
            row.stage = AllocationStage::Finalized;
            row.updated_at = now;
            allocations_finalized += 1;
        }
        if allocations_finalized != changeset.allocation_ids.len() {
            return Err(DatabaseError::Conflict(format!(
                "Allocations of {} were finalized concurrently",
                changeset.month
            ))
            .into());
        }
        *state = next;
        Ok(FinalizationCommit {
            goals,
            allocations_finalized,
            finalized_at: now,
        })
    }
}

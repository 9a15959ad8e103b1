//! Shared fixtures: services wired over the in-memory store.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDateTime;
use fundflow_core::allocations::AllocationRepositoryTrait;
use fundflow_core::goals::{Goal, GoalService, GoalServiceTrait, NewGoal, ProtectionLevel};
use fundflow_core::ledger::{
    CategoryType, LedgerEntry, LedgerService, LedgerServiceTrait, NewCategory, NewLedgerEntry,
};
use fundflow_core::memory::InMemoryStore;
use fundflow_core::profiles::{
    FinancialProfile, NewFinancialProfile, ProfileRepositoryTrait, ProfileService,
    ProfileServiceTrait,
};
use fundflow_core::recalculation::{FinalizationService, LockRegistry, RecalculationService};
use fundflow_core::Period;
use rust_decimal::Decimal;

pub const USER: &str = "user-1";

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub profiles: ProfileService<InMemoryStore>,
    pub goals: GoalService<InMemoryStore>,
    pub ledger: LedgerService<InMemoryStore>,
    pub recalculation: Arc<RecalculationService>,
    pub finalization: FinalizationService,
    pub income_category: String,
    pub expense_category: String,
}

pub fn march() -> Period {
    Period::new(2025, 3).unwrap()
}

pub fn april() -> Period {
    Period::new(2025, 4).unwrap()
}

/// The 10th of the period at noon
pub fn mid(period: Period) -> NaiveDateTime {
    period.start() + chrono::Duration::days(9) + chrono::Duration::hours(12)
}

pub async fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let locks = Arc::new(LockRegistry::new());
    let recalculation = Arc::new(RecalculationService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        locks.clone(),
    ));
    let finalization = FinalizationService::new(store.clone(), store.clone(), store.clone(), locks);
    let ledger = LedgerService::new(store.clone(), store.clone());
    let income_category = ledger
        .create_category(NewCategory {
            name: "Salary".into(),
            category_type: CategoryType::Income,
        })
        .await
        .unwrap()
        .id;
    let expense_category = ledger
        .create_category(NewCategory {
            name: "Groceries".into(),
            category_type: CategoryType::Expense,
        })
        .await
        .unwrap()
        .id;

    Harness {
        profiles: ProfileService::new(store.clone()),
        goals: GoalService::new(store.clone(), store.clone()),
        ledger,
        recalculation,
        finalization,
        income_category,
        expense_category,
        store,
    }
}

impl Harness {
    pub async fn profile(&self) -> FinancialProfile {
        self.profiles
            .create_profile(NewFinancialProfile {
                user_id: USER.into(),
                expected_monthly_income: Decimal::ZERO,
                expected_monthly_expenses: Decimal::ZERO,
                base_allocation_rate: None,
                include_savings_in_alloc: None,
            })
            .await
            .unwrap()
    }

    /// Overwrites balances directly, as if earlier months had produced them.
    pub async fn set_balances(&self, savings: Decimal, deficit: Decimal) -> FinancialProfile {
        let mut profile = self.profiles.get_profile(USER).unwrap();
        profile.savings_balance = savings;
        profile.deficit_balance = deficit;
        self.store.save_profile(profile).await.unwrap()
    }

    pub async fn goal(&self, title: &str, target: Decimal, weight: i32) -> Goal {
        self.goals
            .create_goal(NewGoal {
                user_id: USER.into(),
                title: title.into(),
                target_amount: target,
                current_amount: Decimal::ZERO,
                priority_weight: weight,
                protection_level: ProtectionLevel::Flexible,
                protection_reason: None,
                is_locked: false,
                is_essential: false,
            })
            .await
            .unwrap()
    }

    pub async fn income(&self, amount: Decimal, period: Period) {
        self.record(self.income_category.clone(), amount, period).await;
    }

    pub async fn expense(&self, amount: Decimal, period: Period) {
        self.record(self.expense_category.clone(), amount, period).await;
    }

    pub async fn record(&self, category_id: String, amount: Decimal, period: Period) -> LedgerEntry {
        self.ledger
            .record_entry(NewLedgerEntry {
                user_id: USER.into(),
                category_id,
                amount,
                description: None,
                recorded_at: Some(mid(period)),
                is_expected: false,
                is_allocation_transaction: false,
            })
            .await
            .unwrap()
    }

    pub async fn allocate(&self, goal: &Goal, month: &str, amount: Decimal) {
        self.store
            .upsert_allocation(USER, &goal.id, month, amount)
            .await
            .unwrap();
    }

    pub fn month_allocation(&self, goal: &Goal, month: &str) -> Decimal {
        self.store
            .get_allocation(USER, &goal.id, month)
            .unwrap()
            .map(|a| a.allocated_amount)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn current_profile(&self) -> FinancialProfile {
        self.profiles.get_profile(USER).unwrap()
    }
}

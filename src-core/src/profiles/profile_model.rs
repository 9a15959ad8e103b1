use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::money::{format_amount, parse_amount, quantize};
use crate::schema::{financial_profiles, period_snapshots};

/// Per-user balances and the snapshot of the last processed period totals.
/// Balances and snapshots are written by the recalculation engine only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfile {
    pub id: String,
    pub user_id: String,
    pub expected_monthly_income: Decimal,
    pub expected_monthly_expenses: Decimal,
    pub savings_balance: Decimal,
    pub deficit_balance: Decimal,
    pub base_allocation_rate: Decimal,
    /// Pool the existing savings buffer into positive recalculations
    pub include_savings_in_alloc: bool,
    /// Totals of the most recently recalculated month
    pub total_income_snapshot: Decimal,
    pub total_expense_snapshot: Decimal,
    /// Month the profile snapshots were taken for
    pub snapshot_month: Option<String>,
    pub last_calculated_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FinancialProfile {
    /// Guard for a recalculation computed from this profile and the month's
    /// stored snapshot, if any.
    pub fn snapshot_guard(&self, previous: Option<&PeriodSnapshot>) -> SnapshotGuard {
        SnapshotGuard {
            month_totals: previous.map(|s| (s.total_income, s.total_expense)),
            savings_balance: self.savings_balance,
            deficit_balance: self.deficit_balance,
        }
    }
}

/// Totals of one (user, month) as last processed by a recalculation. Each
/// month is diffed against its own snapshot, so months can be recalculated
/// in any order without reprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSnapshot {
    pub user_id: String,
    pub month: String,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub updated_at: NaiveDateTime,
}

/// The state a recalculation was computed against. A commit is refused if
/// the stored balances or the month's snapshot no longer match it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotGuard {
    pub month_totals: Option<(Decimal, Decimal)>,
    pub savings_balance: Decimal,
    pub deficit_balance: Decimal,
}

impl SnapshotGuard {
    pub fn matches(&self, profile: &FinancialProfile, stored: Option<&PeriodSnapshot>) -> bool {
        self.savings_balance == profile.savings_balance
            && self.deficit_balance == profile.deficit_balance
            && self.month_totals == stored.map(|s| (s.total_income, s.total_expense))
    }
}

/// Input for creating a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFinancialProfile {
    pub user_id: String,
    #[serde(default)]
    pub expected_monthly_income: Decimal,
    #[serde(default)]
    pub expected_monthly_expenses: Decimal,
    pub base_allocation_rate: Option<Decimal>,
    pub include_savings_in_alloc: Option<bool>,
}

impl NewFinancialProfile {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::invalid_input("userId cannot be empty"));
        }
        ensure_non_negative("expectedMonthlyIncome", self.expected_monthly_income)?;
        ensure_non_negative("expectedMonthlyExpenses", self.expected_monthly_expenses)?;
        if let Some(rate) = self.base_allocation_rate {
            ensure_rate(rate)?;
        }
        Ok(())
    }

    pub fn into_profile(self, id: String, now: NaiveDateTime) -> FinancialProfile {
        FinancialProfile {
            id,
            user_id: self.user_id.trim().to_string(),
            expected_monthly_income: quantize(self.expected_monthly_income),
            expected_monthly_expenses: quantize(self.expected_monthly_expenses),
            savings_balance: quantize(Decimal::ZERO),
            deficit_balance: quantize(Decimal::ZERO),
            base_allocation_rate: self.base_allocation_rate.unwrap_or(Decimal::ZERO),
            include_savings_in_alloc: self.include_savings_in_alloc.unwrap_or(false),
            total_income_snapshot: quantize(Decimal::ZERO),
            total_expense_snapshot: quantize(Decimal::ZERO),
            snapshot_month: None,
            last_calculated_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// User-editable profile fields. Balances and snapshots are deliberately
/// absent; unknown keys are rejected at deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    pub expected_monthly_income: Option<Decimal>,
    pub expected_monthly_expenses: Option<Decimal>,
    pub base_allocation_rate: Option<Decimal>,
    pub include_savings_in_alloc: Option<bool>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.expected_monthly_income.is_none()
            && self.expected_monthly_expenses.is_none()
            && self.base_allocation_rate.is_none()
            && self.include_savings_in_alloc.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(income) = self.expected_monthly_income {
            ensure_non_negative("expectedMonthlyIncome", income)?;
        }
        if let Some(expenses) = self.expected_monthly_expenses {
            ensure_non_negative("expectedMonthlyExpenses", expenses)?;
        }
        if let Some(rate) = self.base_allocation_rate {
            ensure_rate(rate)?;
        }
        Ok(())
    }

    pub fn apply_to(&self, profile: &mut FinancialProfile, now: NaiveDateTime) {
        if let Some(income) = self.expected_monthly_income {
            profile.expected_monthly_income = quantize(income);
        }
        if let Some(expenses) = self.expected_monthly_expenses {
            profile.expected_monthly_expenses = quantize(expenses);
        }
        if let Some(rate) = self.base_allocation_rate {
            profile.base_allocation_rate = rate;
        }
        if let Some(pool) = self.include_savings_in_alloc {
            profile.include_savings_in_alloc = pool;
        }
        profile.updated_at = now;
    }
}

fn ensure_non_negative(field: &str, value: Decimal) -> Result<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::invalid_amount(field, "must not be negative"));
    }
    Ok(())
}

fn ensure_rate(rate: Decimal) -> Result<()> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(Error::invalid_amount(
            "baseAllocationRate",
            "must be a fraction between 0 and 1",
        ));
    }
    Ok(())
}

/// Database row for `financial_profiles`
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = financial_profiles)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FinancialProfileDB {
    pub id: String,
    pub user_id: String,
    pub expected_monthly_income: String,
    pub expected_monthly_expenses: String,
    pub savings_balance: String,
    pub deficit_balance: String,
    pub base_allocation_rate: String,
    pub include_savings_in_alloc: bool,
    pub total_income_snapshot: String,
    pub total_expense_snapshot: String,
    pub snapshot_month: Option<String>,
    pub last_calculated_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<FinancialProfileDB> for FinancialProfile {
    type Error = Error;

    fn try_from(row: FinancialProfileDB) -> Result<Self> {
        Ok(FinancialProfile {
            expected_monthly_income: parse_amount(&row.expected_monthly_income)?,
            expected_monthly_expenses: parse_amount(&row.expected_monthly_expenses)?,
            savings_balance: parse_amount(&row.savings_balance)?,
            deficit_balance: parse_amount(&row.deficit_balance)?,
            base_allocation_rate: parse_amount(&row.base_allocation_rate)?,
            total_income_snapshot: parse_amount(&row.total_income_snapshot)?,
            total_expense_snapshot: parse_amount(&row.total_expense_snapshot)?,
            id: row.id,
            user_id: row.user_id,
            include_savings_in_alloc: row.include_savings_in_alloc,
            snapshot_month: row.snapshot_month,
            last_calculated_at: row.last_calculated_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&FinancialProfile> for FinancialProfileDB {
    fn from(profile: &FinancialProfile) -> Self {
        FinancialProfileDB {
            id: profile.id.clone(),
            user_id: profile.user_id.clone(),
            expected_monthly_income: format_amount(profile.expected_monthly_income),
            expected_monthly_expenses: format_amount(profile.expected_monthly_expenses),
            savings_balance: format_amount(profile.savings_balance),
            deficit_balance: format_amount(profile.deficit_balance),
            base_allocation_rate: profile.base_allocation_rate.normalize().to_string(),
            include_savings_in_alloc: profile.include_savings_in_alloc,
            total_income_snapshot: format_amount(profile.total_income_snapshot),
            total_expense_snapshot: format_amount(profile.total_expense_snapshot),
            snapshot_month: profile.snapshot_month.clone(),
            last_calculated_at: profile.last_calculated_at,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

/// Database row for `period_snapshots`
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = period_snapshots)]
#[diesel(primary_key(user_id, month))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PeriodSnapshotDB {
    pub user_id: String,
    pub month: String,
    pub total_income: String,
    pub total_expense: String,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<PeriodSnapshotDB> for PeriodSnapshot {
    type Error = Error;

    fn try_from(row: PeriodSnapshotDB) -> Result<Self> {
        Ok(PeriodSnapshot {
            total_income: parse_amount(&row.total_income)?,
            total_expense: parse_amount(&row.total_expense)?,
            user_id: row.user_id,
            month: row.month,
            updated_at: row.updated_at,
        })
    }
}

impl From<&PeriodSnapshot> for PeriodSnapshotDB {
    fn from(snapshot: &PeriodSnapshot) -> Self {
        PeriodSnapshotDB {
            user_id: snapshot.user_id.clone(),
            month: snapshot.month.clone(),
            total_income: format_amount(snapshot.total_income),
            total_expense: format_amount(snapshot.total_expense),
            updated_at: snapshot.updated_at,
        }
    }
}

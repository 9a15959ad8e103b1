use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::PeriodTotals;
use crate::money::quantize;
use crate::profiles::{FinancialProfile, PeriodSnapshot};

/// Change in a user's position since the last processed snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaSnapshot {
    pub month: String,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub previous_income: Decimal,
    pub previous_expense: Decimal,
    pub income_delta: Decimal,
    pub expense_delta: Decimal,
    pub net_change: Decimal,
    /// Totals came from the profile's expected figures
    pub used_expected_fallback: bool,
}

impl DeltaSnapshot {
    pub fn is_no_activity(&self) -> bool {
        self.net_change.is_zero()
    }
}

/// Diffs the period totals against the month's own snapshot; a month never
/// processed before starts from zero. A period without qualifying entries is
/// measured by the expected monthly figures instead.
pub fn compute_delta(
    profile: &FinancialProfile,
    previous: Option<&PeriodSnapshot>,
    totals: &PeriodTotals,
    month_key: &str,
) -> DeltaSnapshot {
    let used_expected_fallback = totals.is_empty();
    let (total_income, total_expense) = if used_expected_fallback {
        (
            quantize(profile.expected_monthly_income),
            quantize(profile.expected_monthly_expenses),
        )
    } else {
        (quantize(totals.total_income), quantize(totals.total_expense))
    };
    let (previous_income, previous_expense) = previous
        .map(|s| (s.total_income, s.total_expense))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO));

    let income_delta = quantize(total_income - previous_income);
    let expense_delta = quantize(total_expense - previous_expense);
    DeltaSnapshot {
        month: month_key.to_string(),
        total_income,
        total_expense,
        previous_income,
        previous_expense,
        income_delta,
        expense_delta,
        net_change: quantize(income_delta - expense_delta),
        used_expected_fallback,
    }
}

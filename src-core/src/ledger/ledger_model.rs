use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::money::{format_amount, parse_amount, quantize};
use crate::period::Period;
use crate::schema::{ledger_categories, ledger_entries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    Income,
    Expense,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Income => "income",
            CategoryType::Expense => "expense",
        }
    }
}

impl FromStr for CategoryType {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "income" => Ok(CategoryType::Income),
            "expense" => Ok(CategoryType::Expense),
            other => Err(Error::invalid_input(format!("Unknown category type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub category_type: CategoryType,
    pub is_system: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    pub category_type: CategoryType,
}

impl NewCategory {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_input("Category name cannot be empty"));
        }
        Ok(())
    }

    pub fn into_category(self, id: String) -> Category {
        Category {
            id,
            name: self.name.trim().to_string(),
            category_type: self.category_type,
            is_system: false,
        }
    }
}

/// A recorded income or expense. Entries posted by the engine carry
/// `is_allocation_transaction` and never feed back into period totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub recorded_at: NaiveDateTime,
    pub is_expected: bool,
    pub is_allocation_transaction: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLedgerEntry {
    pub user_id: String,
    pub category_id: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub recorded_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub is_expected: bool,
    #[serde(default)]
    pub is_allocation_transaction: bool,
}

impl NewLedgerEntry {
    /// An engine posting against a system category
    pub fn allocation_posting(
        user_id: &str,
        category_id: &str,
        amount: Decimal,
        description: String,
        recorded_at: NaiveDateTime,
    ) -> Self {
        NewLedgerEntry {
            user_id: user_id.to_string(),
            category_id: category_id.to_string(),
            amount: quantize(amount),
            description: Some(description),
            recorded_at: Some(recorded_at),
            is_expected: false,
            is_allocation_transaction: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::invalid_input("userId cannot be empty"));
        }
        if self.category_id.trim().is_empty() {
            return Err(Error::invalid_input("categoryId cannot be empty"));
        }
        if self.amount <= Decimal::ZERO {
            return Err(Error::invalid_amount("amount", "must be positive"));
        }
        Ok(())
    }

    pub fn into_entry(self, id: String, now: NaiveDateTime) -> LedgerEntry {
        LedgerEntry {
            id,
            user_id: self.user_id,
            category_id: self.category_id,
            amount: self.amount,
            description: self.description,
            recorded_at: self.recorded_at.unwrap_or(now),
            is_expected: self.is_expected,
            is_allocation_transaction: self.is_allocation_transaction,
            created_at: now,
        }
    }
}

/// Editable fields of a user entry. Ownership and engine flags are fixed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LedgerEntryUpdate {
    pub category_id: Option<String>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub recorded_at: Option<NaiveDateTime>,
}

impl LedgerEntryUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.category_id.is_none()
            && self.amount.is_none()
            && self.description.is_none()
            && self.recorded_at.is_none()
        {
            return Err(Error::invalid_input("No fields to update"));
        }
        if let Some(category_id) = &self.category_id {
            if category_id.trim().is_empty() {
                return Err(Error::invalid_input("categoryId cannot be empty"));
            }
        }
        if let Some(amount) = self.amount {
            if amount <= Decimal::ZERO {
                return Err(Error::invalid_amount("amount", "must be positive"));
            }
        }
        Ok(())
    }

    pub fn apply_to(self, entry: &mut LedgerEntry) {
        if let Some(category_id) = self.category_id {
            entry.category_id = category_id;
        }
        if let Some(amount) = self.amount {
            entry.amount = amount;
        }
        if let Some(description) = self.description {
            entry.description = Some(description);
        }
        if let Some(recorded_at) = self.recorded_at {
            entry.recorded_at = recorded_at;
        }
    }
}

/// An edited or removed entry. Both the month it left and the month it now
/// falls in need recalculating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryChange {
    pub previous: LedgerEntry,
    /// `None` once the entry is deleted
    pub current: Option<LedgerEntry>,
}

impl EntryChange {
    pub fn affected_periods(&self) -> Vec<Period> {
        let mut periods = vec![Period::containing(self.previous.recorded_at)];
        if let Some(current) = &self.current {
            let moved_to = Period::containing(current.recorded_at);
            if !periods.contains(&moved_to) {
                periods.push(moved_to);
            }
        }
        periods
    }
}

/// Actual income and expense of one user for one month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub entry_count: usize,
}

impl PeriodTotals {
    /// Sums entries that count towards totals: actual, user-recorded ones.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a LedgerEntry, CategoryType)>,
    {
        let mut totals = PeriodTotals::default();
        for (entry, category_type) in entries {
            if entry.is_expected || entry.is_allocation_transaction {
                continue;
            }
            match category_type {
                CategoryType::Income => totals.total_income += entry.amount,
                CategoryType::Expense => totals.total_expense += entry.amount,
            }
            totals.entry_count += 1;
        }
        totals.total_income = quantize(totals.total_income);
        totals.total_expense = quantize(totals.total_expense);
        totals
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }
}

/// Database row for `ledger_categories`
#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable)]
#[diesel(table_name = ledger_categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CategoryDB {
    pub id: String,
    pub name: String,
    pub category_type: String,
    pub is_system: bool,
}

impl TryFrom<CategoryDB> for Category {
    type Error = Error;

    fn try_from(row: CategoryDB) -> Result<Self> {
        Ok(Category {
            category_type: row.category_type.parse()?,
            id: row.id,
            name: row.name,
            is_system: row.is_system,
        })
    }
}

impl From<&Category> for CategoryDB {
    fn from(category: &Category) -> Self {
        CategoryDB {
            id: category.id.clone(),
            name: category.name.clone(),
            category_type: category.category_type.as_str().to_string(),
            is_system: category.is_system,
        }
    }
}

/// Database row for `ledger_entries`
#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable, AsChangeset)]
#[diesel(table_name = ledger_entries)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LedgerEntryDB {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub amount: String,
    pub description: Option<String>,
    pub recorded_at: NaiveDateTime,
    pub is_expected: bool,
    pub is_allocation_transaction: bool,
    pub created_at: NaiveDateTime,
}

impl TryFrom<LedgerEntryDB> for LedgerEntry {
    type Error = Error;

    fn try_from(row: LedgerEntryDB) -> Result<Self> {
        Ok(LedgerEntry {
            amount: parse_amount(&row.amount)?,
            id: row.id,
            user_id: row.user_id,
            category_id: row.category_id,
            description: row.description,
            recorded_at: row.recorded_at,
            is_expected: row.is_expected,
            is_allocation_transaction: row.is_allocation_transaction,
            created_at: row.created_at,
        })
    }
}

impl From<&LedgerEntry> for LedgerEntryDB {
    fn from(entry: &LedgerEntry) -> Self {
        LedgerEntryDB {
            id: entry.id.clone(),
            user_id: entry.user_id.clone(),
            category_id: entry.category_id.clone(),
            amount: format_amount(entry.amount),
            description: entry.description.clone(),
            recorded_at: entry.recorded_at,
            is_expected: entry.is_expected,
            is_allocation_transaction: entry.is_allocation_transaction,
            created_at: entry.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn entry(amount: Decimal, expected: bool, engine: bool) -> LedgerEntry {
        let at = NaiveDate::from_ymd_opt(2025, 5, 3)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();
        LedgerEntry {
            id: "e".into(),
            user_id: "u1".into(),
            category_id: "c".into(),
            amount,
            description: None,
            recorded_at: at,
            is_expected: expected,
            is_allocation_transaction: engine,
            created_at: at,
        }
    }

    #[test]
    fn totals_skip_expected_and_engine_entries() {
        let salary = entry(dec!(1000), false, false);
        let rent = entry(dec!(400.505), false, false);
        let planned = entry(dec!(50), true, false);
        let saving = entry(dec!(200), false, true);
        let totals = PeriodTotals::from_entries(vec![
            (&salary, CategoryType::Income),
            (&rent, CategoryType::Expense),
            (&planned, CategoryType::Expense),
            (&saving, CategoryType::Expense),
        ]);
        assert_eq!(totals.total_income, dec!(1000.00));
        assert_eq!(totals.total_expense, dec!(400.50));
        assert_eq!(totals.entry_count, 2);
    }

    #[test]
    fn new_entry_requires_positive_amount() {
        let new_entry = NewLedgerEntry {
            user_id: "u1".into(),
            category_id: "c".into(),
            amount: dec!(-5),
            description: None,
            recorded_at: None,
            is_expected: false,
            is_allocation_transaction: false,
        };
        assert!(new_entry.validate().is_err());
    }

    #[test]
    fn entry_update_rejects_empty_and_non_positive() {
        assert!(LedgerEntryUpdate::default().validate().is_err());
        let update = LedgerEntryUpdate {
            amount: Some(dec!(0)),
            ..LedgerEntryUpdate::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn moved_entry_affects_both_months() {
        let previous = entry(dec!(10), false, false);
        let mut current = previous.clone();
        LedgerEntryUpdate {
            recorded_at: NaiveDate::from_ymd_opt(2025, 4, 30).and_then(|d| d.and_hms_opt(8, 0, 0)),
            ..LedgerEntryUpdate::default()
        }
        .apply_to(&mut current);

        let moved = EntryChange {
            previous: previous.clone(),
            current: Some(current),
        };
        let months: Vec<String> = moved.affected_periods().iter().map(|p| p.month_key()).collect();
        assert_eq!(months, vec!["2025-05".to_string(), "2025-04".to_string()]);

        let deleted = EntryChange {
            previous,
            current: None,
        };
        assert_eq!(deleted.affected_periods().len(), 1);
    }
}

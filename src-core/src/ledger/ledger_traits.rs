use async_trait::async_trait;

use crate::errors::Result;
use crate::ledger::ledger_model::{
    Category, EntryChange, LedgerEntry, LedgerEntryUpdate, NewCategory, NewLedgerEntry, PeriodTotals,
};
use crate::period::Period;

/// Storage for ledger entries and their categories
#[async_trait]
pub trait LedgerRepositoryTrait: Send + Sync {
    /// Totals of actual, non-engine entries recorded inside `period`
    fn get_period_totals(&self, user_id: &str, period: &Period) -> Result<PeriodTotals>;
    fn get_entries_for_period(&self, user_id: &str, period: &Period) -> Result<Vec<LedgerEntry>>;
    fn find_category_by_name(&self, name: &str) -> Result<Option<Category>>;
    fn get_category(&self, category_id: &str) -> Result<Option<Category>>;
    fn get_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>>;
    async fn create_entry(&self, new_entry: NewLedgerEntry) -> Result<LedgerEntry>;
    /// Overwrites the stored entry with the same id
    async fn update_entry(&self, entry: LedgerEntry) -> Result<LedgerEntry>;
    async fn delete_entry(&self, entry_id: &str) -> Result<usize>;
    async fn create_category(&self, new_category: NewCategory) -> Result<Category>;
}

#[async_trait]
pub trait LedgerServiceTrait: Send + Sync {
    fn get_period_totals(&self, user_id: &str, period: &Period) -> Result<PeriodTotals>;
    fn get_entries_for_period(&self, user_id: &str, period: &Period) -> Result<Vec<LedgerEntry>>;
    fn get_entry(&self, entry_id: &str) -> Result<LedgerEntry>;
    /// Records a user transaction. Engine postings cannot be created here,
    /// nor entries dated inside a finalized month.
    async fn record_entry(&self, new_entry: NewLedgerEntry) -> Result<LedgerEntry>;
    async fn update_entry(&self, entry_id: &str, update: LedgerEntryUpdate) -> Result<EntryChange>;
    async fn delete_entry(&self, entry_id: &str) -> Result<EntryChange>;
    async fn create_category(&self, new_category: NewCategory) -> Result<Category>;
}

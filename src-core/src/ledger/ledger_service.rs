use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use log::{debug, info};

use crate::allocations::AllocationRepositoryTrait;
use crate::errors::{Error, Result, ValidationError};
use crate::ledger::ledger_model::{
    Category, EntryChange, LedgerEntry, LedgerEntryUpdate, NewCategory, NewLedgerEntry,
    PeriodTotals,
};
use crate::ledger::ledger_traits::{LedgerRepositoryTrait, LedgerServiceTrait};
use crate::period::Period;

pub struct LedgerService<T: LedgerRepositoryTrait> {
    ledger_repo: Arc<T>,
    allocation_repo: Arc<dyn AllocationRepositoryTrait>,
}

impl<T: LedgerRepositoryTrait> LedgerService<T> {
    pub fn new(ledger_repo: Arc<T>, allocation_repo: Arc<dyn AllocationRepositoryTrait>) -> Self {
        LedgerService {
            ledger_repo,
            allocation_repo,
        }
    }

    /// Entries may not land in, or leave, a month that is already frozen.
    fn ensure_month_open(&self, user_id: &str, at: NaiveDateTime) -> Result<()> {
        let month = Period::containing(at).month_key();
        if let Some(finalized_at) = self.allocation_repo.get_month_finalization(user_id, &month)? {
            return Err(ValidationError::MonthAlreadyFinalized {
                month,
                finalized_at,
            }
            .into());
        }
        Ok(())
    }

    fn user_category(&self, category_id: &str) -> Result<Category> {
        let category = self
            .ledger_repo
            .get_category(category_id)?
            .ok_or_else(|| Error::not_found("Category", category_id))?;
        if category.is_system {
            return Err(Error::invalid_input(format!(
                "Category '{}' is reserved for engine postings",
                category.name
            )));
        }
        Ok(category)
    }

    /// Loads an entry the user may still edit
    fn editable_entry(&self, entry_id: &str) -> Result<LedgerEntry> {
        let entry = self.get_entry(entry_id)?;
        if entry.is_allocation_transaction {
            return Err(Error::invalid_input(
                "Allocation transactions are managed by the engine only",
            ));
        }
        self.user_category(&entry.category_id)?;
        self.ensure_month_open(&entry.user_id, entry.recorded_at)?;
        Ok(entry)
    }
}

#[async_trait]
impl<T: LedgerRepositoryTrait + Send + Sync> LedgerServiceTrait for LedgerService<T> {
    fn get_period_totals(&self, user_id: &str, period: &Period) -> Result<PeriodTotals> {
        self.ledger_repo.get_period_totals(user_id, period)
    }

    fn get_entries_for_period(&self, user_id: &str, period: &Period) -> Result<Vec<LedgerEntry>> {
        self.ledger_repo.get_entries_for_period(user_id, period)
    }

    fn get_entry(&self, entry_id: &str) -> Result<LedgerEntry> {
        self.ledger_repo
            .get_entry(entry_id)?
            .ok_or_else(|| Error::not_found("Ledger entry", entry_id))
    }

    async fn record_entry(&self, mut new_entry: NewLedgerEntry) -> Result<LedgerEntry> {
        new_entry.validate()?;
        if new_entry.is_allocation_transaction {
            return Err(Error::invalid_input(
                "Allocation transactions are posted by the engine only",
            ));
        }
        let category = self.user_category(&new_entry.category_id)?;
        let recorded_at = new_entry
            .recorded_at
            .unwrap_or_else(|| chrono::Utc::now().naive_utc());
        self.ensure_month_open(&new_entry.user_id, recorded_at)?;
        new_entry.recorded_at = Some(recorded_at);

        let entry = self.ledger_repo.create_entry(new_entry).await?;
        info!(
            "Recorded {} entry {} of {} for user {}",
            category.category_type.as_str(),
            entry.id,
            entry.amount,
            entry.user_id
        );
        Ok(entry)
    }

    async fn update_entry(&self, entry_id: &str, update: LedgerEntryUpdate) -> Result<EntryChange> {
        update.validate()?;
        let previous = self.editable_entry(entry_id)?;
        let mut entry = previous.clone();
        update.apply_to(&mut entry);
        if entry.category_id != previous.category_id {
            self.user_category(&entry.category_id)?;
        }
        if entry.recorded_at != previous.recorded_at {
            self.ensure_month_open(&entry.user_id, entry.recorded_at)?;
        }

        let entry = self.ledger_repo.update_entry(entry).await?;
        info!(
            "Updated entry {} for user {}: {} -> {}",
            entry.id, entry.user_id, previous.amount, entry.amount
        );
        Ok(EntryChange {
            previous,
            current: Some(entry),
        })
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<EntryChange> {
        let previous = self.editable_entry(entry_id)?;
        self.ledger_repo.delete_entry(entry_id).await?;
        info!("Deleted entry {} for user {}", previous.id, previous.user_id);
        Ok(EntryChange {
            previous,
            current: None,
        })
    }

    async fn create_category(&self, new_category: NewCategory) -> Result<Category> {
        new_category.validate()?;
        if self
            .ledger_repo
            .find_category_by_name(new_category.name.trim())?
            .is_some()
        {
            return Err(Error::invalid_input(format!(
                "Category '{}' already exists",
                new_category.name.trim()
            )));
        }
        let category = self.ledger_repo.create_category(new_category).await?;
        debug!("Created category {} ({})", category.name, category.id);
        Ok(category)
    }
}

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::allocations::AllocationStage;
use crate::goals::Goal;
use crate::ledger::NewLedgerEntry;
use crate::profiles::{FinancialProfile, PeriodSnapshot, SnapshotGuard};
use crate::recalculation::delta::DeltaSnapshot;
use crate::recalculation::distributor::GoalShare;
use crate::recalculation::pullback::PullbackPlan;
use crate::recalculation::savings::SavingsReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecalculationStatus {
    /// Totals match the snapshot; nothing was written
    NoActivity,
    /// Funds only covered part of the deficit
    DeficitPartial,
    /// Funds were fully consumed repaying the deficit
    DeficitRepaid,
    /// A shortfall was recovered through pullback
    ExpenseProcessed,
    /// Leftover went to savings without any goal allocation
    Saved,
    Allocated,
}

impl RecalculationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecalculationStatus::NoActivity => "no_activity",
            RecalculationStatus::DeficitPartial => "deficit_partial",
            RecalculationStatus::DeficitRepaid => "deficit_repaid",
            RecalculationStatus::ExpenseProcessed => "expense_processed",
            RecalculationStatus::Saved => "saved",
            RecalculationStatus::Allocated => "allocated",
        }
    }
}

/// What one recalculation did, returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculationResult {
    pub status: RecalculationStatus,
    pub user_id: String,
    pub month: String,
    pub delta: DeltaSnapshot,
    /// Net change plus pooled savings
    pub available_funds: Decimal,
    pub savings_pooled: Decimal,
    pub deficit_repaid: Decimal,
    pub allocations: Vec<GoalShare>,
    pub total_allocated: Decimal,
    pub savings_added: Decimal,
    pub savings_reason: Option<SavingsReason>,
    pub pullback: Option<PullbackPlan>,
    pub savings_balance: Decimal,
    pub deficit_balance: Decimal,
    pub calculated_at: Option<NaiveDateTime>,
}

impl RecalculationResult {
    pub(crate) fn new(profile: &FinancialProfile, delta: DeltaSnapshot) -> Self {
        RecalculationResult {
            status: RecalculationStatus::NoActivity,
            user_id: profile.user_id.clone(),
            month: delta.month.clone(),
            delta,
            available_funds: Decimal::ZERO,
            savings_pooled: Decimal::ZERO,
            deficit_repaid: Decimal::ZERO,
            allocations: Vec::new(),
            total_allocated: Decimal::ZERO,
            savings_added: Decimal::ZERO,
            savings_reason: None,
            pullback: None,
            savings_balance: profile.savings_balance,
            deficit_balance: profile.deficit_balance,
            calculated_at: profile.last_calculated_at,
        }
    }
}

/// One allocation row to write in the commit
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationWrite {
    pub goal_id: String,
    pub month: String,
    /// The row's new total for the month
    pub amount: Decimal,
    pub stage: AllocationStage,
}

/// Everything a recalculation writes, applied in one transaction
#[derive(Debug, Clone)]
pub struct RecalculationChangeset {
    pub user_id: String,
    /// State the plan was computed against
    pub guard: SnapshotGuard,
    pub profile: FinancialProfile,
    /// The processed month's totals, replacing its previous snapshot
    pub snapshot: PeriodSnapshot,
    pub allocations: Vec<AllocationWrite>,
    pub entries: Vec<NewLedgerEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalProgressWrite {
    pub goal_id: String,
    pub delta: Decimal,
}

/// Progress to commit and rows to freeze for one month
#[derive(Debug, Clone)]
pub struct FinalizationChangeset {
    pub month: String,
    pub progress: Vec<GoalProgressWrite>,
    pub allocation_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FinalizationCommit {
    pub goals: Vec<Goal>,
    pub allocations_finalized: usize,
    pub finalized_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedGoal {
    pub goal_id: String,
    pub goal_title: String,
    pub amount_applied: Decimal,
    pub current_amount: Decimal,
    pub target_amount: Decimal,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFinalization {
    pub goal_id: String,
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizationResult {
    pub month: String,
    pub user_id: Option<String>,
    pub allocations_finalized: usize,
    pub total_finalized: Decimal,
    pub goals: Vec<FinalizedGoal>,
    pub completed_goals: usize,
    pub skipped: Vec<SkippedFinalization>,
    pub finalized_at: NaiveDateTime,
}

//! The allocation waterfall and monthly finalization.
//!
//! A recalculation diffs the month's ledger totals against the profile
//! snapshot, then routes a positive change through deficit repayment, goal
//! distribution and the savings sink, or recovers a negative change through
//! pullback. Nothing is written until the whole plan is committed through a
//! [`UnitOfWorkTrait`].

pub mod deficit;
pub mod delta;
pub mod distributor;
pub mod finalization_service;
pub mod locks;
pub mod pullback;
pub mod recalculation_model;
pub mod recalculation_service;
pub mod savings;
pub mod unit_of_work;

pub use finalization_service::FinalizationService;
pub use locks::LockRegistry;
pub use recalculation_model::{
    FinalizationResult, FinalizedGoal, RecalculationResult, RecalculationStatus,
    SkippedFinalization,
};
pub use recalculation_service::RecalculationService;
pub use savings::SavingsReason;
pub use unit_of_work::{SqliteUnitOfWork, UnitOfWorkTrait};

//! Core of FundFlow: profiles, goals, ledger and the allocation engine that
//! distributes each change in a user's net position across deficit, goals
//! and savings.

pub mod allocations;
pub mod constants;
pub mod db;
pub mod errors;
pub mod goals;
pub mod ledger;
pub mod memory;
pub mod money;
pub mod period;
pub mod profiles;
pub mod recalculation;
pub mod schema;

pub use errors::{Error, Result};
pub use period::Period;

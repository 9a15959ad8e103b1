use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::quantize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsReason {
    NoActiveGoals,
    GoalsFunded,
    Leftover,
}

impl SavingsReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SavingsReason::NoActiveGoals => "no_active_goals",
            SavingsReason::GoalsFunded => "goals_funded",
            SavingsReason::Leftover => "leftover",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            SavingsReason::NoActiveGoals => "No active goals to fund",
            SavingsReason::GoalsFunded => "All goals already funded",
            SavingsReason::Leftover => "Leftover after proportional allocation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsDeposit {
    pub amount: Decimal,
    pub reason: SavingsReason,
}

/// What remains of `available` after goal allocation, if anything.
pub fn sink_leftover(
    available: Decimal,
    total_allocated: Decimal,
    fundable_goals: usize,
    open_gap: Decimal,
) -> Option<SavingsDeposit> {
    let amount = quantize(available - total_allocated);
    if amount <= Decimal::ZERO {
        return None;
    }
    let reason = if fundable_goals == 0 {
        SavingsReason::NoActiveGoals
    } else if open_gap <= Decimal::ZERO {
        SavingsReason::GoalsFunded
    } else {
        SavingsReason::Leftover
    };
    Some(SavingsDeposit { amount, reason })
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::goals::Goal;
use crate::money::quantize;

/// A goal eligible for new funds together with its pending allocations
#[derive(Debug, Clone)]
pub struct DistributionCandidate {
    pub goal: Goal,
    /// Non-finalized allocations across months
    pub pending_amount: Decimal,
}

impl DistributionCandidate {
    pub fn gap(&self) -> Decimal {
        self.goal.gap_after(self.pending_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalShare {
    pub goal_id: String,
    pub goal_title: String,
    pub priority_weight: i32,
    pub gap: Decimal,
    pub proposed: Decimal,
    pub allocated: Decimal,
    /// Projected progress reaches the target with this allocation
    pub reaches_target: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub eligible_goals: usize,
    pub total_gap: Decimal,
    pub total_priority: i32,
    pub allocatable_pool: Decimal,
    pub shares: Vec<GoalShare>,
    pub total_allocated: Decimal,
}

/// Splits `available` across goals by priority weight, each share capped by
/// the goal's remaining gap.
pub fn distribute(available: Decimal, candidates: &[DistributionCandidate]) -> Distribution {
    let eligible: Vec<(&DistributionCandidate, Decimal)> = candidates
        .iter()
        .filter(|c| c.goal.accepts_allocation())
        .map(|c| (c, c.gap()))
        .filter(|(_, gap)| *gap > Decimal::ZERO)
        .collect();

    let total_gap = quantize(eligible.iter().map(|(_, gap)| *gap).sum());
    let total_priority: i32 = eligible.iter().map(|(c, _)| c.goal.priority_weight.max(0)).sum();

    let mut distribution = Distribution {
        eligible_goals: eligible.len(),
        total_gap,
        total_priority,
        allocatable_pool: Decimal::ZERO,
        shares: Vec::new(),
        total_allocated: Decimal::ZERO,
    };
    if available <= Decimal::ZERO || total_gap.is_zero() || total_priority == 0 {
        return distribution;
    }

    let pool = quantize(available.min(total_gap));
    let total_weight = Decimal::from(total_priority);
    let mut total_allocated = Decimal::ZERO;
    for (candidate, gap) in eligible {
        if candidate.goal.priority_weight <= 0 {
            continue;
        }
        let proposed = quantize(pool * Decimal::from(candidate.goal.priority_weight) / total_weight);
        let allocated = proposed.min(gap);
        if allocated <= Decimal::ZERO {
            continue;
        }
        total_allocated += allocated;
        distribution.shares.push(GoalShare {
            goal_id: candidate.goal.id.clone(),
            goal_title: candidate.goal.title.clone(),
            priority_weight: candidate.goal.priority_weight,
            gap,
            proposed,
            allocated,
            reaches_target: allocated >= gap,
        });
    }
    distribution.allocatable_pool = pool;
    distribution.total_allocated = quantize(total_allocated);
    distribution
}

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::constants::{COMPLETED_REASON, DEFAULT_PROTECTION_REASON, INACTIVE_REASON, LOCKED_REASON};
use crate::goals::{Goal, ProtectionLevel};
use crate::money::{percent_of, quantize};

/// A goal holding funds in the month being recalculated
#[derive(Debug, Clone)]
pub struct PullbackCandidate {
    pub goal: Goal,
    /// The goal's allocation for the current month
    pub month_allocation: Decimal,
    /// Committed plus pending progress
    pub projected_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalReduction {
    pub goal_id: String,
    pub goal_title: String,
    pub pull_score: Decimal,
    pub amount: Decimal,
    pub resulting_allocation: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedGoal {
    pub goal_id: String,
    pub goal_title: String,
    pub reason: String,
}

/// Where a shortfall is recovered from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullbackPlan {
    pub shortfall: Decimal,
    pub from_savings: Decimal,
    pub from_goals: Decimal,
    pub new_deficit: Decimal,
    pub goal_reductions: Vec<GoalReduction>,
    pub protected_skipped: Vec<SkippedGoal>,
}

/// `(100 - weight) * 2 + (100 - completion%) + (0 if essential else 50)`.
/// Candidates are drained in ascending score order.
pub fn pull_score(goal: &Goal, projected_amount: Decimal) -> Decimal {
    let completion = percent_of(projected_amount, goal.target_amount);
    let essential_penalty = if goal.is_essential { dec!(0) } else { dec!(50) };
    (dec!(100) - Decimal::from(goal.priority_weight)) * dec!(2) + (dec!(100) - completion)
        + essential_penalty
}

fn skip_reason(goal: &Goal) -> Option<String> {
    if !goal.is_active {
        return Some(INACTIVE_REASON.to_string());
    }
    if goal.protection_level == ProtectionLevel::Protected {
        return Some(
            goal.protection_reason
                .clone()
                .unwrap_or_else(|| DEFAULT_PROTECTION_REASON.to_string()),
        );
    }
    if goal.is_locked {
        return Some(LOCKED_REASON.to_string());
    }
    if goal.is_completed() {
        return Some(COMPLETED_REASON.to_string());
    }
    None
}

/// Recovers `shortfall` from savings, then from flexible goal allocations in
/// pull-score order; whatever is left becomes deficit.
pub fn plan_pullback(
    shortfall: Decimal,
    savings_balance: Decimal,
    candidates: &[PullbackCandidate],
) -> PullbackPlan {
    let shortfall = quantize(shortfall);
    let mut remaining = shortfall;

    let from_savings = quantize(savings_balance.max(Decimal::ZERO).min(remaining));
    remaining = quantize(remaining - from_savings);

    let mut protected_skipped = Vec::new();
    let mut pullable = Vec::new();
    for candidate in candidates.iter().filter(|c| c.month_allocation > Decimal::ZERO) {
        match skip_reason(&candidate.goal) {
            Some(reason) => protected_skipped.push(SkippedGoal {
                goal_id: candidate.goal.id.clone(),
                goal_title: candidate.goal.title.clone(),
                reason,
            }),
            None => pullable.push((pull_score(&candidate.goal, candidate.projected_amount), candidate)),
        }
    }
    pullable.sort_by(|(a_score, a), (b_score, b)| {
        a_score.cmp(b_score).then_with(|| a.goal.id.cmp(&b.goal.id))
    });

    let mut goal_reductions = Vec::new();
    let mut from_goals = Decimal::ZERO;
    for (score, candidate) in pullable {
        if remaining <= Decimal::ZERO {
            break;
        }
        let amount = quantize(candidate.month_allocation.min(remaining));
        if amount <= Decimal::ZERO {
            continue;
        }
        remaining = quantize(remaining - amount);
        from_goals += amount;
        goal_reductions.push(GoalReduction {
            goal_id: candidate.goal.id.clone(),
            goal_title: candidate.goal.title.clone(),
            pull_score: score,
            amount,
            resulting_allocation: quantize(candidate.month_allocation - amount),
        });
    }

    PullbackPlan {
        shortfall,
        from_savings,
        from_goals: quantize(from_goals),
        new_deficit: remaining,
        goal_reductions,
        protected_skipped,
    }
}

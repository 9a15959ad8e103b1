use rust_decimal::Decimal;

use crate::money::quantize;

/// Outcome of applying positive funds to an outstanding deficit
#[derive(Debug, Clone, PartialEq)]
pub struct DeficitOutcome {
    pub repaid: Decimal,
    pub remaining_deficit: Decimal,
    /// Funds left over after repayment
    pub remaining_funds: Decimal,
}

impl DeficitOutcome {
    pub fn is_partial(&self) -> bool {
        self.remaining_deficit > Decimal::ZERO
    }
}

/// Repays as much of `deficit` as `available` covers.
pub fn resolve_deficit(deficit: Decimal, available: Decimal) -> DeficitOutcome {
    if deficit <= Decimal::ZERO || available <= Decimal::ZERO {
        return DeficitOutcome {
            repaid: quantize(Decimal::ZERO),
            remaining_deficit: quantize(deficit.max(Decimal::ZERO)),
            remaining_funds: quantize(available.max(Decimal::ZERO)),
        };
    }
    let repaid = quantize(deficit.min(available));
    DeficitOutcome {
        repaid,
        remaining_deficit: quantize(deficit - repaid),
        remaining_funds: quantize(available - repaid),
    }
}

/// Ledger category used when a shortfall becomes a deficit
pub const DEFICIT_CATEGORY: &str = "Deficit";

/// Ledger category used when incoming funds pay a deficit down
pub const DEFICIT_REPAYMENT_CATEGORY: &str = "Deficit Repayment";

/// Ledger category for savings deposits and withdrawals
pub const SAVING_CATEGORY: &str = "Saving";

/// Categories every store seeds on creation
pub const SYSTEM_CATEGORIES: [&str; 3] = [DEFICIT_CATEGORY, DEFICIT_REPAYMENT_CATEGORY, SAVING_CATEGORY];

pub const MAX_PRIORITY_WEIGHT: i32 = 100;

pub const DEFAULT_PROTECTION_REASON: &str = "User-protected";
pub const LOCKED_REASON: &str = "Goal is locked";
pub const COMPLETED_REASON: &str = "Goal is completed";
pub const INACTIVE_REASON: &str = "Goal is inactive";

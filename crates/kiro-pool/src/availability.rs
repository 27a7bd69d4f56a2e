//! Remaining-uses estimate from a usage snapshot
//!
//! Collapses the upstream's overlapping allowances (base limit plus an
//! optional active free trial) on the `CREDIT` resource into one comparable
//! scalar. The result is a heuristic: the pool decrements it locally per
//! selection and only resynchronises on the next refresh.

use kiro_auth::{CREDIT_RESOURCE_TYPE, UsageLimits};

/// Remaining uses for a token, never negative.
///
/// Returns 0 when the snapshot has no `CREDIT` breakdown.
pub fn compute_remaining_uses(usage: &UsageLimits) -> f64 {
    let Some(credit) = usage.breakdown(CREDIT_RESOURCE_TYPE) else {
        return 0.0;
    };

    let mut total = 0.0;
    if let Some(trial) = credit.free_trial_info.as_ref().filter(|t| t.is_active()) {
        total += trial.usage_limit_with_precision - trial.current_usage_with_precision;
    }
    total += credit.usage_limit_with_precision - credit.current_usage_with_precision;

    if total < 0.0 { 0.0 } else { total }
}

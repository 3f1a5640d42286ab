//! Cost Observer: reads spend-to-date and compares it against limits.
//!
//! The observer never acts. Callers decide what a breach, an advisory
//! crossing or an unreachable billing API means.
//!
//! Two comparisons live here on purpose:
//!
//! - [`is_breach`] is inclusive (`>=`): spend of exactly `limit * fraction`
//!   triggers the kill switch.
//! - [`crossed_alert_levels`] is exclusive (`>`), matching how budget
//!   notifications have always fired. A spend sitting exactly on an alert
//!   level does not raise that alert.

use costguard_core::{SpendSnapshot, SpendWindow};
use costguard_provider::{CloudProvider, ProviderError};
use rust_decimal::Decimal;

/// Spend accrued in `window`, straight from the provider.
///
/// Never cached: every check re-reads billing.
pub async fn get_current_spend(
    provider: &dyn CloudProvider,
    window: &SpendWindow,
) -> Result<SpendSnapshot, ProviderError> {
    provider.get_cost(window).await
}

/// True when `snapshot.amount >= limit * fraction`.
pub fn is_breach(snapshot: &SpendSnapshot, limit: Decimal, fraction: Decimal) -> bool {
    snapshot.amount >= limit * fraction
}

/// `amount / limit * 100`, rounded to two places. Zero for a non-positive limit.
pub fn utilization_percentage(amount: Decimal, limit: Decimal) -> Decimal {
    if limit <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (amount / limit * Decimal::ONE_HUNDRED).round_dp(2)
}

/// Advisory fractions strictly exceeded by `snapshot.amount`, in input order.
pub fn crossed_alert_levels(
    snapshot: &SpendSnapshot,
    limit: Decimal,
    fractions: &[Decimal],
) -> Vec<Decimal> {
    fractions
        .iter()
        .copied()
        .filter(|f| snapshot.amount > limit * *f)
        .collect()
}

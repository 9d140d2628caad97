//! Monthly free-allowance tracking per account and action type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing::PricingRule;

/// Allowance consumption for one account × action type × cycle.
///
/// `used_this_month` is capped at the rule's allowance: quantity beyond the
/// allowance is billable and accounted for by the pricing engine, never
/// silently dropped here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceState {
    /// Free actions consumed in the current cycle.
    pub used_this_month: u32,

    /// Cycle-start marker of the last reset; makes resets idempotent
    /// within a cycle.
    pub last_reset_cycle_start: DateTime<Utc>,
}

impl AllowanceState {
    /// Fresh state for a cycle starting at `cycle_start`.
    #[must_use]
    pub fn new(cycle_start: DateTime<Utc>) -> Self {
        Self {
            used_this_month: 0,
            last_reset_cycle_start: cycle_start,
        }
    }

    /// Remaining free actions under `rule` this cycle.
    #[must_use]
    pub fn remaining(&self, rule: &PricingRule) -> u32 {
        rule.free_allowance_per_month
            .saturating_sub(self.used_this_month)
    }

    /// Consume `quantity` actions. Usage is capped at the rule's allowance;
    /// the capped excess is the billable portion reported by the quote.
    pub fn consume(&mut self, rule: &PricingRule, quantity: u32) {
        self.used_this_month = self
            .used_this_month
            .saturating_add(quantity)
            .min(rule.free_allowance_per_month);
    }

    /// Reset usage for the cycle starting at `cycle_start`. Idempotent: a
    /// second reset for the same cycle is a no-op. Returns whether the
    /// reset applied.
    pub fn reset(&mut self, cycle_start: DateTime<Utc>) -> bool {
        if self.last_reset_cycle_start >= cycle_start {
            return false;
        }
        self.used_this_month = 0;
        self.last_reset_cycle_start = cycle_start;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PricingRule;
    use chrono::Duration;

    fn rule() -> PricingRule {
        PricingRule::flat("creator_search", 2, 5)
    }

    #[test]
    fn remaining_never_negative() {
        let rule = rule();
        let mut state = AllowanceState::new(Utc::now());
        state.consume(&rule, 8);

        assert_eq!(state.used_this_month, 5); // capped at the allowance
        assert_eq!(state.remaining(&rule), 0);
    }

    #[test]
    fn remaining_decreases_monotonically_within_cycle() {
        let rule = rule();
        let mut state = AllowanceState::new(Utc::now());

        assert_eq!(state.remaining(&rule), 5);
        state.consume(&rule, 2);
        assert_eq!(state.remaining(&rule), 3);
        state.consume(&rule, 2);
        assert_eq!(state.remaining(&rule), 1);
    }

    #[test]
    fn reset_restores_full_allowance_once_per_cycle() {
        let rule = rule();
        let cycle1 = Utc::now();
        let cycle2 = cycle1 + Duration::days(30);

        let mut state = AllowanceState::new(cycle1);
        state.consume(&rule, 5);
        assert_eq!(state.remaining(&rule), 0);

        assert!(state.reset(cycle2));
        assert_eq!(state.remaining(&rule), rule.free_allowance_per_month);

        // Duplicate trigger within the same cycle is a no-op.
        state.consume(&rule, 3);
        assert!(!state.reset(cycle2));
        assert_eq!(state.used_this_month, 3);
    }
}

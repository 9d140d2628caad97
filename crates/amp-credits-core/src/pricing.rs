//! Pricing rules and quote computation.
//!
//! A [`PricingTable`] maps each billable action type to a [`PricingRule`]:
//! per-action cost, monthly free allowance, and optional bulk-discount
//! tiers. [`PricingRule::quote`] is the pure cost computation used both for
//! dry-run quotes and, recomputed under the account lock, for commits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CreditError, Result};

/// A percentage discount applied at or above a quantity threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDiscount {
    /// Minimum billable quantity for this tier to apply.
    pub min_quantity: u32,

    /// Discount percentage (0–100).
    pub discount_percentage: u8,
}

/// Pricing for one action type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRule {
    /// The action type this rule prices.
    pub action_type: String,

    /// Cost per action in credits.
    pub credits_per_action: i64,

    /// Free actions per billing cycle.
    pub free_allowance_per_month: u32,

    /// Bulk-discount tiers, ascending by `min_quantity`, non-overlapping.
    #[serde(default)]
    pub bulk_discounts: Vec<BulkDiscount>,
}

impl PricingRule {
    /// Create a rule without bulk discounts.
    #[must_use]
    pub fn flat(action_type: &str, credits_per_action: i64, free_allowance_per_month: u32) -> Self {
        Self {
            action_type: action_type.to_string(),
            credits_per_action,
            free_allowance_per_month,
            bulk_discounts: Vec::new(),
        }
    }

    /// Attach bulk-discount tiers to this rule.
    ///
    /// # Errors
    ///
    /// `InvalidPricingRule` if tiers are not strictly ascending by
    /// `min_quantity` or a percentage exceeds 100.
    pub fn with_bulk_discounts(mut self, tiers: Vec<BulkDiscount>) -> Result<Self> {
        for pair in tiers.windows(2) {
            if pair[1].min_quantity <= pair[0].min_quantity {
                return Err(CreditError::InvalidPricingRule {
                    action_type: self.action_type.clone(),
                    reason: format!(
                        "discount tiers must ascend by min_quantity: {} then {}",
                        pair[0].min_quantity, pair[1].min_quantity
                    ),
                });
            }
        }
        if let Some(bad) = tiers.iter().find(|t| t.discount_percentage > 100) {
            return Err(CreditError::InvalidPricingRule {
                action_type: self.action_type.clone(),
                reason: format!("discount percentage {} exceeds 100", bad.discount_percentage),
            });
        }
        self.bulk_discounts = tiers;
        Ok(self)
    }

    /// The best-matching discount for a billable quantity: the tier with the
    /// largest `min_quantity` not exceeding `billable_quantity`, or 0%.
    #[must_use]
    pub fn discount_for(&self, billable_quantity: u32) -> u8 {
        self.bulk_discounts
            .iter()
            .filter(|t| t.min_quantity <= billable_quantity)
            .max_by_key(|t| t.min_quantity)
            .map_or(0, |t| t.discount_percentage)
    }

    /// Compute the cost of performing `quantity` actions given the caller's
    /// remaining free allowance. Pure: no state is consumed.
    #[must_use]
    pub fn quote(&self, remaining_allowance: u32, quantity: u32) -> Quote {
        let free_quantity = quantity.min(remaining_allowance);
        let billable_quantity = quantity - free_quantity;
        let discount_percentage = self.discount_for(billable_quantity);

        let gross_times_100 =
            i64::from(billable_quantity) * self.credits_per_action * i64::from(100 - u16::from(discount_percentage));
        let total_cost = round_half_up_div_100(gross_times_100);

        Quote {
            action_type: self.action_type.clone(),
            quantity,
            free_quantity,
            billable_quantity,
            credits_per_action: self.credits_per_action,
            discount_percentage,
            total_cost,
        }
    }
}

/// The result of a pure cost computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// The priced action type.
    pub action_type: String,

    /// Requested quantity.
    pub quantity: u32,

    /// Portion covered by the monthly free allowance.
    pub free_quantity: u32,

    /// Portion charged against the wallet.
    pub billable_quantity: u32,

    /// Per-action cost in credits, before discount.
    pub credits_per_action: i64,

    /// Applied bulk-discount percentage.
    pub discount_percentage: u8,

    /// Total charge in whole credits, rounded half-up.
    pub total_cost: i64,
}

/// The static-per-cycle pricing table: one rule per action type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTable {
    /// Rules keyed by action type. `BTreeMap` keeps listings stable.
    pub rules: BTreeMap<String, PricingRule>,
}

impl PricingTable {
    /// Build a table from a list of rules.
    #[must_use]
    pub fn new(rules: Vec<PricingRule>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|r| (r.action_type.clone(), r))
                .collect(),
        }
    }

    /// Look up the active rule for an action type.
    ///
    /// # Errors
    ///
    /// `UnknownAction` if no rule exists.
    pub fn rule(&self, action_type: &str) -> Result<&PricingRule> {
        self.rules
            .get(action_type)
            .ok_or_else(|| CreditError::UnknownAction {
                action_type: action_type.to_string(),
            })
    }

    /// All action types with a rule, in stable order.
    pub fn action_types(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

impl Default for PricingTable {
    /// The platform's billable actions.
    fn default() -> Self {
        let rules = vec![
            PricingRule::flat("creator_search", 2, 5)
                .with_bulk_discounts(vec![
                    BulkDiscount {
                        min_quantity: 10,
                        discount_percentage: 5,
                    },
                    BulkDiscount {
                        min_quantity: 50,
                        discount_percentage: 15,
                    },
                ])
                .expect("static tiers are valid"),
            PricingRule::flat("creator_report", 10, 1),
            PricingRule::flat("campaign_export", 5, 2),
            PricingRule::flat("outreach_message", 1, 20)
                .with_bulk_discounts(vec![
                    BulkDiscount {
                        min_quantity: 100,
                        discount_percentage: 10,
                    },
                    BulkDiscount {
                        min_quantity: 500,
                        discount_percentage: 25,
                    },
                ])
                .expect("static tiers are valid"),
            PricingRule::flat("audience_analysis", 8, 0),
        ];
        Self::new(rules)
    }
}

/// Validate a requested quantity: positive whole number, bounded.
///
/// # Errors
///
/// `InvalidQuantity` for non-positive values or values above `u32::MAX`.
pub fn ensure_quantity(quantity: i64) -> Result<u32> {
    if quantity <= 0 {
        return Err(CreditError::InvalidQuantity(quantity));
    }
    u32::try_from(quantity).map_err(|_| CreditError::InvalidQuantity(quantity))
}

/// Round-half-up division of a non-negative hundredths amount to whole
/// credits. Fractional credits are never persisted.
fn round_half_up_div_100(hundredths: i64) -> i64 {
    (hundredths + 50) / 100
}

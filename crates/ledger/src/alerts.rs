//! Low-stock classification and reorder suggestions.
//!
//! Stateless read-side computation: classification is a pure function of the
//! current quantity and the effective threshold, recomputed on every query.
//! Nothing here is cached or incrementally maintained — freshness is traded
//! for recompute cost, which removes stale-cache bugs entirely.

use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, StoreId};

/// Alert classification of one (store, product) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    OutOfStock,
    LowStock,
    Ok,
}

impl AlertLevel {
    /// Sort rank for alert listings: out-of-stock pairs first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::OutOfStock => 0,
            Self::LowStock => 1,
            Self::Ok => 2,
        }
    }
}

/// Evaluator configuration, passed explicitly on every call.
///
/// `fallback_threshold` substitutes for a zero reorder point so deployments
/// can flag products that were never given one. The default of 0 disables the
/// substitution, leaving the per-product reorder point as the only threshold.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPolicy {
    pub fallback_threshold: i64,
}

impl AlertPolicy {
    pub fn new(fallback_threshold: i64) -> Self {
        Self { fallback_threshold }
    }

    /// Threshold used for classification of a product with the given reorder
    /// point.
    pub fn effective_threshold(&self, reorder_point: i64) -> i64 {
        if reorder_point > 0 {
            reorder_point
        } else {
            self.fallback_threshold
        }
    }
}

/// Classify a quantity against a threshold.
pub fn classify(quantity: i64, threshold: i64) -> AlertLevel {
    if quantity == 0 {
        AlertLevel::OutOfStock
    } else if quantity <= threshold {
        AlertLevel::LowStock
    } else {
        AlertLevel::Ok
    }
}

/// Suggested restock quantity for a flagged pair: enough to reach twice the
/// reorder point, and never less than one unit.
pub fn suggested_quantity(quantity: i64, reorder_point: i64) -> i64 {
    reorder_point
        .saturating_mul(2)
        .saturating_sub(quantity)
        .max(1)
}

/// One flagged (store, product) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub sku: String,
    pub product_name: String,
    pub store_name: String,
    pub quantity: i64,
    pub reorder_point: i64,
    pub level: AlertLevel,
}

/// A flagged pair with its suggested restock quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderSuggestion {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub sku: String,
    pub product_name: String,
    pub store_name: String,
    pub quantity: i64,
    pub reorder_point: i64,
    pub suggested_quantity: i64,
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn zero_quantity_is_out_of_stock_regardless_of_threshold() {
        assert_eq!(classify(0, 0), AlertLevel::OutOfStock);
        assert_eq!(classify(0, 50), AlertLevel::OutOfStock);
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify(5, 5), AlertLevel::LowStock);
        assert_eq!(classify(6, 5), AlertLevel::Ok);
        assert_eq!(classify(1, 0), AlertLevel::Ok);
    }

    #[test]
    fn fallback_threshold_only_applies_to_zero_reorder_points() {
        let policy = AlertPolicy::new(10);
        assert_eq!(policy.effective_threshold(0), 10);
        assert_eq!(policy.effective_threshold(3), 3);

        let disabled = AlertPolicy::default();
        assert_eq!(disabled.effective_threshold(0), 0);
    }

    #[test]
    fn suggestion_targets_twice_the_reorder_point() {
        assert_eq!(suggested_quantity(4, 5), 6);
        assert_eq!(suggested_quantity(0, 5), 10);
        // Already above target: still suggest the minimum unit.
        assert_eq!(suggested_quantity(40, 5), 1);
    }

    #[test]
    fn suggestion_saturates_on_extreme_reorder_points() {
        assert_eq!(suggested_quantity(0, i64::MAX), i64::MAX);
        assert_eq!(suggested_quantity(i64::MAX, 0), 1);
    }

    #[test]
    fn out_of_stock_ranks_before_low_stock() {
        assert!(AlertLevel::OutOfStock.rank() < AlertLevel::LowStock.rank());
        assert!(AlertLevel::LowStock.rank() < AlertLevel::Ok.rank());
    }

    proptest! {
        #[test]
        fn suggestion_is_always_positive(q in 0i64..=i64::MAX, rp in 0i64..=i64::MAX) {
            prop_assert!(suggested_quantity(q, rp) >= 1);
        }

        #[test]
        fn classification_is_total_and_consistent(q in 0i64..10_000, t in 0i64..10_000) {
            match classify(q, t) {
                AlertLevel::OutOfStock => prop_assert_eq!(q, 0),
                AlertLevel::LowStock => prop_assert!(q > 0 && q <= t),
                AlertLevel::Ok => prop_assert!(q > t),
            }
        }
    }
}

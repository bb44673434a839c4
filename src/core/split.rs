//! Partial consumption: "I used N of the M units".
//!
//! Both halves are priced from the original `unit_price`, so the consumed and
//! remaining totals add back up to the original total within rounding.

use chrono::{DateTime, Utc};

use crate::core::item::{dedupe_ids, validate_quantity};
use crate::core::{Item, ItemStatus};
use crate::errors::{Error, Result};

/// Records produced by using some or all of a fridge item.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutcome {
    /// Everything was used; the original item is now `Used`
    FullyUsed(Item),
    /// Part was used
    Split {
        /// New `Used` record for the consumed portion
        consumed: Item,
        /// The original record, reduced and unallocated again
        remainder: Item,
    },
}

impl SplitOutcome {
    /// All records that need persisting, new records first.
    #[must_use]
    pub fn records(&self) -> Vec<&Item> {
        match self {
            Self::FullyUsed(item) => vec![item],
            Self::Split {
                consumed,
                remainder,
            } => vec![consumed, remainder],
        }
    }
}

/// Uses `used_quantity` of a fridge item, charging it to `shared_by`.
///
/// Non-positive quantities are rejected and nothing changes. Using at least the
/// full quantity turns the item itself into a `Used` record with the chosen
/// sharing set and no payments yet. Otherwise a new consumed record is created and the original keeps its
/// id and `date_added`, with `shared_by` and `paid_by` cleared.
pub fn use_quantity(
    item: &Item,
    used_quantity: f64,
    shared_by: Vec<String>,
    now: DateTime<Utc>,
) -> Result<SplitOutcome> {
    let used_quantity = validate_quantity(used_quantity)?;
    if item.status != ItemStatus::InFridge {
        return Err(Error::InvalidTransition {
            from: item.status.to_string(),
            to: "partial use".to_string(),
        });
    }
    let shared_by = dedupe_ids(shared_by);

    if used_quantity >= item.quantity {
        return Ok(SplitOutcome::FullyUsed(Item {
            status: ItemStatus::Used,
            shared_by,
            paid_by: Vec::new(),
            ..item.clone()
        }));
    }

    let remaining_quantity = item.quantity - used_quantity;
    let consumed = Item {
        id: crate::core::new_id(),
        quantity: used_quantity,
        total_price: item.unit_price * used_quantity,
        status: ItemStatus::Used,
        shared_by,
        paid_by: Vec::new(),
        date_added: now,
        ..item.clone()
    };
    let remainder = Item {
        quantity: remaining_quantity,
        total_price: item.unit_price * remaining_quantity,
        status: ItemStatus::InFridge,
        shared_by: Vec::new(),
        paid_by: Vec::new(),
        ..item.clone()
    };

    Ok(SplitOutcome::Split {
        consumed,
        remainder,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::{item_with, now};

    fn eggs() -> Item {
        let mut item = item_with(10.0, 5.0, &["A"]);
        item.name = "Eggs".into();
        item.unit = "eggs".into();
        item
    }

    #[test]
    fn test_split_four_of_ten_eggs() {
        let item = eggs();
        let outcome = use_quantity(&item, 4.0, vec!["A".into(), "B".into()], now()).unwrap();
        let SplitOutcome::Split {
            consumed,
            remainder,
        } = outcome
        else {
            panic!("expected a split");
        };

        assert_eq!(consumed.quantity, 4.0);
        assert!((consumed.total_price - 2.0).abs() < 1e-9);
        assert_eq!(consumed.status, ItemStatus::Used);
        assert_eq!(consumed.shared_by, vec!["A", "B"]);
        assert!(consumed.paid_by.is_empty());
        assert_ne!(consumed.id, item.id);
        assert_eq!(consumed.name, "Eggs");

        assert_eq!(remainder.id, item.id);
        assert_eq!(remainder.date_added, item.date_added);
        assert_eq!(remainder.quantity, 6.0);
        assert!((remainder.total_price - 3.0).abs() < 1e-9);
        assert_eq!(remainder.status, ItemStatus::InFridge);
        assert!(remainder.shared_by.is_empty());
        assert!(remainder.paid_by.is_empty());
    }

    #[test]
    fn test_split_preserves_totals() {
        let item = item_with(7.0, 9.99, &[]);
        for used in [0.5, 1.0, 3.3, 6.99] {
            let outcome = use_quantity(&item, used, vec!["A".into()], now()).unwrap();
            let SplitOutcome::Split {
                consumed,
                remainder,
            } = outcome
            else {
                panic!("expected a split for {used}");
            };
            assert!((consumed.total_price + remainder.total_price - item.total_price).abs() < 1e-9);
            assert!((consumed.quantity + remainder.quantity - item.quantity).abs() < 1e-9);
        }
    }

    #[test]
    fn test_using_everything_yields_one_record() {
        let item = eggs();
        for used in [10.0, 12.0] {
            let outcome = use_quantity(&item, used, vec!["B".into()], now()).unwrap();
            assert_eq!(outcome.records().len(), 1);
            let SplitOutcome::FullyUsed(used_item) = outcome else {
                panic!("expected full use");
            };
            assert_eq!(used_item.id, item.id);
            assert_eq!(used_item.status, ItemStatus::Used);
            assert_eq!(used_item.quantity, 10.0);
            assert_eq!(used_item.shared_by, vec!["B"]);
        }
    }

    #[test]
    fn test_full_use_starts_unpaid() {
        let mut item = eggs();
        item.shared_by = vec!["A".into(), "B".into()];
        item.paid_by = vec!["A".into()];

        let outcome = use_quantity(&item, 10.0, vec!["A".into(), "B".into()], now()).unwrap();
        let SplitOutcome::FullyUsed(used_item) = outcome else {
            panic!("expected full use");
        };
        assert_eq!(used_item.shared_by, vec!["A", "B"]);
        assert!(used_item.paid_by.is_empty());
    }

    #[test]
    fn test_non_positive_quantity_is_rejected() {
        let item = eggs();
        for used in [0.0, -2.0, f64::NAN] {
            assert!(matches!(
                use_quantity(&item, used, vec![], now()),
                Err(Error::InvalidQuantity { .. })
            ));
        }
    }

    #[test]
    fn test_used_items_cannot_be_split() {
        let item = eggs().with_status(ItemStatus::Used);
        assert!(matches!(
            use_quantity(&item, 1.0, vec![], now()),
            Err(Error::InvalidTransition { .. })
        ));
    }
}

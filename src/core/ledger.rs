//! Ledger engine - who owes how much for consumed groceries.
//!
//! Pure functions over a snapshot of items and members. Only `Used` items carry
//! debt; each sharer owes `total_price / shared_by.len()` until they appear in
//! `paid_by`. Rounding dust from uneven splits is left as is.

use std::collections::BTreeMap;

use crate::core::{Item, ItemStatus, Member};

/// One unpaid share belonging to the viewing member.
#[derive(Debug, Clone, PartialEq)]
pub struct UnpaidShare {
    /// The consumed item
    pub item: Item,
    /// The viewer's share of it
    pub amount: f64,
}

/// Outstanding balances for a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balances {
    /// Unpaid total per known member (every member present, zero if nothing owed)
    pub per_member_owed: BTreeMap<String, f64>,
    /// The viewer's unpaid shares, in item order
    pub viewer_unpaid: Vec<UnpaidShare>,
}

impl Balances {
    /// Amount a member still owes; unknown members owe nothing.
    #[must_use]
    pub fn owed_by(&self, member_id: &str) -> f64 {
        self.per_member_owed.get(member_id).copied().unwrap_or(0.0)
    }

    /// Sum of everything still owed by everyone.
    #[must_use]
    pub fn total_outstanding(&self) -> f64 {
        self.per_member_owed.values().sum()
    }

    /// Balances in roster order, for display.
    #[must_use]
    pub fn in_roster_order<'a>(&self, members: &'a [Member]) -> Vec<(&'a Member, f64)> {
        members.iter().map(|m| (m, self.owed_by(&m.id))).collect()
    }
}

/// Computes per-member outstanding debt and the viewer's unpaid breakdown.
///
/// Ids in `shared_by` that are not in `members` are skipped for the per-member
/// totals. Iteration order is items then `shared_by`, so repeated runs over the
/// same input give bit-identical sums.
#[must_use]
pub fn compute_balances(items: &[Item], members: &[Member], viewer_id: &str) -> Balances {
    let mut balances = Balances {
        per_member_owed: members.iter().map(|m| (m.id.clone(), 0.0)).collect(),
        viewer_unpaid: Vec::new(),
    };

    for item in items.iter().filter(|i| i.status == ItemStatus::Used) {
        let Some(share) = item.share() else {
            continue;
        };
        for member_id in &item.shared_by {
            if item.paid_by.contains(member_id) {
                continue;
            }
            if let Some(total) = balances.per_member_owed.get_mut(member_id) {
                *total += share;
            }
            if member_id == viewer_id {
                balances.viewer_unpaid.push(UnpaidShare {
                    item: item.clone(),
                    amount: share,
                });
            }
        }
    }

    balances
}

/// Headline numbers for the household dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    /// Value of everything still in the fridge
    pub fridge_value: f64,
    /// Number of fridge items
    pub fridge_count: usize,
    /// Everything still owed by anyone
    pub total_outstanding: f64,
    /// What the viewer still owes
    pub viewer_debt: f64,
    /// Total cost of consumed items
    pub total_spent: f64,
    /// Member with the largest consumed share, paid or not
    pub top_consumer: Option<String>,
}

/// Aggregates fridge, debt and consumption figures for one viewer.
#[must_use]
pub fn dashboard_stats(items: &[Item], members: &[Member], viewer_id: &str) -> DashboardStats {
    let balances = compute_balances(items, members, viewer_id);

    let fridge: Vec<&Item> = items
        .iter()
        .filter(|i| i.status == ItemStatus::InFridge)
        .collect();

    let mut consumed: Vec<f64> = vec![0.0; members.len()];
    let mut total_spent = 0.0;
    for item in items.iter().filter(|i| i.status == ItemStatus::Used) {
        total_spent += item.total_price;
        let Some(share) = item.share() else {
            continue;
        };
        for member_id in &item.shared_by {
            if let Some(idx) = members.iter().position(|m| &m.id == member_id) {
                consumed[idx] += share;
            }
        }
    }

    let mut top_consumer: Option<(usize, f64)> = None;
    for (idx, amount) in consumed.iter().copied().enumerate() {
        if amount > 0.0 && top_consumer.is_none_or(|(_, best)| amount > best) {
            top_consumer = Some((idx, amount));
        }
    }

    DashboardStats {
        fridge_value: fridge.iter().map(|i| i.total_price).sum(),
        fridge_count: fridge.len(),
        total_outstanding: balances.total_outstanding(),
        viewer_debt: balances.owed_by(viewer_id),
        total_spent,
        top_consumer: top_consumer.map(|(idx, _)| members[idx].id.clone()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::{item_with, member, used_item};

    fn ab() -> Vec<Member> {
        vec![member("A"), member("B")]
    }

    #[test]
    fn test_two_members_split_evenly() {
        let members = ab();
        let item = used_item(10.0, &["A", "B"]);
        let balances = compute_balances(std::slice::from_ref(&item), &members, "A");
        assert_eq!(balances.owed_by("A"), 5.0);
        assert_eq!(balances.owed_by("B"), 5.0);
        assert_eq!(balances.viewer_unpaid.len(), 1);
        assert_eq!(balances.viewer_unpaid[0].amount, 5.0);

        let paid = item.with_share_paid("A", true).unwrap();
        let balances = compute_balances(&[paid], &members, "A");
        assert_eq!(balances.owed_by("A"), 0.0);
        assert_eq!(balances.owed_by("B"), 5.0);
        assert!(balances.viewer_unpaid.is_empty());
    }

    #[test]
    fn test_fridge_items_and_unshared_items_carry_no_debt() {
        let members = ab();
        let fridge = item_with(1.0, 8.0, &["A", "B"]);
        let orphan = used_item(7.0, &[]);
        let balances = compute_balances(&[fridge, orphan], &members, "A");
        assert_eq!(balances.total_outstanding(), 0.0);
        assert_eq!(balances.per_member_owed.len(), 2);
    }

    #[test]
    fn test_total_matches_prices_minus_dust() {
        let members = vec![member("A"), member("B"), member("C")];
        let items = vec![
            used_item(10.0, &["A", "B", "C"]),
            used_item(4.5, &["A", "C"]),
            used_item(0.99, &["B"]),
        ];
        let balances = compute_balances(&items, &members, "A");
        let expected: f64 = items.iter().map(|i| i.total_price).sum();
        assert!((balances.total_outstanding() - expected).abs() < 1e-9);

        let settled: Vec<Item> = items.iter().map(|i| i.settled().unwrap()).collect();
        let balances = compute_balances(&settled, &members, "A");
        assert_eq!(balances.total_outstanding(), 0.0);
    }

    #[test]
    fn test_unknown_member_ids_are_skipped() {
        let members = ab();
        let item = used_item(9.0, &["A", "ghost", "B"]);
        let balances = compute_balances(&[item], &members, "A");
        assert_eq!(balances.owed_by("A"), 3.0);
        assert_eq!(balances.owed_by("B"), 3.0);
        assert!(!balances.per_member_owed.contains_key("ghost"));
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let members = vec![member("A"), member("B"), member("C")];
        let items = vec![used_item(1.0, &["A", "B", "C"]), used_item(2.0 / 3.0, &["C", "A"])];
        let first = compute_balances(&items, &members, "C");
        let second = compute_balances(&items, &members, "C");
        assert_eq!(first, second);
    }

    #[test]
    fn test_roster_order() {
        let members = vec![member("B"), member("A")];
        let balances = compute_balances(&[used_item(4.0, &["A"])], &members, "A");
        let ordered = balances.in_roster_order(&members);
        assert_eq!(ordered[0].0.id, "B");
        assert_eq!(ordered[1].1, 4.0);
    }

    #[test]
    fn test_dashboard_stats() {
        let members = ab();
        let mut paid = used_item(6.0, &["A", "B"]);
        paid.paid_by = vec!["A".into(), "B".into()];
        let items = vec![
            item_with(2.0, 3.0, &[]),
            item_with(1.0, 1.5, &["A"]),
            used_item(10.0, &["A", "B"]),
            used_item(4.0, &["B"]),
            paid,
        ];
        let stats = dashboard_stats(&items, &members, "A");
        assert_eq!(stats.fridge_count, 2);
        assert_eq!(stats.fridge_value, 4.5);
        assert_eq!(stats.total_outstanding, 14.0);
        assert_eq!(stats.viewer_debt, 5.0);
        assert_eq!(stats.total_spent, 20.0);
        assert_eq!(stats.top_consumer.as_deref(), Some("B"));
    }

    #[test]
    fn test_dashboard_without_consumption_has_no_top_consumer() {
        let stats = dashboard_stats(&[item_with(1.0, 2.0, &["A"])], &ab(), "A");
        assert!(stats.top_consumer.is_none());
        assert_eq!(stats.viewer_debt, 0.0);
    }
}

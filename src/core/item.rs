//! Grocery item records and their status state machine.
//!
//! Every constructor and mutation in this module returns a new `Item` with
//! `unit_price` recomputed from `total_price / quantity`, so the stored value is
//! never stale. `paid_by` is kept a subset of `shared_by` at every mutation site.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Where an item is in its life: still stocked, or consumed and billable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Bought and still in the fridge; not debt-eligible
    #[serde(rename = "FRIDGE")]
    InFridge,
    /// Consumed; the cost is split across `shared_by`
    #[serde(rename = "USED")]
    Used,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InFridge => write!(f, "FRIDGE"),
            Self::Used => write!(f, "USED"),
        }
    }
}

/// A purchased grocery record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique id (random, see [`crate::core::new_id`])
    pub id: String,
    /// Free-text label
    pub name: String,
    /// Positive amount in `unit`
    pub quantity: f64,
    /// Unit label such as "kg" or "pcs"
    pub unit: String,
    /// Cost of the full recorded quantity
    pub total_price: f64,
    /// `total_price / quantity`
    pub unit_price: f64,
    /// Fridge or used
    pub status: ItemStatus,
    /// Members responsible for the cost, in display order
    pub shared_by: Vec<String>,
    /// Members of `shared_by` who have settled their share
    #[serde(default)]
    pub paid_by: Vec<String>,
    /// When this record was created
    pub date_added: DateTime<Utc>,
}

/// Input for a freshly entered item (manual form or assistant draft).
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    /// Item name; must not be blank
    pub name: String,
    /// Missing or non-positive quantities default to 1
    pub quantity: Option<f64>,
    /// Defaults to `pcs`
    pub unit: Option<String>,
    /// Required, finite and non-negative
    pub total_price: Option<f64>,
    /// Members sharing the cost
    pub shared_by: Vec<String>,
}

/// Field changes from the edit form.
#[derive(Debug, Clone)]
pub struct ItemEdit {
    /// New name
    pub name: String,
    /// New quantity; must be positive
    pub quantity: f64,
    /// New unit label
    pub unit: String,
    /// New total price
    pub total_price: f64,
    /// New sharing set
    pub shared_by: Vec<String>,
}

pub(crate) fn validate_quantity(quantity: f64) -> Result<f64> {
    if quantity.is_finite() && quantity > 0.0 {
        Ok(quantity)
    } else {
        Err(Error::InvalidQuantity { quantity })
    }
}

pub(crate) fn validate_price(price: f64) -> Result<f64> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(Error::InvalidPrice { price })
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::EmptyName);
    }
    Ok(name.to_string())
}

/// Removes repeated ids while keeping first-seen order.
pub(crate) fn dedupe_ids(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

impl Item {
    /// Validates a new entry and builds an `InFridge` item with a fresh id.
    pub fn create(new: NewItem, now: DateTime<Utc>) -> Result<Self> {
        let name = validate_name(&new.name)?;
        let total_price = validate_price(new.total_price.ok_or(Error::InvalidPrice {
            price: f64::NAN,
        })?)?;
        let quantity = match new.quantity {
            Some(q) if q.is_finite() && q > 0.0 => q,
            _ => 1.0,
        };
        let unit = new
            .unit
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "pcs".to_string());

        Ok(Self {
            id: crate::core::new_id(),
            name,
            quantity,
            unit,
            total_price,
            unit_price: total_price / quantity,
            status: ItemStatus::InFridge,
            shared_by: dedupe_ids(new.shared_by),
            paid_by: Vec::new(),
            date_added: now,
        })
    }

    /// One member's share, or `None` when nobody shares the item.
    #[must_use]
    pub fn share(&self) -> Option<f64> {
        if self.shared_by.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = self.shared_by.len() as f64;
        Some(self.total_price / count)
    }

    /// Whether `member_id` shares this item and has not paid yet.
    #[must_use]
    pub fn owes(&self, member_id: &str) -> bool {
        self.shared_by.iter().any(|id| id == member_id)
            && !self.paid_by.iter().any(|id| id == member_id)
    }

    /// Applies a plain status change.
    ///
    /// Returning an item to the fridge clears `shared_by` and `paid_by` so no stale
    /// debt survives. Setting the current status again is a no-op.
    #[must_use]
    pub fn with_status(&self, status: ItemStatus) -> Self {
        let mut next = self.clone();
        match (self.status, status) {
            (ItemStatus::Used, ItemStatus::InFridge) => {
                next.status = ItemStatus::InFridge;
                next.shared_by.clear();
                next.paid_by.clear();
            }
            (ItemStatus::InFridge, ItemStatus::Used) => next.status = ItemStatus::Used,
            _ => {}
        }
        next
    }

    /// Applies an edit, keeping id, status and `date_added`.
    pub fn edited(&self, edit: ItemEdit) -> Result<Self> {
        let name = validate_name(&edit.name)?;
        let quantity = validate_quantity(edit.quantity)?;
        let total_price = validate_price(edit.total_price)?;
        let shared_by = dedupe_ids(edit.shared_by);
        let paid_by = self
            .paid_by
            .iter()
            .filter(|id| shared_by.contains(id))
            .cloned()
            .collect();

        Ok(Self {
            id: self.id.clone(),
            name,
            quantity,
            unit: edit.unit.trim().to_string(),
            total_price,
            unit_price: total_price / quantity,
            status: self.status,
            shared_by,
            paid_by,
            date_added: self.date_added,
        })
    }

    /// Marks or unmarks one member's share as paid.
    ///
    /// Marking is idempotent. Members outside `shared_by` cannot be marked paid.
    pub fn with_share_paid(&self, member_id: &str, paid: bool) -> Result<Self> {
        if paid && !self.shared_by.iter().any(|id| id == member_id) {
            return Err(Error::NotSharing {
                item_id: self.id.clone(),
                member_id: member_id.to_string(),
            });
        }
        let mut next = self.clone();
        next.paid_by = toggle_paid(&self.paid_by, member_id, paid);
        Ok(next)
    }

    /// Marks every sharer as paid, if this item carries any debt at all.
    #[must_use]
    pub fn settled(&self) -> Option<Self> {
        if self.status != ItemStatus::Used || self.shared_by.is_empty() {
            return None;
        }
        let mut next = self.clone();
        next.paid_by = self.shared_by.clone();
        Some(next)
    }
}

/// Adds or removes `member_id` in a `paid_by` list.
///
/// Shared between the local path and the remote read-modify-write path.
#[must_use]
pub fn toggle_paid(paid_by: &[String], member_id: &str, paid: bool) -> Vec<String> {
    let mut out: Vec<String> = paid_by.iter().filter(|id| *id != member_id).cloned().collect();
    if paid {
        if paid_by.iter().any(|id| id == member_id) {
            return paid_by.to_vec();
        }
        out.push(member_id.to_string());
    }
    out
}

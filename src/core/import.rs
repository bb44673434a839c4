//! Turning assistant output into fridge items.
//!
//! The assistant is untrusted: any field may be missing or mistyped, member
//! names may not match, and the reply may wrap its JSON in prose or code fences.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::core::item::dedupe_ids;
use crate::core::member::find_id_by_name;
use crate::core::{Item, ItemStatus, Member};

static FENCED_JSON: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").ok());
static BARE_ARRAY: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[[\s\S]*\]").ok());

/// One candidate item as proposed by the assistant.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemDraft {
    /// Item name
    pub name: Option<String>,
    /// Quantity, defaults to 1
    #[serde(deserialize_with = "lenient_number")]
    pub quantity: Option<f64>,
    /// Unit, defaults to "pcs"
    pub unit: Option<String>,
    /// Price, defaults to 0
    #[serde(deserialize_with = "lenient_number")]
    pub total_price: Option<f64>,
    /// Member display names
    pub shared_by: Option<Vec<String>>,
}

fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().trim_start_matches('$').parse().ok(),
        _ => None,
    })
}

/// Pulls the JSON array out of a free-form assistant reply.
///
/// A fenced code block wins; otherwise the widest `[...]` span; otherwise the
/// whole reply is returned for the JSON parser to judge.
#[must_use]
pub fn extract_json_array(reply: &str) -> &str {
    if let Some(inner) = FENCED_JSON
        .as_ref()
        .and_then(|re| re.captures(reply))
        .and_then(|caps| caps.get(1))
    {
        return inner.as_str().trim();
    }
    if let Some(array) = BARE_ARRAY.as_ref().and_then(|re| re.find(reply)) {
        return array.as_str();
    }
    reply.trim()
}

/// Parses drafts from an assistant reply. Anything unparsable yields no drafts.
#[must_use]
pub fn parse_drafts(reply: &str) -> Vec<ItemDraft> {
    let json = extract_json_array(reply);
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Array(values)) => values
            .into_iter()
            .filter_map(|v| serde_json::from_value::<ItemDraft>(v).ok())
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            tracing::warn!("Assistant reply was not a JSON array: {}", e);
            Vec::new()
        }
    }
}

/// Builds fridge items from drafts, resolving member names to ids.
///
/// Names that match nobody are dropped; if none match (or none were given) the
/// item is shared by every member.
#[must_use]
pub fn drafts_to_items(drafts: Vec<ItemDraft>, members: &[Member], now: DateTime<Utc>) -> Vec<Item> {
    let everyone: Vec<String> = members.iter().map(|m| m.id.clone()).collect();

    drafts
        .into_iter()
        .map(|draft| {
            let quantity = draft
                .quantity
                .filter(|q| q.is_finite() && *q > 0.0)
                .unwrap_or(1.0);
            let total_price = draft
                .total_price
                .filter(|p| p.is_finite() && *p >= 0.0)
                .unwrap_or(0.0);
            let matched: Vec<String> = draft
                .shared_by
                .unwrap_or_default()
                .iter()
                .filter_map(|name| find_id_by_name(members, name).map(str::to_string))
                .collect();
            let shared_by = if matched.is_empty() {
                everyone.clone()
            } else {
                dedupe_ids(matched)
            };

            Item {
                id: crate::core::new_id(),
                name: draft
                    .name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "Unknown Item".to_string()),
                quantity,
                unit: draft
                    .unit
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| "pcs".to_string()),
                total_price,
                unit_price: total_price / quantity,
                status: ItemStatus::InFridge,
                shared_by,
                paid_by: Vec::new(),
                date_added: now,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::default_members;
    use crate::test_utils::now;

    #[test]
    fn test_extracts_fenced_json() {
        let reply = "Sure!\n```json\n[{\"name\":\"Milk\"}]\n```\nEnjoy";
        assert_eq!(extract_json_array(reply), "[{\"name\":\"Milk\"}]");
    }

    #[test]
    fn test_extracts_bare_array() {
        let reply = "Here you go: [{\"name\":\"Milk\"}] hope it helps";
        assert_eq!(extract_json_array(reply), "[{\"name\":\"Milk\"}]");
    }

    #[test]
    fn test_garbage_parses_to_nothing() {
        assert!(parse_drafts("I could not find any groceries.").is_empty());
        assert!(parse_drafts("{\"name\":\"Milk\"}").is_empty());
    }

    #[test]
    fn test_lenient_numbers() {
        let drafts = parse_drafts(r#"[{"name":"Rice","quantity":"2","totalPrice":"$3.50"}]"#);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].quantity, Some(2.0));
        assert_eq!(drafts[0].total_price, Some(3.5));
    }

    #[test]
    fn test_defaults_and_member_fallback() {
        let members = default_members();
        let drafts = parse_drafts(r#"[{"sharedBy":["Nobody"]},{"name":"Milk","quantity":2,"unit":"l","totalPrice":3,"sharedBy":["alice","BOB","Zed"]}]"#);
        let items = drafts_to_items(drafts, &members, now());
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].name, "Unknown Item");
        assert_eq!(items[0].quantity, 1.0);
        assert_eq!(items[0].unit, "pcs");
        assert_eq!(items[0].total_price, 0.0);
        assert_eq!(items[0].shared_by, vec!["u1", "u2", "u3", "u4"]);

        assert_eq!(items[1].shared_by, vec!["u2", "u3"]);
        assert_eq!(items[1].unit_price, 1.5);
        assert_eq!(items[1].status, ItemStatus::InFridge);
        assert_ne!(items[0].id, items[1].id);
    }
}

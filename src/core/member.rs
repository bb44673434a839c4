//! Household members who share grocery costs.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// A household member.
///
/// `color_tag` is a presentation token that the ledger passes through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Stable identifier, never changed after creation
    pub id: String,
    /// Display name
    pub name: String,
    /// Visual-only tag such as a colour class
    #[serde(alias = "avatarColor", default)]
    pub color_tag: String,
}

impl Member {
    /// Creates a member with a fresh random id.
    pub fn new(name: &str, color_tag: &str) -> Result<Self> {
        Self::with_id(crate::core::new_id(), name, color_tag)
    }

    /// Creates a member with a caller-chosen id (used for seeding).
    pub fn with_id(id: String, name: &str, color_tag: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        Ok(Self {
            id,
            name: name.to_string(),
            color_tag: color_tag.to_string(),
        })
    }

    /// Renames the member and updates its tag, keeping the id.
    pub fn edit(&self, name: &str, color_tag: &str) -> Result<Self> {
        Self::with_id(self.id.clone(), name, color_tag)
    }
}

/// The roster used when no members have ever been stored.
#[must_use]
pub fn default_members() -> Vec<Member> {
    [
        ("u1", "Me", "bg-blue-600"),
        ("u2", "Alice", "bg-purple-600"),
        ("u3", "Bob", "bg-green-600"),
        ("u4", "Charlie", "bg-yellow-500"),
    ]
    .into_iter()
    .map(|(id, name, color_tag)| Member {
        id: id.to_string(),
        name: name.to_string(),
        color_tag: color_tag.to_string(),
    })
    .collect()
}

/// Looks up a member id by display name, ignoring case.
#[must_use]
pub fn find_id_by_name<'a>(members: &'a [Member], name: &str) -> Option<&'a str> {
    let wanted = name.trim().to_lowercase();
    members
        .iter()
        .find(|m| m.name.to_lowercase() == wanted)
        .map(|m| m.id.as_str())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_new_member_rejects_blank_name() {
        assert!(matches!(Member::new("   ", "x"), Err(Error::EmptyName)));
    }

    #[test]
    fn test_edit_preserves_id() {
        let m = Member::new("Dana", "bg-red-500").unwrap();
        let edited = m.edit(" Dana K ", "bg-pink-500").unwrap();
        assert_eq!(edited.id, m.id);
        assert_eq!(edited.name, "Dana K");
        assert_eq!(edited.color_tag, "bg-pink-500");
    }

    #[test]
    fn test_default_roster() {
        let members = default_members();
        assert_eq!(members.len(), 4);
        assert_eq!(members[0].id, "u1");
        assert_eq!(members[3].name, "Charlie");
    }

    #[test]
    fn test_find_id_by_name_is_case_insensitive() {
        let members = default_members();
        assert_eq!(find_id_by_name(&members, "alice"), Some("u2"));
        assert_eq!(find_id_by_name(&members, "Zed"), None);
    }

    #[test]
    fn test_deserializes_legacy_avatar_color() {
        let m: Member =
            serde_json::from_str(r#"{"id":"u9","name":"Eve","avatarColor":"bg-black"}"#).unwrap();
        assert_eq!(m.color_tag, "bg-black");
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["colorTag"], "bg-black");
    }
}

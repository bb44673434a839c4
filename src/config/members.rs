//! Seed member roster loading from config.toml
//!
//! The members listed here are written to the store the first time the member
//! collection is found empty. Without a config file the built-in roster is used.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::core::{Member, default_members};
use crate::errors::{Error, Result};

/// Configuration structure representing the member section of config.toml
#[derive(Debug, Deserialize, Default)]
pub struct MembersFile {
    /// Members to seed
    #[serde(default)]
    pub members: Vec<MemberConfig>,
}

/// Configuration for a single seed member
#[derive(Debug, Deserialize, Clone)]
pub struct MemberConfig {
    /// Stable id
    pub id: String,
    /// Display name
    pub name: String,
    /// Presentation tag
    #[serde(default)]
    pub color_tag: String,
}

/// Parses a members file from TOML text into validated members.
pub fn parse_members(contents: &str) -> Result<Vec<Member>> {
    let file: MembersFile = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse members config: {e}"),
    })?;
    file.members
        .into_iter()
        .map(|m| Member::with_id(m.id, &m.name, &m.color_tag))
        .collect()
}

/// Loads the seed roster from `path`.
///
/// A missing file or an empty `[[members]]` list falls back to the built-in
/// four-member roster. Unreadable or malformed files are errors.
pub fn load_seed_members<P: AsRef<Path>>(path: P) -> Result<Vec<Member>> {
    let path = path.as_ref();
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No members config at {:?}, using built-in roster", path);
            return Ok(default_members());
        }
        Err(e) => {
            return Err(Error::Config {
                message: format!("Failed to read config file {path:?}: {e}"),
            });
        }
    };

    let members = parse_members(&contents)?;
    if members.is_empty() {
        return Ok(default_members());
    }
    info!("Loaded {} seed members from {:?}", members.len(), path);
    Ok(members)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_members_config() {
        let toml_str = r#"
            [[members]]
            id = "m1"
            name = "Sam"
            color_tag = "bg-red-500"

            [[members]]
            id = "m2"
            name = "Kai"
        "#;

        let members = parse_members(toml_str).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id, "m1");
        assert_eq!(members[0].color_tag, "bg-red-500");
        assert_eq!(members[1].name, "Kai");
        assert!(members[1].color_tag.is_empty());
    }

    #[test]
    fn test_blank_member_name_is_rejected() {
        let toml_str = r#"
            [[members]]
            id = "m1"
            name = "  "
        "#;
        assert!(matches!(parse_members(toml_str), Err(Error::EmptyName)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let members = load_seed_members("definitely/not/here.toml").unwrap();
        assert_eq!(members, default_members());
    }

    #[test]
    fn test_file_without_members_uses_defaults() {
        let dir = std::env::temp_dir().join(format!("grocesplit-test-{}", crate::core::new_id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "# nothing here\n").unwrap();

        let members = load_seed_members(&path).unwrap();
        assert_eq!(members.len(), 4);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

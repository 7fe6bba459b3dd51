//! Ordered configuration run-list.

use serde::{Deserialize, Serialize};
use vaultstrap_shared::errors::ConfigError;

/// Ordered set of `role[...]` / `recipe[...]` entries.
///
/// Order is preserved and duplicates are dropped at their second occurrence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunList(Vec<String>);

impl RunList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma and/or whitespace separated list.
    ///
    /// Bare names are treated as recipes: `nginx` becomes `recipe[nginx]`.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let mut list = RunList::new();
        for raw in input.split(|c: char| c == ',' || c.is_whitespace()) {
            if raw.is_empty() {
                continue;
            }
            list.push(raw)?;
        }
        Ok(list)
    }

    /// Append an entry. Returns `false` if it was already present.
    pub fn push(&mut self, entry: &str) -> Result<bool, ConfigError> {
        let entry = normalize(entry)?;
        if self.0.contains(&entry) {
            return Ok(false);
        }
        self.0.push(entry);
        Ok(true)
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Display for RunList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

impl std::str::FromStr for RunList {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn normalize(entry: &str) -> Result<String, ConfigError> {
    let entry = entry.trim();

    for kind in ["role", "recipe"] {
        if let Some(rest) = entry.strip_prefix(kind) {
            if let Some(name) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                validate_name(entry, name)?;
                return Ok(entry.to_string());
            }
            if rest.starts_with('[') {
                return Err(ConfigError::invalid(
                    "run_list",
                    format!("unterminated entry '{}'", entry),
                ));
            }
        }
    }

    if entry.contains('[') || entry.contains(']') {
        return Err(ConfigError::invalid(
            "run_list",
            format!("'{}' is neither role[...] nor recipe[...]", entry),
        ));
    }

    validate_name(entry, entry)?;
    Ok(format!("recipe[{}]", entry))
}

fn validate_name(entry: &str, name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '@'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            "run_list",
            format!("invalid entry '{}'", entry),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_mixed_separators() {
        let list = RunList::parse("role[base], recipe[nginx]  role[web]").unwrap();
        assert_eq!(
            list.entries(),
            &["role[base]", "recipe[nginx]", "role[web]"]
        );
    }

    #[test]
    fn test_bare_names_become_recipes() {
        let list = RunList::parse("nginx,apt::default").unwrap();
        assert_eq!(list.entries(), &["recipe[nginx]", "recipe[apt::default]"]);
    }

    #[test]
    fn test_duplicates_dropped() {
        let list = RunList::parse("role[base],recipe[a],role[base],a").unwrap();
        assert_eq!(list.entries(), &["role[base]", "recipe[a]"]);
    }

    #[test]
    fn test_invalid_entries() {
        assert!(RunList::parse("role[]").is_err());
        assert!(RunList::parse("role[base").is_err());
        assert!(RunList::parse("thing[x]").is_err());
        assert!(RunList::parse("recipe[a b]").is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(RunList::parse("").unwrap().is_empty());
        assert!(RunList::parse(" , ,").unwrap().is_empty());
    }

    #[test]
    fn test_serde_transparent() {
        let list = RunList::parse("role[base]").unwrap();
        assert_eq!(serde_json::to_string(&list).unwrap(), r#"["role[base]"]"#);
    }

    proptest! {
        #[test]
        fn prop_parse_preserves_first_occurrence_order(
            names in proptest::collection::vec("[a-z][a-z0-9_]{0,6}", 0..12)
        ) {
            let input = names
                .iter()
                .map(|n| format!("role[{}]", n))
                .collect::<Vec<_>>()
                .join(",");
            let list = RunList::parse(&input).unwrap();

            let mut expected: Vec<String> = Vec::new();
            for name in &names {
                let entry = format!("role[{}]", name);
                if !expected.contains(&entry) {
                    expected.push(entry);
                }
            }
            prop_assert_eq!(list.entries(), expected.as_slice());
        }
    }
}

//! Equality-based label and field selectors.
//!
//! Grammar (comma separated requirements):
//! - `key=value` / `key==value` -- key present with that value
//! - `key!=value` -- key absent or with a different value
//! - `key` -- key present
//! - `!key` -- key absent

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;

/// Label set of an object.
pub type Labels = BTreeMap<String, String>;

/// Selectable fields of an object, e.g. `metadata.name`.
pub type Fields = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    pub fn matches(&self, set: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Equals(k, v) => set.get(k) == Some(v),
            Self::NotEquals(k, v) => set.get(k) != Some(v),
            Self::Exists(k) => set.contains_key(k),
            Self::DoesNotExist(k) => !set.contains_key(k),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(k, v) => write!(f, "{k}={v}"),
            Self::NotEquals(k, v) => write!(f, "{k}!={v}"),
            Self::Exists(k) => write!(f, "{k}"),
            Self::DoesNotExist(k) => write!(f, "!{k}"),
        }
    }
}

/// A conjunction of requirements. The empty selector matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Selector matching every set.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Selector requiring every pair of `set` to be present.
    pub fn from_set(set: &BTreeMap<String, String>) -> Self {
        Self {
            requirements: set
                .iter()
                .map(|(k, v)| Requirement::Equals(k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn with(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, set: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(set))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{r}")?;
        }
        Ok(())
    }
}

impl FromStr for Selector {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TypeError::InvalidSelector {
            selector: s.to_string(),
            reason: reason.to_string(),
        };

        let mut requirements = Vec::new();
        for term in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let req = if let Some((k, v)) = term.split_once("!=") {
                Requirement::NotEquals(k.trim().to_string(), v.trim().to_string())
            } else if let Some((k, v)) = term.split_once("==") {
                Requirement::Equals(k.trim().to_string(), v.trim().to_string())
            } else if let Some((k, v)) = term.split_once('=') {
                Requirement::Equals(k.trim().to_string(), v.trim().to_string())
            } else if let Some(k) = term.strip_prefix('!') {
                Requirement::DoesNotExist(k.trim().to_string())
            } else {
                Requirement::Exists(term.to_string())
            };

            let key = match &req {
                Requirement::Equals(k, _)
                | Requirement::NotEquals(k, _)
                | Requirement::Exists(k)
                | Requirement::DoesNotExist(k) => k,
            };
            if key.is_empty() {
                return Err(invalid("empty key"));
            }
            if key.contains(['=', '!', ' ']) {
                return Err(invalid("malformed key"));
            }
            requirements.push(req);
        }
        Ok(Self { requirements })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_all_operators() {
        let sel: Selector = "app=web, tier==front,env!=prod,owner,!legacy".parse().unwrap();
        assert_eq!(
            sel.requirements(),
            &[
                Requirement::Equals("app".into(), "web".into()),
                Requirement::Equals("tier".into(), "front".into()),
                Requirement::NotEquals("env".into(), "prod".into()),
                Requirement::Exists("owner".into()),
                Requirement::DoesNotExist("legacy".into()),
            ]
        );
    }

    #[test]
    fn matching() {
        let sel: Selector = "app=web,!legacy".parse().unwrap();
        assert!(sel.matches(&labels(&[("app", "web")])));
        assert!(!sel.matches(&labels(&[("app", "db")])));
        assert!(!sel.matches(&labels(&[("app", "web"), ("legacy", "1")])));
    }

    #[test]
    fn not_equals_matches_missing_key() {
        let sel: Selector = "env!=prod".parse().unwrap();
        assert!(sel.matches(&Labels::new()));
    }

    #[test]
    fn rejects_empty_keys() {
        assert!("=value".parse::<Selector>().is_err());
        assert!("!".parse::<Selector>().is_err());
    }

    #[test]
    fn empty_string_is_everything() {
        let sel: Selector = "".parse().unwrap();
        assert!(sel.is_empty());
        assert_eq!(sel, Selector::everything());
    }

    #[test]
    fn from_set_requires_all_pairs() {
        let set = labels(&[("a", "1"), ("b", "2")]);
        let sel = Selector::from_set(&set);
        assert!(sel.matches(&set));
        assert!(!sel.matches(&labels(&[("a", "1")])));
    }

    proptest! {
        #[test]
        fn everything_matches_any_set(pairs in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..8)) {
            prop_assert!(Selector::everything().matches(&pairs));
            prop_assert!(Selector::from_set(&pairs).matches(&pairs));
        }

        #[test]
        fn display_parses_back(key in "[a-z]{1,8}", value in "[a-z0-9]{1,8}") {
            let sel = Selector::everything()
                .with(Requirement::Equals(key.clone(), value.clone()))
                .with(Requirement::NotEquals(value.clone(), key.clone()))
                .with(Requirement::DoesNotExist(key.clone()));
            let parsed: Selector = sel.to_string().parse().unwrap();
            prop_assert_eq!(parsed, sel);
        }
    }
}

//! Closed ontological category enumeration.
//!
//! Oracle output is untrusted: the only way a category string enters the model
//! is through [`Category::parse`], which accepts the eight canonical labels
//! (case-insensitive, with `-`, `_` and spaces treated alike) and nothing else.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Entity,
    Relationship,
    Property,
    Action,
    Measure,
    Modifier,
    TruthValue,
    Operator,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Entity,
        Category::Relationship,
        Category::Property,
        Category::Action,
        Category::Measure,
        Category::Modifier,
        Category::TruthValue,
        Category::Operator,
    ];

    /// Wire name (`truth-value`, `entity`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Entity => "entity",
            Category::Relationship => "relationship",
            Category::Property => "property",
            Category::Action => "action",
            Category::Measure => "measure",
            Category::Modifier => "modifier",
            Category::TruthValue => "truth-value",
            Category::Operator => "operator",
        }
    }

    /// Label used when the category itself is referenced from a domain or range.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Entity => "Entity",
            Category::Relationship => "Relationship",
            Category::Property => "Property",
            Category::Action => "Action",
            Category::Measure => "Measure",
            Category::Modifier => "Modifier",
            Category::TruthValue => "TruthValue",
            Category::Operator => "Operator",
        }
    }

    /// Relational categories are exactly the ones that carry domain and range.
    pub fn is_relational(&self) -> bool {
        matches!(self, Category::Relationship | Category::Action)
    }

    /// Validate an untrusted category string against the closed enumeration.
    pub fn parse(raw: &str) -> Option<Category> {
        let key = category_key(raw);
        if key.is_empty() {
            return None;
        }
        Category::ALL
            .into_iter()
            .find(|c| category_key(c.as_str()) == key || category_key(c.label()) == key)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn category_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' ' | '\t'))
        .flat_map(char::to_lowercase)
        .collect()
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TreeError;

/// Where an inserted subtree lands relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsertPosition {
    /// First child of the anchor (`afterBegin`).
    BeforeFirstChild,
    /// Last child of the anchor (`beforeEnd`); the common case.
    AfterLastChild,
    /// Sibling immediately before the anchor (`beforeBegin`).
    BeforeAnchor,
    /// Sibling immediately after the anchor (`afterEnd`).
    AfterAnchor,
}

impl InsertPosition {
    /// Name used by the remote API's `position` query parameter.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::BeforeFirstChild => "afterBegin",
            Self::AfterLastChild => "beforeEnd",
            Self::BeforeAnchor => "beforeBegin",
            Self::AfterAnchor => "afterEnd",
        }
    }

    /// Child insertions attach under the anchor; the others beside it.
    pub fn is_child_insertion(self) -> bool {
        matches!(self, Self::BeforeFirstChild | Self::AfterLastChild)
    }
}

impl fmt::Display for InsertPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for InsertPosition {
    type Err = TreeError;

    /// Accepts both the wire names and the kebab-case names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "afterBegin" | "before-first-child" => Ok(Self::BeforeFirstChild),
            "beforeEnd" | "after-last-child" => Ok(Self::AfterLastChild),
            "beforeBegin" | "before-anchor" => Ok(Self::BeforeAnchor),
            "afterEnd" | "after-anchor" => Ok(Self::AfterAnchor),
            other => Err(TreeError::InvalidPosition(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_parse_back() {
        for pos in [
            InsertPosition::BeforeFirstChild,
            InsertPosition::AfterLastChild,
            InsertPosition::BeforeAnchor,
            InsertPosition::AfterAnchor,
        ] {
            assert_eq!(pos.as_wire().parse::<InsertPosition>().unwrap(), pos);
        }
    }

    #[test]
    fn test_kebab_names() {
        assert_eq!(
            "after-last-child".parse::<InsertPosition>().unwrap(),
            InsertPosition::AfterLastChild
        );
        let json = serde_json::to_string(&InsertPosition::BeforeAnchor).unwrap();
        assert_eq!(json, "\"before-anchor\"");
    }

    #[test]
    fn test_unknown_position_is_invalid() {
        let err = "sideways".parse::<InsertPosition>().unwrap_err();
        assert_eq!(err.kind_code(), "invalid_position");
    }

    #[test]
    fn test_child_insertion() {
        assert!(InsertPosition::AfterLastChild.is_child_insertion());
        assert!(!InsertPosition::AfterAnchor.is_child_insertion());
    }
}

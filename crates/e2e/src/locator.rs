//! Typed element locators
//!
//! A `Locator` is a pure description of how to find elements on the page.
//! It serializes to the JSON shape the Playwright driver script resolves into
//! a real `page.locator(...)` chain, and renders as a short selector string
//! for logs and recorded actions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute the application uses for test ids
pub const TEST_ID_ATTRIBUTE: &str = "data-test-id";

/// Selector for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// Element carrying `data-test-id="<id>"`
    TestId { id: String },

    /// Raw CSS selector
    Css { selector: String },

    /// Element containing the given text
    Text { text: String },

    /// ARIA role with an optional accessible name
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Elements of `of` that contain `text`
    HasText { of: Box<Locator>, text: String },

    /// The `index`-th element matched by `of`
    Nth { of: Box<Locator>, index: usize },

    /// `child` searched inside `parent`
    Within {
        parent: Box<Locator>,
        child: Box<Locator>,
    },
}

impl Locator {
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId { id: id.into() }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css {
            selector: selector.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    pub fn role_with_name(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    /// Narrow this locator to elements containing `text`
    #[must_use]
    pub fn has_text(self, text: impl Into<String>) -> Self {
        Self::HasText {
            of: Box::new(self),
            text: text.into(),
        }
    }

    #[must_use]
    pub fn nth(self, index: usize) -> Self {
        Self::Nth {
            of: Box::new(self),
            index,
        }
    }

    #[must_use]
    pub fn first(self) -> Self {
        self.nth(0)
    }

    /// Search for `child` inside this locator
    #[must_use]
    pub fn locate(self, child: Locator) -> Self {
        Self::Within {
            parent: Box::new(self),
            child: Box::new(child),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::TestId { id } => write!(f, "[{}=\"{}\"]", TEST_ID_ATTRIBUTE, id),
            Locator::Css { selector } => write!(f, "{}", selector),
            Locator::Text { text } => write!(f, "text=\"{}\"", text),
            Locator::Role { role, name: None } => write!(f, "role={}", role),
            Locator::Role {
                role,
                name: Some(name),
            } => write!(f, "role={}[name=\"{}\"]", role, name),
            Locator::HasText { of, text } => write!(f, "{} >> has-text=\"{}\"", of, text),
            Locator::Nth { of, index } => write!(f, "{} >> nth={}", of, index),
            Locator::Within { parent, child } => write!(f, "{} >> {}", parent, child),
        }
    }
}

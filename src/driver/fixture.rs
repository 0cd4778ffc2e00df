//! Page fixtures
//!
//! A page fixture describes a document for the in-memory driver in YAML:
//! its element tree, what clicking an element or pressing a key changes, and
//! the initial local storage.
//!
//! ```yaml
//! body:
//!   - tag: button
//!     id: go
//!     on_click:
//!       - target: "#status"
//!         action: set_value
//!         value: ready
//!         delay_ms: 100
//!   - tag: input
//!     id: status
//! on_key:
//!   40:
//!     - target: "#menu .item"
//!       action: add_class
//!       class: focused
//! prevent_default: [27]
//! local_storage:
//!   session: abc123
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::common::{Error, Result};

/// A whole document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    /// Elements under the document body
    #[serde(default)]
    pub body: Vec<ElementSpec>,
    /// Changes applied when a key-down with the given code is dispatched
    #[serde(default)]
    pub on_key: HashMap<u32, Vec<Effect>>,
    /// Key codes whose key-down event the page cancels
    #[serde(default)]
    pub prevent_default: Vec<u32>,
    /// Initial local storage content
    #[serde(default)]
    pub local_storage: HashMap<String, String>,
}

impl Page {
    /// Load a page fixture from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a page fixture from YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// One element and its subtree
#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Space separated class tokens
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<ElementSpec>,
    /// Changes applied when this element is activated
    #[serde(default)]
    pub on_click: Vec<Effect>,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            id: None,
            class: None,
            value: None,
            text: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            on_click: Vec::new(),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }
}

/// A change to the document, applied to the first element matching `target`
#[derive(Debug, Clone, Deserialize)]
pub struct Effect {
    /// Selector of the element to change (the parent, for `append`)
    pub target: String,
    #[serde(flatten)]
    pub change: Change,
    /// Apply the change this long after the trigger instead of immediately
    #[serde(default)]
    pub delay_ms: u64,
}

impl Effect {
    pub fn new(target: &str, change: Change) -> Self {
        Self {
            target: target.to_string(),
            change,
            delay_ms: 0,
        }
    }

    pub fn after_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// What an effect does
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Change {
    SetValue { value: String },
    SetText { text: String },
    AddClass { class: String },
    RemoveClass { class: String },
    Append { element: ElementSpec },
    Remove,
}

//! In-memory document driver
//!
//! A small element tree with selector queries, change notifications and
//! scripted reactions (see [`super::fixture`]). It lets scripts be dry-run
//! from the command line and gives the engine a deterministic document to
//! run against in tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

use super::fixture::{Change, Effect, ElementSpec, Page};
use super::selector::{Selector, SelectorTree};
use super::{NodeRef, SubtreeObserver, UiDriver};
use crate::common::{Error, Result};

/// Index of the `body` element every document starts with
const ROOT: usize = 0;

/// Buffered change notifications per observer
const CHANGE_CAPACITY: usize = 64;

#[derive(Debug)]
struct Node {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    value: String,
    text: String,
    attrs: BTreeMap<String, String>,
    parent: Option<usize>,
    children: Vec<usize>,
    attached: bool,
    on_click: Vec<Effect>,
}

impl Node {
    fn from_spec(spec: &ElementSpec, parent: Option<usize>) -> Self {
        Self {
            tag: spec.tag.to_ascii_lowercase(),
            id: spec.id.clone(),
            classes: spec
                .class
                .as_deref()
                .map(|c| c.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            value: spec.value.clone().unwrap_or_default(),
            text: spec.text.clone().unwrap_or_default(),
            attrs: spec.attrs.clone(),
            parent,
            children: Vec::new(),
            attached: true,
            on_click: spec.on_click.clone(),
        }
    }
}

#[derive(Debug)]
struct DocState {
    nodes: Vec<Node>,
    on_key: HashMap<u32, Vec<Effect>>,
    prevent_default: HashSet<u32>,
    local_storage: HashMap<String, String>,
    activations: Vec<NodeRef>,
    key_downs: Vec<u32>,
}

impl DocState {
    fn new() -> Self {
        Self {
            nodes: vec![Node::from_spec(&ElementSpec::new("body"), None)],
            on_key: HashMap::new(),
            prevent_default: HashSet::new(),
            local_storage: HashMap::new(),
            activations: Vec::new(),
            key_downs: Vec::new(),
        }
    }

    fn node(&self, node: NodeRef) -> Result<&Node> {
        self.nodes
            .get(node.0 as usize)
            .filter(|n| n.attached)
            .ok_or(Error::StaleElement(node.0))
    }

    fn node_mut(&mut self, node: NodeRef) -> Result<&mut Node> {
        self.nodes
            .get_mut(node.0 as usize)
            .filter(|n| n.attached)
            .ok_or(Error::StaleElement(node.0))
    }

    fn insert(&mut self, parent: usize, spec: &ElementSpec) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node::from_spec(spec, Some(parent)));
        self.nodes[parent].children.push(index);
        for child in &spec.children {
            self.insert(index, child);
        }
        index
    }

    fn detach(&mut self, index: usize) {
        if let Some(parent) = self.nodes[index].parent.take() {
            self.nodes[parent].children.retain(|&c| c != index);
        }
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            self.nodes[current].attached = false;
            stack.extend(self.nodes[current].children.iter().copied());
        }
    }

    /// Descendants of `from` in document order, excluding `from` itself
    fn descendants(&self, from: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[from].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current].children.iter().rev().copied());
        }
        out
    }

    /// Every attached element in document order, root included
    fn all(&self) -> Vec<usize> {
        let mut out = vec![ROOT];
        out.extend(self.descendants(ROOT));
        out
    }

    fn select_all(&self, selector: &Selector) -> Vec<usize> {
        self.all()
            .into_iter()
            .filter(|&n| selector.matches(n, self))
            .collect()
    }

    fn select_first(&self, selector: &str) -> Result<Option<usize>> {
        let selector = Selector::parse(selector)?;
        Ok(self.all().into_iter().find(|&n| selector.matches(n, self)))
    }

    /// Apply a change immediately; returns whether the document changed
    fn apply(&mut self, effect: &Effect) -> Result<bool> {
        let Some(target) = self.select_first(&effect.target)? else {
            tracing::warn!(target = %effect.target, "Effect target not found, skipping");
            return Ok(false);
        };

        match &effect.change {
            Change::SetValue { value } => self.nodes[target].value = value.clone(),
            Change::SetText { text } => self.nodes[target].text = text.clone(),
            Change::AddClass { class } => {
                let classes = &mut self.nodes[target].classes;
                if !classes.iter().any(|c| c == class) {
                    classes.push(class.clone());
                }
            }
            Change::RemoveClass { class } => {
                self.nodes[target].classes.retain(|c| c != class);
            }
            Change::Append { element } => {
                self.insert(target, element);
            }
            Change::Remove => {
                if target == ROOT {
                    return Err(Error::Driver("cannot remove the document body".to_string()));
                }
                self.detach(target);
            }
        }
        Ok(true)
    }
}

impl SelectorTree for DocState {
    fn tag(&self, node: usize) -> &str {
        &self.nodes[node].tag
    }

    fn id(&self, node: usize) -> Option<&str> {
        self.nodes[node].id.as_deref()
    }

    fn has_class(&self, node: usize, class: &str) -> bool {
        self.nodes[node].classes.iter().any(|c| c == class)
    }

    fn attribute(&self, node: usize, name: &str) -> Option<&str> {
        self.nodes[node].attrs.get(name).map(String::as_str)
    }

    fn parent(&self, node: usize) -> Option<usize> {
        self.nodes[node].parent
    }
}

struct Shared {
    state: Mutex<DocState>,
    changes: broadcast::Sender<()>,
}

/// In-memory document, cheap to clone (clones share the same tree)
#[derive(Clone)]
pub struct MemoryDocument {
    shared: Arc<Shared>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Create a document with an empty body
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DocState::new()),
                changes,
            }),
        }
    }

    /// Build a document from a page fixture
    pub fn from_page(page: &Page) -> Self {
        let doc = Self::new();
        {
            let mut state = doc.lock();
            for spec in &page.body {
                state.insert(ROOT, spec);
            }
            state.on_key = page.on_key.clone();
            state.prevent_default = page.prevent_default.iter().copied().collect();
            state.local_storage = page.local_storage.clone();
        }
        doc
    }

    fn lock(&self) -> MutexGuard<'_, DocState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self) {
        // No observers is fine
        let _ = self.shared.changes.send(());
    }

    /// Append a new element under the first match of `parent`
    pub fn append(&self, parent: &str, spec: &ElementSpec) -> Result<NodeRef> {
        let node = {
            let mut state = self.lock();
            let target = state
                .select_first(parent)?
                .ok_or_else(|| Error::Driver(format!("no element matches {}", parent)))?;
            state.insert(target, spec)
        };
        self.notify();
        Ok(NodeRef(node as u64))
    }

    /// Apply an effect now, or schedule it when it carries a delay
    pub fn apply(&self, effect: &Effect) -> Result<()> {
        if effect.delay_ms > 0 {
            let doc = self.clone();
            let effect = effect.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(effect.delay_ms)).await;
                let immediate = Effect {
                    delay_ms: 0,
                    ..effect
                };
                if let Err(e) = doc.apply(&immediate) {
                    tracing::warn!("Delayed effect failed: {}", e);
                }
            });
            return Ok(());
        }

        let changed = self.lock().apply(effect)?;
        if changed {
            self.notify();
        }
        Ok(())
    }

    fn apply_all(&self, effects: &[Effect]) -> Result<()> {
        for effect in effects {
            self.apply(effect)?;
        }
        Ok(())
    }

    /// First element matching `selector`, without going through the driver
    pub fn find(&self, selector: &str) -> Option<NodeRef> {
        self.lock()
            .select_first(selector)
            .ok()
            .flatten()
            .map(|n| NodeRef(n as u64))
    }

    /// Value of the first element matching `selector`
    pub fn value_of(&self, selector: &str) -> Option<String> {
        let state = self.lock();
        let node = state.select_first(selector).ok().flatten()?;
        Some(state.nodes[node].value.clone())
    }

    /// Elements activated so far, in order
    pub fn activations(&self) -> Vec<NodeRef> {
        self.lock().activations.clone()
    }

    /// Key codes dispatched so far, in order
    pub fn key_downs(&self) -> Vec<u32> {
        self.lock().key_downs.clone()
    }

    /// Number of observers currently connected
    pub fn observer_count(&self) -> usize {
        self.shared.changes.receiver_count()
    }

    /// Current local storage content
    pub fn local_storage(&self) -> HashMap<String, String> {
        self.lock().local_storage.clone()
    }
}

#[async_trait]
impl UiDriver for MemoryDocument {
    async fn query_selector(&self, selector: &str) -> Result<Option<NodeRef>> {
        Ok(self
            .lock()
            .select_first(selector)?
            .map(|n| NodeRef(n as u64)))
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeRef>> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .lock()
            .select_all(&selector)
            .into_iter()
            .map(|n| NodeRef(n as u64))
            .collect())
    }

    fn observe_subtree(&self) -> SubtreeObserver {
        SubtreeObserver::new(self.shared.changes.subscribe())
    }

    async fn dispatch_key_down(&self, code: u32) -> Result<bool> {
        let (effects, accepted) = {
            let mut state = self.lock();
            state.key_downs.push(code);
            let effects = state.on_key.get(&code).cloned().unwrap_or_default();
            (effects, !state.prevent_default.contains(&code))
        };
        self.apply_all(&effects)?;
        Ok(accepted)
    }

    async fn activate(&self, node: NodeRef) -> Result<()> {
        let effects = {
            let mut state = self.lock();
            let effects = state.node(node)?.on_click.clone();
            state.activations.push(node);
            effects
        };
        self.apply_all(&effects)
    }

    async fn set_value(&self, node: NodeRef, text: &str) -> Result<()> {
        self.lock().node_mut(node)?.value = text.to_string();
        self.notify();
        Ok(())
    }

    async fn value(&self, node: NodeRef) -> Result<String> {
        Ok(self.lock().node(node)?.value.clone())
    }

    async fn class_names(&self, node: NodeRef) -> Result<Vec<String>> {
        Ok(self.lock().node(node)?.classes.clone())
    }

    async fn elements_by_tag(&self, node: NodeRef, tag: &str) -> Result<Vec<NodeRef>> {
        let state = self.lock();
        state.node(node)?;
        Ok(state
            .descendants(node.0 as usize)
            .into_iter()
            .filter(|&n| state.nodes[n].tag.eq_ignore_ascii_case(tag))
            .map(|n| NodeRef(n as u64))
            .collect())
    }

    async fn children(&self, node: NodeRef) -> Result<Vec<NodeRef>> {
        Ok(self
            .lock()
            .node(node)?
            .children
            .iter()
            .map(|&n| NodeRef(n as u64))
            .collect())
    }

    async fn parent(&self, node: NodeRef) -> Result<Option<NodeRef>> {
        Ok(self.lock().node(node)?.parent.map(|p| NodeRef(p as u64)))
    }

    async fn text(&self, node: NodeRef) -> Result<String> {
        Ok(self.lock().node(node)?.text.clone())
    }

    async fn attribute(&self, node: NodeRef, name: &str) -> Result<Option<String>> {
        Ok(self.lock().node(node)?.attrs.get(name).cloned())
    }

    async fn clear_local_storage(&self) -> Result<()> {
        self.lock().local_storage.clear();
        Ok(())
    }
}

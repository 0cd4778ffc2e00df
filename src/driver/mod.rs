//! UI driver abstraction
//!
//! The runner never touches a document directly. Everything it needs from the
//! host (element lookup, change notifications, key dispatch and a handful of
//! element operations) goes through [`UiDriver`], so a browser automation
//! backend can be plugged in without touching the engine.

pub mod fixture;
pub mod memory;
pub mod selector;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::common::Result;

pub use fixture::Page;
pub use memory::MemoryDocument;

/// Opaque handle to an element owned by a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(pub u64);

/// Subscription to structural changes of the document
///
/// Every mutation of the document publishes one notification. Dropping the
/// observer disconnects it.
#[derive(Debug)]
pub struct SubtreeObserver {
    rx: broadcast::Receiver<()>,
}

impl SubtreeObserver {
    pub fn new(rx: broadcast::Receiver<()>) -> Self {
        Self { rx }
    }

    /// Wait for the next change
    ///
    /// Returns `false` once the document has gone away and no further change
    /// can arrive. Missed notifications (a lagging observer) still count as a
    /// change, since the caller only re-checks the document.
    pub async fn changed(&mut self) -> bool {
        match self.rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => true,
            Err(RecvError::Closed) => false,
        }
    }
}

/// Capabilities the runner requires from its host document
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// First element matching `selector` in document order
    async fn query_selector(&self, selector: &str) -> Result<Option<NodeRef>>;

    /// Every element matching `selector`, in document order
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeRef>>;

    /// Start observing changes anywhere under the document root
    fn observe_subtree(&self) -> SubtreeObserver;

    /// Dispatch a key-down signal to the document
    ///
    /// Returns `false` when the document refused (cancelled) the event.
    async fn dispatch_key_down(&self, code: u32) -> Result<bool>;

    /// Activate (click) an element
    async fn activate(&self, node: NodeRef) -> Result<()>;

    /// Replace an element's value
    async fn set_value(&self, node: NodeRef, text: &str) -> Result<()>;

    /// Current value of an element
    async fn value(&self, node: NodeRef) -> Result<String>;

    /// Class tokens of an element
    async fn class_names(&self, node: NodeRef) -> Result<Vec<String>>;

    /// Descendants of `node` with the given tag name, in document order
    async fn elements_by_tag(&self, node: NodeRef, tag: &str) -> Result<Vec<NodeRef>>;

    /// Direct children of an element
    async fn children(&self, node: NodeRef) -> Result<Vec<NodeRef>>;

    /// Parent of an element, `None` for the root
    async fn parent(&self, node: NodeRef) -> Result<Option<NodeRef>>;

    /// Text content (label) of an element
    async fn text(&self, node: NodeRef) -> Result<String>;

    /// Attribute value of an element
    async fn attribute(&self, node: NodeRef, name: &str) -> Result<Option<String>>;

    /// Clear any state the document persisted locally
    async fn clear_local_storage(&self) -> Result<()>;
}

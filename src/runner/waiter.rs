//! Element waiting
//!
//! Resolves a selector to a live element, racing document change
//! notifications against a deadline instead of polling.

use std::time::Duration;

use crate::common::{Error, Result};
use crate::driver::{NodeRef, UiDriver};

/// Wait until `selector` matches an element, or fail after `timeout`
///
/// Resolves immediately when the selector already matches. Otherwise the
/// first document change that makes it match wins, unless the timer fires
/// first. Whichever branch loses is dropped, which disconnects the observer
/// or clears the timer.
pub async fn await_element(
    driver: &dyn UiDriver,
    selector: &str,
    timeout: Duration,
) -> Result<NodeRef> {
    // Subscribe before the first check so no change can slip in between
    let mut observer = driver.observe_subtree();

    if let Some(node) = driver.query_selector(selector).await? {
        return Ok(node);
    }

    tracing::debug!(selector, timeout_ms = timeout.as_millis() as u64, "Waiting for element");

    let watch = async {
        loop {
            if !observer.changed().await {
                // Document gone: only the timer can settle the race now
                std::future::pending::<()>().await;
            }
            if let Some(node) = driver.query_selector(selector).await? {
                return Ok::<_, Error>(node);
            }
        }
    };

    tokio::select! {
        biased;
        found = watch => found,
        _ = tokio::time::sleep(timeout) => {
            Err(Error::element_not_found(selector, timeout.as_millis() as u64))
        }
    }
}

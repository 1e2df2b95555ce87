//! Selector resolution over ordered fallback lists.
//!
//! Site markup changes without notice, so every logical element is described
//! by several candidate selectors in preference order. Resolution tries them
//! one at a time and stops at the first visible match.

use std::time::Duration;

use tracing::debug;

use crate::error::{BrowserError, ResolveError};
use crate::page::{ElementHandle, Page, SelectorList};

/// Per-candidate wait for discovery points that may legitimately be absent.
pub const OPTIONAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Per-candidate wait for form fields the flow cannot continue without.
pub const REQUIRED_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve the first candidate that produces a visible match within `per_selector_timeout`.
///
/// Later candidates are never tried once one matches. Total wait is bounded by
/// `candidates.len() * per_selector_timeout`.
pub async fn resolve(
    page: &dyn Page,
    list: &SelectorList,
    per_selector_timeout: Duration,
) -> Result<ElementHandle, ResolveError> {
    for selector in &list.candidates {
        match page.wait_for_selector(selector, per_selector_timeout).await {
            Ok(Some(element)) => {
                debug!("Resolved {} via {}", list.name, selector);
                return Ok(element);
            }
            Ok(None) => debug!("{}: no visible match for {}", list.name, selector),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => debug!("{}: selector {} failed: {}", list.name, selector, e),
        }
    }

    Err(not_found(list))
}

/// Resolve the element at `index` among the visible matches of the first
/// candidate that has more than `index` of them.
///
/// Used for fields that share markup and differ only by position.
pub async fn resolve_nth(
    page: &dyn Page,
    list: &SelectorList,
    index: usize,
    per_selector_timeout: Duration,
) -> Result<ElementHandle, ResolveError> {
    for selector in &list.candidates {
        match page.wait_for_selector(selector, per_selector_timeout).await {
            Ok(Some(_)) => {}
            Ok(None) => continue,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                debug!("{}: selector {} failed: {}", list.name, selector, e);
                continue;
            }
        }

        let mut matches = match page.query_all(selector).await {
            Ok(matches) => matches,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                debug!("{}: query {} failed: {}", list.name, selector, e);
                continue;
            }
        };

        if matches.len() > index {
            debug!(
                "Resolved {}[{}] via {} ({} matches)",
                list.name,
                index,
                selector,
                matches.len()
            );
            return Ok(matches.swap_remove(index));
        }
        debug!(
            "{}: only {} matches for {}, need index {}",
            list.name,
            matches.len(),
            selector,
            index
        );
    }

    Err(not_found(list))
}

/// Whether any candidate is visible right now, without waiting.
pub async fn is_present(page: &dyn Page, list: &SelectorList) -> Result<bool, BrowserError> {
    for selector in &list.candidates {
        match page.query_all(selector).await {
            Ok(matches) if !matches.is_empty() => return Ok(true),
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("{}: query {} failed: {}", list.name, selector, e),
        }
    }
    Ok(false)
}

fn not_found(list: &SelectorList) -> ResolveError {
    ResolveError::ElementNotFound {
        element: list.name.clone(),
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;

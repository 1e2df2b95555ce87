//! In-page JavaScript used by the CDP page implementation.
//!
//! Arguments are embedded as JSON literals so selectors and hrefs never need
//! manual escaping.

use serde_json::json;

use crate::page::Selector;

/// `(query) => Element[]`: visible elements matching `{css, text?, leaf?}`.
const QUERY_VISIBLE: &str = r#"(q) => {
  const isVisible = (el) => {
    const rect = el.getBoundingClientRect();
    if (rect.width === 0 || rect.height === 0) return false;
    const style = window.getComputedStyle(el);
    return style.visibility !== 'hidden' && style.display !== 'none';
  };
  const textOf = (el) => el.innerText || el.textContent || '';
  let nodes;
  try {
    nodes = Array.from(document.querySelectorAll(q.css));
  } catch (e) {
    return [];
  }
  if (typeof q.text === 'string') {
    nodes = nodes.filter((el) => textOf(el).includes(q.text));
    if (q.leaf) {
      nodes = nodes.filter((el) => !Array.from(el.children).some((c) => textOf(c).includes(q.text)));
    }
  }
  return nodes.filter(isVisible);
}"#;

/// Scroll the element into view and return its center in viewport coordinates.
pub(crate) const ELEMENT_CENTER: &str = r#"function() {
  if (typeof this.scrollIntoViewIfNeeded === 'function') {
    this.scrollIntoViewIfNeeded(true);
  } else {
    this.scrollIntoView({ block: 'center', inline: 'center' });
  }
  const rect = this.getBoundingClientRect();
  return { x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 };
}"#;

/// Focus the element and select its current contents so typed text replaces them.
pub(crate) const FOCUS_AND_SELECT: &str = r#"function() {
  this.focus();
  if (typeof this.select === 'function') {
    this.select();
  } else if (this.isContentEditable) {
    const range = document.createRange();
    range.selectNodeContents(this);
    const selection = window.getSelection();
    selection.removeAllRanges();
    selection.addRange(range);
  }
}"#;

/// Empty an input or editable element and notify listeners.
pub(crate) const CLEAR: &str = r#"function() {
  if ('value' in this) {
    this.value = '';
  } else {
    this.textContent = '';
  }
  this.dispatchEvent(new Event('input', { bubbles: true }));
  this.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

pub(crate) const FOCUS: &str = "function() { this.focus(); }";

/// Expression evaluating to the array of visible matches.
pub(crate) fn query_visible(selector: &Selector) -> String {
    format!("({QUERY_VISIBLE})({})", selector.to_query())
}

/// Expression evaluating to whether any visible element contains `text`.
pub(crate) fn text_visible(text: &str) -> String {
    format!("({QUERY_VISIBLE})({}).length > 0", Selector::text(text).to_query())
}

/// Expression that clicks a visible anchor whose href is exactly `href`.
pub(crate) fn click_anchor(href: &str) -> String {
    format!(
        r#"((href) => {{
  const anchor = Array.from(document.querySelectorAll('a')).find((a) => {{
    if (a.getAttribute('href') !== href && a.href !== href) return false;
    const rect = a.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
  }});
  if (!anchor) return false;
  anchor.click();
  return true;
}})({})"#,
        json!(href)
    )
}

/// Wrap a predicate so exceptions count as "not yet".
pub(crate) fn predicate(expression: &str) -> String {
    format!("(() => {{ try {{ return Boolean({expression}); }} catch (e) {{ return false; }} }})()")
}

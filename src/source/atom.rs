//! Atom dialect (`<feed>` root), as served by `rss.arxiv.org/atom/...`.
//!
//! Works on the generic [`Element`] tree.  Child lookups use the namespace
//! of the root element, so a feed that forgets the Atom namespace still
//! parses.

use super::xml::Element;
use super::{announces_update, collapse_whitespace, render_categories, Dialect, ARXIV_NS};

/// A parsed Atom document.
pub struct AtomFeed {
    root: Element,
}

impl AtomFeed {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    fn ns(&self) -> Option<&str> {
        self.root.namespace.as_deref()
    }
}

impl Dialect for AtomFeed {
    type Element = Element;

    fn entry_elements(&self) -> Vec<&Element> {
        self.root.children_named(self.ns(), "entry").collect()
    }

    fn title(&self, entry: &Element) -> String {
        collapse_whitespace(entry.child_text(self.ns(), "title"))
    }

    /// `rel="alternate"` (or no `rel`) wins; otherwise the first `<link>`.
    fn link(&self, entry: &Element) -> String {
        let mut links = entry.children_named(self.ns(), "link").peekable();
        let first = links.peek().copied();
        links
            .find(|l| matches!(l.attribute("rel"), None | Some("alternate")))
            .or(first)
            .and_then(|l| l.attribute("href"))
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn description(&self, entry: &Element) -> String {
        entry.child_text(self.ns(), "summary").to_string()
    }

    fn categories(&self, entry: &Element) -> String {
        render_categories(
            entry
                .children_named(self.ns(), "category")
                .filter_map(|c| c.attribute("term")),
        )
    }

    fn is_updated(&self, entry: &Element) -> bool {
        announces_update(
            entry.child_text(Some(ARXIV_NS), "announce_type"),
            entry.child_text(self.ns(), "title"),
        )
    }
}

//! The core data type shared across all feed dialects.
//!
//! `Entry` represents a single paper from any feed (Atom, RSS).  Every
//! dialect converts its native elements into `Entry` values so the rest of
//! the application (filtering, de-duplication, delivery) stays
//! dialect-agnostic.
//!
//! ## For contributors
//!
//! If you are adding a new dialect you do **not** need to modify this file
//! unless the dialect carries data the pipeline must act on.  Implement
//! [`Dialect`](super::Dialect) and let [`collect_entries`](super::collect_entries)
//! build the values.

/// A single feed entry, normalised from any dialect.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Entry {
    /// Unique identifier used for de-duplication against the acquired-id
    /// store.
    ///
    /// Always the part of [`link`](Entry::link) after its final `/`.  Do not
    /// change this rule once ids have been recorded: previously acquired
    /// entries would come back as new.
    pub id: String,

    /// Paper title as published, including any `(arXiv:...)` suffix.
    pub title: String,

    /// Canonical link to the abstract page.
    pub link: String,

    /// Raw abstract / summary text.
    pub description: String,

    /// Whether the feed announces this entry as a replacement of an earlier
    /// version rather than a new paper.
    pub is_updated: bool,

    /// Rendered category list, e.g. `"(cs.AI, cs.CR)"`, or `""` when the
    /// entry has none.
    pub categories: String,
}

impl Entry {
    /// Split the trailing `(arXiv:...)` annotation off the title.
    ///
    /// Returns `(title, info)`.  The split happens at the *last* occurrence
    /// of `(arXiv:`; when there is none, `info` is empty and the title is
    /// returned unchanged.
    pub fn split_title(&self) -> (&str, &str) {
        match self.title.rfind("(arXiv:") {
            Some(p) => self.title.split_at(p),
            None => (self.title.as_str(), ""),
        }
    }
}

/// Derive an entry id from its link: everything after the final `/`.
pub fn id_from_link(link: &str) -> String {
    match link.rfind('/') {
        Some(p) => link[p + 1..].to_string(),
        None => link.to_string(),
    }
}

/// Render category names as `"(a, b, c)"`, sorted alphabetically.
///
/// Blank names are ignored; no categories at all renders as `""` rather
/// than `"()"`.
pub fn render_categories<I, S>(categories: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<String> = categories
        .into_iter()
        .map(|c| c.as_ref().trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if names.is_empty() {
        return String::new();
    }
    names.sort();
    format!("({})", names.join(", "))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

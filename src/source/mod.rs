//! Feed sources and dialect normalisation.
//!
//! This module defines the [`FeedSource`] trait the run loop pulls entries
//! from, the common [`Entry`] type, and the [`Dialect`] capability every feed
//! format implements.  Concrete dialects live in sub-modules ([`atom`],
//! [`rss`]); [`Document`] picks one from the root element of a fetched
//! document.
//!
//! ## For contributors: adding a new dialect
//!
//! 1. Create a new file in this directory (e.g. `rdf.rs`).
//! 2. Define a struct wrapping the parsed document and implement
//!    [`Dialect`] for it.
//! 3. Add a variant to [`Document`] and a root-tag arm in
//!    [`Document::parse`].
//!
//! The run loop, de-duplication, and delivery are all dialect-agnostic.

mod atom;
mod entry;
mod http;
mod rss;
mod xml;

pub use entry::Entry;
pub use http::HttpFeedSource;

use atom::AtomFeed;
use entry::{id_from_link, render_categories};
use rss::RssFeed;
use xml::Element;

use tracing::warn;

use crate::error::FeedError;

/// Namespace of arXiv's feed extensions (`announce_type` and friends).
pub const ARXIV_NS: &str = "http://arxiv.org/schemas/atom";

/// Where the run loop gets entries from.
///
/// The production implementation is [`HttpFeedSource`]; tests substitute a
/// stub so the run loop can be exercised without the network.
pub trait FeedSource {
    /// Fetch `url` and normalise it into entries, in feed order.
    fn fetch(&self, url: &str) -> Result<Vec<Entry>, FeedError>;
}

/// Per-field extraction for one feed format.
///
/// `Element` is whatever the dialect's parsed form uses for a single entry.
pub trait Dialect {
    type Element;

    fn entry_elements(&self) -> Vec<&Self::Element>;

    fn title(&self, entry: &Self::Element) -> String;

    fn link(&self, entry: &Self::Element) -> String;

    fn description(&self, entry: &Self::Element) -> String;

    fn categories(&self, entry: &Self::Element) -> String;

    /// Defaults to the last path segment of [`link`](Dialect::link).
    fn id(&self, entry: &Self::Element) -> String {
        id_from_link(&self.link(entry))
    }

    fn is_updated(&self, entry: &Self::Element) -> bool;
}

/// Build [`Entry`] values from every entry element of `dialect`.
///
/// Entries without a link, or whose link yields an empty id (a trailing
/// `/`), are dropped: an empty id cannot be recorded in the store.
pub fn collect_entries<D: Dialect>(dialect: &D) -> Vec<Entry> {
    dialect
        .entry_elements()
        .into_iter()
        .filter_map(|element| {
            let link = dialect.link(element);
            let title = dialect.title(element);
            if link.is_empty() {
                warn!("Dropping entry without link: {:?}", title);
                return None;
            }
            let id = dialect.id(element);
            if id.is_empty() {
                warn!("Dropping entry with no id in its link {}: {:?}", link, title);
                return None;
            }
            Some(Entry {
                id,
                title,
                link,
                description: dialect.description(element),
                is_updated: dialect.is_updated(element),
                categories: dialect.categories(element),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dialect selection
// ---------------------------------------------------------------------------

/// A fetched document in one of the supported dialects.
pub enum Document {
    Atom(AtomFeed),
    Rss(RssFeed),
}

impl Document {
    /// Parse `xml` and select the dialect from the root element name
    /// (case-insensitive): `feed` is Atom, `rss` is RSS.
    pub fn parse(xml: &str) -> Result<Self, FeedError> {
        let root = Element::parse(xml)?;
        match root.name.to_ascii_lowercase().as_str() {
            "feed" => Ok(Self::Atom(AtomFeed::new(root))),
            "rss" => Ok(Self::Rss(RssFeed::read_from(xml)?)),
            _ => Err(FeedError::UnsupportedFormat(root.name)),
        }
    }

    pub fn entries(&self) -> Vec<Entry> {
        match self {
            Self::Atom(feed) => collect_entries(feed),
            Self::Rss(feed) => collect_entries(feed),
        }
    }
}

/// Parse a raw feed document into entries.
pub fn normalize(xml: &str) -> Result<Vec<Entry>, FeedError> {
    Ok(Document::parse(xml)?.entries())
}

// ---------------------------------------------------------------------------
// Helpers shared by the dialects
// ---------------------------------------------------------------------------

/// arXiv marks revised papers with an `announce_type` of `replace` or
/// `replace-cross`; older feeds appended `UPDATED)` to the title instead.
fn announces_update(announce_type: &str, title: &str) -> bool {
    announce_type.to_lowercase().contains("replace") || title.trim_end().ends_with("UPDATED)")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

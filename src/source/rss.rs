//! RSS 2.0 dialect (`<rss>` root), as served by `rss.arxiv.org/rss/...`.
//!
//! Parsing is delegated to the [`rss`] crate.  It keys unknown namespace
//! extensions by *prefix*, so the arXiv prefix is looked up from the
//! channel's namespace declarations before reading `announce_type`.

use super::{announces_update, collapse_whitespace, render_categories, Dialect, ARXIV_NS};
use crate::error::FeedError;

/// Prefix assumed when the channel does not declare the arXiv namespace.
const DEFAULT_ARXIV_PREFIX: &str = "arxiv";

/// A parsed RSS channel.
pub struct RssFeed {
    channel: rss::Channel,
    arxiv_prefix: String,
}

impl RssFeed {
    pub fn read_from(xml: &str) -> Result<Self, FeedError> {
        Ok(Self::new(rss::Channel::read_from(xml.as_bytes())?))
    }

    pub fn new(channel: rss::Channel) -> Self {
        let arxiv_prefix = channel
            .namespaces()
            .iter()
            .find(|(_, uri)| uri.as_str() == ARXIV_NS)
            .map(|(prefix, _)| prefix.clone())
            .unwrap_or_else(|| DEFAULT_ARXIV_PREFIX.to_string());
        Self {
            channel,
            arxiv_prefix,
        }
    }

    fn announce_type<'a>(&self, item: &'a rss::Item) -> &'a str {
        item.extensions()
            .get(&self.arxiv_prefix)
            .and_then(|fields| fields.get("announce_type"))
            .and_then(|values| values.first())
            .and_then(|ext| ext.value())
            .unwrap_or_default()
    }
}

impl Dialect for RssFeed {
    type Element = rss::Item;

    fn entry_elements(&self) -> Vec<&rss::Item> {
        self.channel.items().iter().collect()
    }

    fn title(&self, item: &rss::Item) -> String {
        collapse_whitespace(item.title().unwrap_or_default())
    }

    fn link(&self, item: &rss::Item) -> String {
        item.link().unwrap_or_default().trim().to_string()
    }

    fn description(&self, item: &rss::Item) -> String {
        item.description().unwrap_or_default().to_string()
    }

    fn categories(&self, item: &rss::Item) -> String {
        render_categories(item.categories().iter().map(|c| c.name()))
    }

    fn is_updated(&self, item: &rss::Item) -> bool {
        announces_update(self.announce_type(item), item.title().unwrap_or_default())
    }
}

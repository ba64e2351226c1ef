//! Run configuration and per-feed policy resolution.
//!
//! The configuration is a JSON document with global defaults and a list of
//! feeds.  Each feed is either a bare URL or an object that overrides some of
//! the globals.  [`FeedPolicy::resolve`] merges the two into the effective
//! settings for one feed.
//!
//! ```json
//! {
//!   "destinations": ["https://hooks.slack.com/services/T000/B000/XXXX"],
//!   "target_lang": "ja",
//!   "feeds": [
//!     "https://rss.arxiv.org/rss/cs.CR",
//!     { "feed_url": "https://rss.arxiv.org/atom/cs.AI", "destinations": [0], "target_lang": "" }
//!   ]
//! }
//! ```
//!
//! ## Merge rules
//!
//! * Every per-feed field is optional.  A field that is *present* wins, even
//!   when it is `false` or `""`; an absent field inherits the global value.
//! * `destinations` is the exception: an empty list means "use the global
//!   list", not "post nowhere".
//! * A destination token is either an index into the global list or a
//!   literal webhook URL.  Out-of-range indices and URLs without the webhook
//!   prefix are dropped.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::de::IgnoredAny;
use serde::Deserialize;

use crate::error::ConfigError;

/// Literal destination URLs must start with this.
pub const WEBHOOK_PREFIX: &str = "https://hooks.slack.com/services/";

/// Language feeds are published in.  Translation is skipped when the
/// target equals this.
pub const SOURCE_LANG: &str = "en";

// ---------------------------------------------------------------------------
// Abort policy
// ---------------------------------------------------------------------------

/// What a run does when a fetch, translation, or delivery fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum AbortPolicy {
    /// Log the failure and carry on.  The run succeeds.
    #[default]
    No,
    /// Carry on, but fail the run at the end if anything failed.
    Yes,
    /// Fail the run at the first failure.
    Immediately,
}

impl FromStr for AbortPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no" => Ok(Self::No),
            "yes" => Ok(Self::Yes),
            "immediately" => Ok(Self::Immediately),
            _ => Err(ConfigError::InvalidAbortPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for AbortPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AbortPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::No => "no",
            Self::Yes => "yes",
            Self::Immediately => "immediately",
        })
    }
}

// ---------------------------------------------------------------------------
// Configuration document
// ---------------------------------------------------------------------------

/// The whole configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalConfig {
    /// Default destinations, also the table that numeric destination tokens
    /// index into.
    #[serde(default, alias = "slack_urls")]
    pub destinations: Vec<String>,
    pub target_lang: Option<String>,
    pub translate_title: Option<bool>,
    pub ignore_updated: Option<bool>,
    #[serde(default)]
    pub feeds: Vec<FeedRef>,
    #[serde(default, alias = "abort")]
    pub abort_policy: AbortPolicy,
    /// Translation service; without it entries are posted untranslated.
    pub translator: Option<TranslatorConfig>,
}

/// One element of `feeds`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FeedRef {
    /// A bare feed URL; everything else comes from the globals.
    Url(String),
    /// An object overriding some of the globals.
    Override(FeedOverride),
    /// Anything that is neither.  Resolves to global defaults, keeping a
    /// string `feed_url` if the object has one.
    Malformed(serde_json::Value),
}

/// Per-feed overrides.  `None` means "inherit".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedOverride {
    pub feed_url: String,
    #[serde(default, alias = "slack_urls")]
    pub destinations: Option<Vec<DestinationRef>>,
    pub target_lang: Option<String>,
    pub translate_title: Option<bool>,
    pub ignore_updated: Option<bool>,
}

/// A per-feed destination token.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DestinationRef {
    /// Index into [`GlobalConfig::destinations`].
    Index(usize),
    /// A literal webhook URL.
    Url(String),
    /// Negative numbers, floats, objects...  Always dropped.
    Unrecognized(IgnoredAny),
}

/// Settings for the HTTP translation service.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslatorConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl GlobalConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Whether any feed resolves to a translation target.
    pub fn wants_translation(&self) -> bool {
        (0..self.feeds.len())
            .filter_map(|index| self.resolve(index))
            .any(|policy| policy.translation_target().is_some())
    }

    /// Effective policy for the feed at `index`, or `None` past the end of
    /// `feeds`.
    pub fn resolve(&self, index: usize) -> Option<FeedPolicy> {
        self.feeds.get(index).map(|feed| FeedPolicy::resolve(self, feed))
    }
}

// ---------------------------------------------------------------------------
// Resolved policy
// ---------------------------------------------------------------------------

/// Effective settings for one feed in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPolicy {
    pub feed_url: String,
    /// Unique, in resolution order.
    pub destinations: Vec<String>,
    pub target_lang: String,
    pub translate_title: bool,
    pub ignore_updated: bool,
}

impl FeedPolicy {
    /// Merge `feed` over the globals in `global`.  Never fails.
    pub fn resolve(global: &GlobalConfig, feed: &FeedRef) -> Self {
        let target_lang = global.target_lang.clone().unwrap_or_default();
        let translate_title = global.translate_title.unwrap_or(false);
        let ignore_updated = global.ignore_updated.unwrap_or(false);

        let policy = match feed {
            FeedRef::Url(url) => Self {
                feed_url: url.clone(),
                destinations: global.destinations.clone(),
                target_lang,
                translate_title,
                ignore_updated,
            },
            FeedRef::Override(o) => Self {
                feed_url: o.feed_url.clone(),
                destinations: resolve_destinations(&global.destinations, o.destinations.as_deref()),
                target_lang: o.target_lang.clone().unwrap_or(target_lang),
                translate_title: o.translate_title.unwrap_or(translate_title),
                ignore_updated: o.ignore_updated.unwrap_or(ignore_updated),
            },
            FeedRef::Malformed(value) => Self {
                feed_url: value
                    .get("feed_url")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                destinations: global.destinations.clone(),
                target_lang,
                translate_title,
                ignore_updated,
            },
        };

        Self {
            feed_url: policy.feed_url.trim().to_string(),
            destinations: unique(policy.destinations),
            ..policy
        }
    }

    /// The language to translate into, if translation applies to this feed.
    pub fn translation_target(&self) -> Option<&str> {
        match self.target_lang.as_str() {
            "" | SOURCE_LANG => None,
            lang => Some(lang),
        }
    }
}

/// Expand per-feed destination tokens against the global list.
///
/// Duplicates are kept; [`FeedPolicy::resolve`] removes them afterwards.
pub fn resolve_destinations(global: &[String], tokens: Option<&[DestinationRef]>) -> Vec<String> {
    let tokens = match tokens {
        Some(tokens) if !tokens.is_empty() => tokens,
        _ => return global.to_vec(),
    };

    tokens
        .iter()
        .filter_map(|token| match token {
            DestinationRef::Index(i) => global.get(*i).cloned(),
            DestinationRef::Url(url) => {
                let url = url.trim();
                url.starts_with(WEBHOOK_PREFIX).then(|| url.to_string())
            }
            DestinationRef::Unrecognized(_) => None,
        })
        .collect()
}

/// Drop repeated values, keeping the first occurrence.
fn unique(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

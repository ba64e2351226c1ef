//! One pass over every configured feed.
//!
//! For each feed, in configured order:
//!
//! ```text
//! resolve policy ─► fetch ─► for each entry:
//!                              skip updated / already acquired
//!                              format ─► translate ─► compose message
//!                              post to every destination
//!                              record as acquired unless a post failed
//! ```
//!
//! Failures go through [`AbortPolicy`]: `immediately` returns the first one,
//! `no` and `yes` log it, remember it, and carry on with the next entry (or
//! the next feed, for fetch failures).  At the end `yes` fails the run if
//! anything was remembered.
//!
//! An entry with one failed destination is *not* recorded, so the next run
//! posts it again to every destination, including the ones that already
//! got it.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::config::{AbortPolicy, FeedPolicy, GlobalConfig, SOURCE_LANG};
use crate::deliver::{redact, Notifier};
use crate::error::RunError;
use crate::format::format_text;
use crate::source::{Entry, FeedSource};
use crate::store::AcquiredIdStore;
use crate::translate::Translator;

/// The external services a run talks to.
pub struct Collaborators<'a> {
    pub source: &'a dyn FeedSource,
    pub translator: &'a dyn Translator,
    pub notifier: &'a dyn Notifier,
    pub store: &'a mut dyn AcquiredIdStore,
}

/// Options for a single run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Fetch, format and log, but neither translate nor post.
    pub dry_run: bool,
    pub abort_policy: AbortPolicy,
}

/// What a run did.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Ids recorded as acquired, in processing order.
    pub acquired: Vec<String>,
    pub skipped_updated: usize,
    pub skipped_acquired: usize,
    /// Every failure under `no`/`yes`, in the order they happened.
    pub errors: Vec<String>,
}

/// Run the whole pipeline once.
pub fn run(
    config: &GlobalConfig,
    options: RunOptions,
    collaborators: Collaborators<'_>,
) -> Result<RunReport, RunError> {
    let acquired = collaborators.store.load()?;
    info!(
        "Starting {} over {} feeds ({} ids already acquired, abort: {})",
        if options.dry_run { "dry run" } else { "run" },
        config.feeds.len(),
        acquired.len(),
        options.abort_policy,
    );

    let mut runner = Runner {
        options,
        collaborators,
        acquired,
        report: RunReport::default(),
    };

    for index in 0..config.feeds.len() {
        if let Some(policy) = config.resolve(index) {
            runner.process_feed(&policy)?;
        }
    }

    let report = runner.report;
    if !report.errors.is_empty() {
        let joined = report.errors.join("\n");
        error!("Run finished with {} errors:\n{}", report.errors.len(), joined);
        if options.abort_policy == AbortPolicy::Yes {
            return Err(RunError::Aborted(joined));
        }
    }
    Ok(report)
}

struct Runner<'a> {
    options: RunOptions,
    collaborators: Collaborators<'a>,
    acquired: HashSet<String>,
    report: RunReport,
}

impl Runner<'_> {
    fn process_feed(&mut self, policy: &FeedPolicy) -> Result<(), RunError> {
        info!("Check {}", policy.feed_url);
        let entries = match self.collaborators.source.fetch(&policy.feed_url) {
            Ok(entries) => entries,
            Err(source) => {
                return self.fail(RunError::Fetch {
                    url: policy.feed_url.clone(),
                    source,
                });
            }
        };
        debug!("{} entries in {}", entries.len(), policy.feed_url);

        for entry in &entries {
            self.process_entry(policy, entry)?;
        }
        Ok(())
    }

    fn process_entry(&mut self, policy: &FeedPolicy, entry: &Entry) -> Result<(), RunError> {
        if policy.ignore_updated && entry.is_updated {
            info!("{} is the updated paper.", entry.id);
            self.report.skipped_updated += 1;
            return Ok(());
        }
        if self.acquired.contains(&entry.id) {
            info!("{} is already acquired.", entry.id);
            self.report.skipped_acquired += 1;
            return Ok(());
        }
        info!("{} is new! {}", entry.id, entry.categories);

        let (title, arxiv_info) = entry.split_title();
        let mut title = title.trim_end().to_string();
        let mut abstract_text = format_text(&entry.description);

        if let Some(target) = policy.translation_target().filter(|_| !self.options.dry_run) {
            let translator = self.collaborators.translator;
            let translated = translator
                .translate(&abstract_text, SOURCE_LANG, target)
                .and_then(|text| {
                    if policy.translate_title {
                        Ok((text, translator.translate(&title, SOURCE_LANG, target)?))
                    } else {
                        Ok((text, title.clone()))
                    }
                });
            match translated {
                Ok((text, translated_title)) => {
                    abstract_text = text;
                    title = translated_title;
                }
                Err(source) => {
                    return self.fail(RunError::Translation {
                        id: entry.id.clone(),
                        source,
                    });
                }
            }
        }

        let message = compose_message(&entry.link, &title, arxiv_info, &abstract_text);
        info!("{}", message);

        let mut delivered = true;
        if !self.options.dry_run {
            for destination in &policy.destinations {
                match self.collaborators.notifier.post(destination, &message) {
                    Ok(()) => debug!("Posted {} to {}", entry.id, redact(destination)),
                    Err(source) => {
                        delivered = false;
                        self.fail(RunError::Delivery {
                            id: entry.id.clone(),
                            source,
                        })?;
                    }
                }
            }
        }

        if delivered {
            self.acquired.insert(entry.id.clone());
            self.collaborators.store.append(&entry.id)?;
            self.report.acquired.push(entry.id.clone());
        } else {
            warn!("{} not recorded; it will be posted again next run", entry.id);
        }
        Ok(())
    }

    /// Apply the abort policy to a failure.  `Err` means stop the run now.
    fn fail(&mut self, err: RunError) -> Result<(), RunError> {
        if self.options.abort_policy == AbortPolicy::Immediately {
            return Err(err);
        }
        let message = err.to_string();
        error!("{}", message);
        self.report.errors.push(message);
        Ok(())
    }
}

/// Link, then title and arXiv info, a blank line, and the abstract.
pub fn compose_message(link: &str, title: &str, info: &str, abstract_text: &str) -> String {
    let heading = if info.is_empty() {
        title.to_string()
    } else {
        format!("{title} {info}")
    };
    format!("{link}\n{heading}\n\n{abstract_text}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::error::{DeliveryError, FeedError, TranslationError};
    use crate::store::MemoryIdStore;

    const A: &str = "https://hooks.slack.com/services/A";
    const B: &str = "https://hooks.slack.com/services/B";

    // -- test doubles --------------------------------------------------------

    /// Serves canned entries per URL; URLs not in the map fail to fetch.
    #[derive(Default)]
    struct StubSource {
        feeds: HashMap<String, Vec<Entry>>,
        fetched: RefCell<Vec<String>>,
    }

    impl StubSource {
        fn with(mut self, url: &str, entries: Vec<Entry>) -> Self {
            self.feeds.insert(url.to_string(), entries);
            self
        }
    }

    impl FeedSource for StubSource {
        fn fetch(&self, url: &str) -> Result<Vec<Entry>, FeedError> {
            self.fetched.borrow_mut().push(url.to_string());
            self.feeds
                .get(url)
                .cloned()
                .ok_or_else(|| FeedError::Xml(format!("no such feed {url}")))
        }
    }

    /// Records every post; destinations in `failing` answer HTTP 500.
    #[derive(Default)]
    struct RecordingNotifier {
        failing: HashSet<String>,
        posts: RefCell<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        fn failing(destination: &str) -> Self {
            Self {
                failing: HashSet::from([destination.to_string()]),
                ..Self::default()
            }
        }

        fn destinations(&self) -> Vec<String> {
            self.posts.borrow().iter().map(|(d, _)| d.clone()).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn post(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
            self.posts
                .borrow_mut()
                .push((destination.to_string(), text.to_string()));
            if self.failing.contains(destination) {
                return Err(DeliveryError::Status {
                    destination: destination.to_string(),
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                });
            }
            Ok(())
        }
    }

    /// Prefixes text with the target language, or fails when `broken`.
    #[derive(Default)]
    struct StubTranslator {
        broken: bool,
        calls: RefCell<usize>,
    }

    impl Translator for StubTranslator {
        fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError> {
            *self.calls.borrow_mut() += 1;
            assert_eq!(source, "en");
            if self.broken {
                return Err(TranslationError::EmptyResponse("quota exceeded".into()));
            }
            Ok(format!("[{target}] {text}"))
        }
    }

    // -- helpers -------------------------------------------------------------

    fn entry(id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            title: format!("Paper {id}. (arXiv:{id} [cs.CR])"),
            link: format!("https://arxiv.org/abs/{id}"),
            description: "First sentence. Second one.".to_string(),
            is_updated: false,
            categories: "(cs.CR)".to_string(),
        }
    }

    fn updated(id: &str) -> Entry {
        Entry {
            is_updated: true,
            ..entry(id)
        }
    }

    fn config(json: &str) -> GlobalConfig {
        GlobalConfig::from_json(json).unwrap()
    }

    fn two_destinations(feeds: &str) -> GlobalConfig {
        config(&format!(r#"{{"destinations": ["{A}", "{B}"], "feeds": {feeds}}}"#))
    }

    fn run_with(
        config: &GlobalConfig,
        options: RunOptions,
        source: &StubSource,
        translator: &StubTranslator,
        notifier: &RecordingNotifier,
        store: &mut MemoryIdStore,
    ) -> Result<RunReport, RunError> {
        run(
            config,
            options,
            Collaborators {
                source,
                translator,
                notifier,
                store,
            },
        )
    }

    fn abort(policy: AbortPolicy) -> RunOptions {
        RunOptions {
            dry_run: false,
            abort_policy: policy,
        }
    }

    // -- message -------------------------------------------------------------

    #[test]
    fn message_layout() {
        assert_eq!(
            compose_message("https://arxiv.org/abs/1", "Title.", "(arXiv:1 [cs.CR])", "One.\nTwo."),
            "https://arxiv.org/abs/1\nTitle. (arXiv:1 [cs.CR])\n\nOne.\nTwo."
        );
        assert_eq!(compose_message("l", "Title", "", "a"), "l\nTitle\n\na");
    }

    // -- dedup ---------------------------------------------------------------

    #[test]
    fn second_run_delivers_nothing_new() {
        let config = two_destinations(r#"["feed"]"#);
        let source = StubSource::default().with("feed", vec![entry("1"), entry("2")]);
        let translator = StubTranslator::default();
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore::default();

        let first = run_with(&config, RunOptions::default(), &source, &translator, &notifier, &mut store).unwrap();
        assert_eq!(first.acquired, ["1", "2"]);
        assert_eq!(notifier.posts.borrow().len(), 4);

        let second = run_with(&config, RunOptions::default(), &source, &translator, &notifier, &mut store).unwrap();
        assert!(second.acquired.is_empty());
        assert_eq!(second.skipped_acquired, 2);
        assert_eq!(notifier.posts.borrow().len(), 4, "nothing re-posted");
        assert_eq!(store.rows, ["1", "2"]);
    }

    #[test]
    fn same_id_in_two_feeds_is_posted_once() {
        let config = two_destinations(r#"["f1", "f2"]"#);
        let source = StubSource::default()
            .with("f1", vec![entry("1")])
            .with("f2", vec![entry("1"), entry("2")]);
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore::default();

        let report = run_with(&config, RunOptions::default(), &source, &StubTranslator::default(), &notifier, &mut store).unwrap();
        assert_eq!(report.acquired, ["1", "2"]);
        assert_eq!(report.skipped_acquired, 1);
        assert_eq!(store.rows, ["1", "2"]);
    }

    #[test]
    fn trailing_slash_links_never_reach_the_store() {
        let feed = crate::source::normalize(
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry><title>A</title><link href="https://blog.example/posts/a/"/></entry>
  <entry><title>B</title><link href="https://blog.example/posts/b"/></entry>
</feed>"#,
        )
        .unwrap();
        let config = two_destinations(r#"["feed"]"#);
        let source = StubSource::default().with("feed", feed);
        let translator = StubTranslator::default();
        let notifier = RecordingNotifier::default();
        let dir = tempfile::tempdir().unwrap();
        let mut store = crate::store::FileIdStore::new(dir.path().join("acquired.tsv"));

        for _ in 0..2 {
            run(
                &config,
                RunOptions::default(),
                Collaborators {
                    source: &source,
                    translator: &translator,
                    notifier: &notifier,
                    store: &mut store,
                },
            )
            .unwrap();
        }

        assert_eq!(notifier.destinations(), [A, B], "only B, and only once");
        assert_eq!(store.load().unwrap(), HashSet::from(["b".to_string()]));
    }

    #[test]
    fn posts_formatted_message_to_every_destination() {
        let config = two_destinations(r#"["feed"]"#);
        let source = StubSource::default().with("feed", vec![entry("2401.1")]);
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore::default();

        run_with(&config, RunOptions::default(), &source, &StubTranslator::default(), &notifier, &mut store).unwrap();

        let posts = notifier.posts.borrow();
        assert_eq!(notifier.destinations(), [A, B]);
        assert_eq!(
            posts[0].1,
            "https://arxiv.org/abs/2401.1\nPaper 2401.1. (arXiv:2401.1 [cs.CR])\n\nFirst sentence.\nSecond one."
        );
        assert_eq!(posts[0].1, posts[1].1);
    }

    // -- partial failure -----------------------------------------------------

    #[test]
    fn one_failed_destination_blocks_acquisition() {
        let config = two_destinations(r#"["feed"]"#);
        let source = StubSource::default().with("feed", vec![entry("1")]);
        let translator = StubTranslator::default();
        let flaky = RecordingNotifier::failing(B);
        let mut store = MemoryIdStore::default();

        let report = run_with(&config, abort(AbortPolicy::No), &source, &translator, &flaky, &mut store).unwrap();
        assert!(report.acquired.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(flaky.destinations(), [A, B], "sibling destination still attempted");
        assert!(store.rows.is_empty());

        // Next run re-sends to both, including the one that succeeded.
        let healthy = RecordingNotifier::default();
        let report = run_with(&config, abort(AbortPolicy::No), &source, &translator, &healthy, &mut store).unwrap();
        assert_eq!(report.acquired, ["1"]);
        assert_eq!(healthy.destinations(), [A, B]);
    }

    #[test]
    fn failed_destination_under_yes_fails_after_everything_ran() {
        let config = two_destinations(r#"["feed"]"#);
        let source = StubSource::default().with("feed", vec![entry("1"), entry("2")]);
        let notifier = RecordingNotifier::failing(A);
        let mut store = MemoryIdStore::default();

        let err = run_with(&config, abort(AbortPolicy::Yes), &source, &StubTranslator::default(), &notifier, &mut store)
            .unwrap_err();
        assert!(matches!(err, RunError::Aborted(ref text) if text.lines().count() == 2), "{err}");
        assert_eq!(notifier.posts.borrow().len(), 4);
        assert!(store.rows.is_empty());
    }

    #[test]
    fn failed_destination_under_immediately_stops_at_once() {
        let config = two_destinations(r#"["feed"]"#);
        let source = StubSource::default().with("feed", vec![entry("1"), entry("2")]);
        let notifier = RecordingNotifier::failing(A);
        let mut store = MemoryIdStore::default();

        let err = run_with(&config, abort(AbortPolicy::Immediately), &source, &StubTranslator::default(), &notifier, &mut store)
            .unwrap_err();
        assert!(matches!(err, RunError::Delivery { ref id, .. } if id == "1"));
        assert_eq!(notifier.destinations(), [A], "B never attempted");
        assert!(store.rows.is_empty());
    }

    // -- fetch failures and abort policy ---------------------------------------

    #[test]
    fn fetch_failure_under_immediately_skips_remaining_feeds() {
        let config = two_destinations(r#"["f1", "broken", "f3"]"#);
        let source = StubSource::default()
            .with("f1", vec![entry("1")])
            .with("f3", vec![entry("3")]);
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore::default();

        let err = run_with(&config, abort(AbortPolicy::Immediately), &source, &StubTranslator::default(), &notifier, &mut store)
            .unwrap_err();
        assert!(matches!(err, RunError::Fetch { ref url, .. } if url == "broken"));
        assert_eq!(*source.fetched.borrow(), ["f1", "broken"]);
        assert_eq!(store.rows, ["1"]);
    }

    #[test]
    fn fetch_failure_under_no_is_logged_and_run_completes() {
        let config = two_destinations(r#"["f1", "broken", "f3"]"#);
        let source = StubSource::default()
            .with("f1", vec![entry("1")])
            .with("f3", vec![entry("3")]);
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore::default();

        let report = run_with(&config, abort(AbortPolicy::No), &source, &StubTranslator::default(), &notifier, &mut store).unwrap();
        assert_eq!(*source.fetched.borrow(), ["f1", "broken", "f3"]);
        assert_eq!(report.acquired, ["1", "3"]);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("broken"));
    }

    #[test]
    fn fetch_failure_under_yes_attempts_everything_then_fails() {
        let config = two_destinations(r#"["f1", "broken", "f3"]"#);
        let source = StubSource::default()
            .with("f1", vec![entry("1")])
            .with("f3", vec![entry("3")]);
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore::default();

        let err = run_with(&config, abort(AbortPolicy::Yes), &source, &StubTranslator::default(), &notifier, &mut store)
            .unwrap_err();
        assert!(matches!(err, RunError::Aborted(ref text) if text.contains("broken")));
        assert_eq!(*source.fetched.borrow(), ["f1", "broken", "f3"]);
        assert_eq!(store.rows, ["1", "3"], "successful entries stay recorded");
    }

    // -- updated filter --------------------------------------------------------

    #[test]
    fn updated_entries_skipped_only_when_ignored() {
        let source = StubSource::default().with("feed", vec![updated("1"), entry("2")]);
        let translator = StubTranslator::default();

        let ignoring = config(&format!(r#"{{"destinations": ["{A}"], "ignore_updated": true, "feeds": ["feed"]}}"#));
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore::default();
        let report = run_with(&ignoring, RunOptions::default(), &source, &translator, &notifier, &mut store).unwrap();
        assert_eq!(report.acquired, ["2"]);
        assert_eq!(report.skipped_updated, 1);
        assert_eq!(notifier.posts.borrow().len(), 1);

        let keeping = config(&format!(
            r#"{{"destinations": ["{A}"], "ignore_updated": true, "feeds": [{{"feed_url": "feed", "ignore_updated": false}}]}}"#
        ));
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore::default();
        let report = run_with(&keeping, RunOptions::default(), &source, &translator, &notifier, &mut store).unwrap();
        assert_eq!(report.acquired, ["1", "2"]);
        assert_eq!(report.skipped_updated, 0);
    }

    // -- translation -----------------------------------------------------------

    #[test]
    fn translates_abstract_and_title_when_configured() {
        let config = config(&format!(
            r#"{{"destinations": ["{A}"], "target_lang": "ja", "translate_title": true, "feeds": ["feed"]}}"#
        ));
        let source = StubSource::default().with("feed", vec![entry("7")]);
        let translator = StubTranslator::default();
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore::default();

        run_with(&config, RunOptions::default(), &source, &translator, &notifier, &mut store).unwrap();
        assert_eq!(*translator.calls.borrow(), 2);
        assert_eq!(
            notifier.posts.borrow()[0].1,
            "https://arxiv.org/abs/7\n[ja] Paper 7. (arXiv:7 [cs.CR])\n\n[ja] First sentence.\nSecond one."
        );
    }

    #[test]
    fn no_translation_for_english_target() {
        let config = config(&format!(
            r#"{{"destinations": ["{A}"], "target_lang": "en", "translate_title": true, "feeds": ["feed"]}}"#
        ));
        let source = StubSource::default().with("feed", vec![entry("7")]);
        let translator = StubTranslator::default();
        let mut store = MemoryIdStore::default();

        run_with(&config, RunOptions::default(), &source, &translator, &RecordingNotifier::default(), &mut store).unwrap();
        assert_eq!(*translator.calls.borrow(), 0);
    }

    #[test]
    fn translation_failure_skips_entry_and_continues() {
        let config = config(&format!(r#"{{"destinations": ["{A}"], "target_lang": "ja", "feeds": ["feed"]}}"#));
        let source = StubSource::default().with("feed", vec![entry("1"), entry("2")]);
        let translator = StubTranslator {
            broken: true,
            ..StubTranslator::default()
        };
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore::default();

        let report = run_with(&config, abort(AbortPolicy::No), &source, &translator, &notifier, &mut store).unwrap();
        assert!(report.acquired.is_empty());
        assert_eq!(report.errors.len(), 2);
        assert!(notifier.posts.borrow().is_empty());
        assert_eq!(*translator.calls.borrow(), 2);

        let err = run_with(&config, abort(AbortPolicy::Immediately), &source, &translator, &notifier, &mut store)
            .unwrap_err();
        assert!(matches!(err, RunError::Translation { ref id, .. } if id == "1"));
    }

    // -- dry run ---------------------------------------------------------------

    #[test]
    fn dry_run_neither_translates_nor_posts_but_records() {
        let config = config(&format!(
            r#"{{"destinations": ["{A}"], "target_lang": "ja", "translate_title": true, "feeds": ["feed"]}}"#
        ));
        let source = StubSource::default().with("feed", vec![entry("1")]);
        let translator = StubTranslator::default();
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore::default();

        let options = RunOptions {
            dry_run: true,
            abort_policy: AbortPolicy::Yes,
        };
        let report = run_with(&config, options, &source, &translator, &notifier, &mut store).unwrap();
        assert_eq!(*translator.calls.borrow(), 0);
        assert!(notifier.posts.borrow().is_empty());
        assert_eq!(report.acquired, ["1"]);
        assert_eq!(store.rows, ["1"]);
    }

    #[test]
    fn existing_store_rows_are_honoured() {
        let config = two_destinations(r#"["feed"]"#);
        let source = StubSource::default().with("feed", vec![entry("1"), entry("2")]);
        let notifier = RecordingNotifier::default();
        let mut store = MemoryIdStore {
            rows: vec!["".to_string(), "1".to_string()],
        };

        let report = run_with(&config, RunOptions::default(), &source, &StubTranslator::default(), &notifier, &mut store).unwrap();
        assert_eq!(report.acquired, ["2"]);
        assert_eq!(store.rows, ["", "1", "2"]);
    }
}

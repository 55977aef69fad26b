use std::collections::HashMap;
use std::path::PathBuf;

use ferret::core::config::Config;
use ferret::core::error::{Error, Result};
use ferret::core::session::Session;
use ferret::crawl::scheduler;
use ferret::extract::fetch::{Fetcher, Loaded};
use ferret::extract::text;
use ferret::index::inverted::{self, InvertedIndex};
use ferret::search::engine;

/// Scripted fetcher: every known uri yields fixed content and links,
/// everything else fails like a dead link.
struct StubFetcher {
    pages: HashMap<String, (Option<String>, Vec<String>)>,
}

impl StubFetcher {
    fn new() -> Self {
        StubFetcher {
            pages: HashMap::new(),
        }
    }

    fn page(mut self, uri: &str, content: &str, links: &[&str]) -> Self {
        self.pages.insert(
            uri.to_string(),
            (
                Some(content.to_string()),
                links.iter().map(|l| l.to_string()).collect(),
            ),
        );
        self
    }

    fn links_only(mut self, uri: &str, links: &[&str]) -> Self {
        self.pages.insert(
            uri.to_string(),
            (None, links.iter().map(|l| l.to_string()).collect()),
        );
        self
    }
}

impl Fetcher for StubFetcher {
    fn load(&self, uri: &str) -> Result<Loaded> {
        match self.pages.get(uri) {
            Some((content, links)) => Ok(Loaded {
                content: content.clone(),
                words: content.as_deref().map(text::words).unwrap_or_default(),
                links: links.iter().cloned().collect(),
            }),
            None => Err(Error::fetch(format!("unable to download {}", uri))),
        }
    }
}

fn temp_config(dir: &tempfile::TempDir) -> Config {
    Config {
        db_path: dir.path().join("index.db"),
        ..Config::default()
    }
}

fn open_session(config: &Config) -> Session {
    Session::open(config.clone()).unwrap()
}

fn seed(index: &mut InvertedIndex, session: &Session, uri: &str) {
    let (_, created) = index.document(session, uri).unwrap();
    assert!(created);
}

#[test]
fn end_to_end_cat_dog() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let fetcher = StubFetcher::new().page("local/pets.txt", "cat dog", &[]);

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    seed(&mut index, &session, "local/pets.txt");
    let report = scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    assert_eq!(report.fetched, 1);
    index.close(&session).unwrap();
    session.commit().unwrap();

    // Fresh session: everything must have reached the store
    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);

    let doc_id: i64 = session
        .conn()
        .query_row(
            "SELECT id FROM document WHERE uri = 'local/pets.txt'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    {
        let cat = index
            .keyword(&session, "cat", true)
            .unwrap()
            .expect("cat was indexed");
        assert_eq!(cat.score, 1);
        assert!(cat.documents.test(doc_id as u64));
    }

    let hits = engine::search(&mut index, &session, &["cat".to_string()], 0, 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].uri, "local/pets.txt");
    assert!(hits[0].snippet.as_deref().unwrap().contains("cat"));

    // A word never indexed empties the conjunction
    let none = engine::search(
        &mut index,
        &session,
        &["cat".to_string(), "zzz".to_string()],
        0,
        10,
    )
    .unwrap();
    assert!(none.is_empty());

    let stats = inverted::stats(&mut index, &session).unwrap();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.frontier, 0);
    assert_eq!(stats.max_distance, Some(0));
    session.rollback().unwrap();
}

#[test]
fn bfs_relaxation_diamond() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let fetcher = StubFetcher::new()
        .page("site-s", "seed page", &["site-a", "site-b"])
        .page("site-a", "alpha page", &["site-c"])
        .page("site-b", "beta page", &["site-c"])
        .page("site-c", "gamma page", &[]);

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    seed(&mut index, &session, "site-s");

    // Layer by layer: S, then A and B, then C
    let first = scheduler::crawl(&mut index, &session, &fetcher, 1).unwrap();
    assert_eq!(first.fetched, 1);
    assert_eq!(first.discovered, 2);
    let second = scheduler::crawl(&mut index, &session, &fetcher, 2).unwrap();
    assert_eq!(second.fetched, 2);
    assert_eq!(second.discovered, 1); // C created once, relaxed twice
    let third = scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    assert_eq!(third.fetched, 1);

    index.close(&session).unwrap();
    session.commit().unwrap();

    let session = open_session(&config);
    let row = |uri: &str| -> (Option<u32>, u64) {
        session
            .conn()
            .query_row(
                "SELECT distance, score FROM document WHERE uri = ?1",
                [uri],
                |r| Ok((r.get(0)?, r.get::<_, i64>(1)? as u64)),
            )
            .unwrap()
    };
    assert_eq!(row("site-s").0, Some(0));
    assert_eq!(row("site-a"), (Some(1), 1));
    assert_eq!(row("site-b"), (Some(1), 1));
    // Both inbound edges voted; the relaxed distance is one layer past A/B
    assert_eq!(row("site-c"), (Some(2), 2));

    // Static frontier: nothing left to process
    let mut index = InvertedIndex::new(100, 100);
    let done = scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    assert_eq!(done.fetched + done.deleted, 0);
    session.rollback().unwrap();
}

#[test]
fn repeated_crawls_in_one_session_select_disjoint_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let fetcher = StubFetcher::new()
        .page("site-s", "cat dog", &["site-a"])
        .page("site-a", "alpha", &[]);

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    seed(&mut index, &session, "site-s");

    // Content indexed in this session still sits in the write-back
    // cache; the next selection must not pick those rows up again.
    let first = scheduler::crawl(&mut index, &session, &fetcher, 1).unwrap();
    assert_eq!(first.fetched, 1);
    let second = scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    assert_eq!(second.fetched, 1);
    assert_eq!(second.discovered, 0);
    let third = scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    assert_eq!(third.fetched + third.deleted, 0);

    index.close(&session).unwrap();
    session.commit().unwrap();

    // Single visits, single votes: nothing was counted twice
    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    let cat = index
        .keyword(&session, "cat", true)
        .unwrap()
        .expect("cat was indexed");
    assert_eq!(cat.score, 1);
    let link_score: i64 = session
        .conn()
        .query_row(
            "SELECT score FROM document WHERE uri = 'site-a'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(link_score, 1);
    session.rollback().unwrap();
}

#[test]
fn dead_links_are_pruned_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let fetcher = StubFetcher::new(); // every fetch fails

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    seed(&mut index, &session, "gone://nowhere");

    let report = scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    assert_eq!(report.deleted, 1);

    // The row is gone from the store, so later crawls select nothing
    let remaining: i64 = session
        .conn()
        .query_row("SELECT count(*) FROM document", [], |r| r.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
    let again = scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    assert_eq!(again.deleted + again.fetched, 0);

    index.close(&session).unwrap();
    session.commit().unwrap();
}

#[test]
fn conjunctive_search_needs_every_word() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let fetcher = StubFetcher::new()
        .page("doc-one", "cat dog bird", &[])
        .page("doc-two", "cat fish", &[]);

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    seed(&mut index, &session, "doc-one");
    seed(&mut index, &session, "doc-two");
    scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    index.close(&session).unwrap();
    session.commit().unwrap();

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);

    let cat = engine::search(&mut index, &session, &["cat".to_string()], 0, 10).unwrap();
    assert_eq!(cat.len(), 2);

    let cat_dog = engine::search(
        &mut index,
        &session,
        &["cat".to_string(), "dog".to_string()],
        0,
        10,
    )
    .unwrap();
    assert_eq!(cat_dog.len(), 1);
    assert_eq!(cat_dog[0].uri, "doc-one");
    session.rollback().unwrap();
}

#[test]
fn neighbours_are_co_occurring_terms() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let fetcher = StubFetcher::new()
        .page("doc-one", "cat dog", &[])
        .page("doc-two", "cat fish", &[]);

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    seed(&mut index, &session, "doc-one");
    seed(&mut index, &session, "doc-two");
    scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    index.close(&session).unwrap();
    session.commit().unwrap();

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);

    let related = engine::neighbours(&mut index, &session, &["dog".to_string()]).unwrap();
    let words: Vec<&str> = related.iter().map(|t| t.word.as_str()).collect();
    assert!(words.contains(&"cat"));
    assert!(!words.contains(&"fish"));
    // Rarer terms first: dog (1 occurrence) before cat (2)
    assert!(
        words.iter().position(|w| *w == "dog") < words.iter().position(|w| *w == "cat")
    );

    let unknown = engine::neighbours(&mut index, &session, &["zzz".to_string()]).unwrap();
    assert!(unknown.is_empty());
    session.rollback().unwrap();
}

#[test]
fn suggest_completes_prefixes_alphabetically() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let fetcher = StubFetcher::new().page("doc-one", "cart care cat dog", &[]);

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    seed(&mut index, &session, "doc-one");
    scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    index.close(&session).unwrap();
    session.commit().unwrap();

    let session = open_session(&config);
    assert_eq!(
        engine::suggest(&session, "ca", 0, 10).unwrap(),
        vec!["care", "cart", "cat"]
    );
    assert_eq!(engine::suggest(&session, "ca", 0, 2).unwrap().len(), 2);
    assert_eq!(
        engine::suggest(&session, "ca", 1, 2).unwrap(),
        vec!["cat"]
    );
    // LIKE metacharacters in the prefix never act as wildcards
    assert!(engine::suggest(&session, "ca%", 0, 10).unwrap().is_empty());
    assert!(engine::suggest(&session, "ca_", 0, 10).unwrap().is_empty());
    session.rollback().unwrap();
}

#[test]
fn links_only_sources_drain_from_the_frontier() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let fetcher = StubFetcher::new()
        .links_only("history:import", &["site-a", "site-b"])
        .page("site-a", "alpha", &[])
        .page("site-b", "beta", &[]);

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    seed(&mut index, &session, "history:import");

    let report = scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    assert_eq!(report.deleted, 1); // the import row itself
    assert_eq!(report.discovered, 2);

    let stats = inverted::stats(&mut index, &session).unwrap();
    assert_eq!(stats.frontier, 2);

    scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    let stats = inverted::stats(&mut index, &session).unwrap();
    assert_eq!(stats.frontier, 0);
    assert_eq!(stats.documents, 2);
    index.close(&session).unwrap();
    session.commit().unwrap();
}

#[test]
fn collect_links_mode_marks_pages_fetched_without_indexing() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        collect_links: true,
        ..temp_config(&dir)
    };
    let fetcher = StubFetcher::new().page("site-s", "seed words here", &["site-a"]);

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    seed(&mut index, &session, "site-s");
    let report = scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    assert_eq!(report.fetched, 1);
    assert_eq!(report.discovered, 1);
    index.close(&session).unwrap();
    session.commit().unwrap();

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    let stats = inverted::stats(&mut index, &session).unwrap();
    // Fetched and out of the frontier for good, but nothing tokenized
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.keywords, 0);
    assert_eq!(stats.frontier, 1); // the discovered link
    session.rollback().unwrap();
}

#[test]
fn tiny_caches_write_back_correctly() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let fetcher = StubFetcher::new().page(
        "doc-one",
        "alpha beta gamma delta epsilon zeta eta theta iota kappa",
        &[],
    );

    let session = open_session(&config);
    // Capacities far below the working set force rotations mid-pass
    let mut index = InvertedIndex::new(2, 2);
    seed(&mut index, &session, "doc-one");
    scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    index.close(&session).unwrap();
    session.commit().unwrap();

    let session = open_session(&config);
    let mut index = InvertedIndex::new(2, 2);
    for word in ["alpha", "kappa", "theta"] {
        let hits = engine::search(&mut index, &session, &[word.to_string()], 0, 10).unwrap();
        assert_eq!(hits.len(), 1, "word {} lost in write-back", word);
    }
    let stats = inverted::stats(&mut index, &session).unwrap();
    assert_eq!(stats.keywords, 10);
    session.rollback().unwrap();
}

#[test]
fn readonly_session_against_missing_store_is_an_empty_index() {
    let config = Config {
        db_path: PathBuf::from("/nonexistent/ferret-test/index.db"),
        readonly: true,
        ..Config::default()
    };
    let session = Session::open_readonly(config).unwrap();
    let mut index = InvertedIndex::new(100, 100);

    let hits = engine::search(&mut index, &session, &["cat".to_string()], 0, 10).unwrap();
    assert!(hits.is_empty());
    assert!(engine::suggest(&session, "ca", 0, 10).unwrap().is_empty());
    let stats = inverted::stats(&mut index, &session).unwrap();
    assert_eq!(stats.keywords, 0);
    assert_eq!(stats.frontier, 0);
}

#[test]
fn rollback_discards_a_failed_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let fetcher = StubFetcher::new().page("doc-one", "cat dog", &[]);

    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    seed(&mut index, &session, "doc-one");
    scheduler::crawl(&mut index, &session, &fetcher, 10).unwrap();
    index.close(&session).unwrap();
    session.rollback().unwrap();

    // Nothing survives the rollback
    let session = open_session(&config);
    let mut index = InvertedIndex::new(100, 100);
    let stats = inverted::stats(&mut index, &session).unwrap();
    assert_eq!(stats.keywords, 0);
    assert_eq!(stats.documents + stats.frontier, 0);
    session.rollback().unwrap();
}

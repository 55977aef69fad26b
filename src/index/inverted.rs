use std::collections::BTreeSet;

use serde::Serialize;

use crate::bitmap::bitset::Bitset;
use crate::cache::generational::GenerationalCache;
use crate::core::error::Result;
use crate::core::session::Session;
use crate::index::document::{self, Document};
use crate::index::keyword::{self, Keyword};

/// Owns the Keyword and Document entities and their write-back caches.
/// All reads go cache-then-store; all mutations happen on cached
/// entities, which the caches persist on rotation. Borrows handed out
/// by the accessors are scoped to the call and must not outlive a
/// flush.
pub struct InvertedIndex {
    keywords: GenerationalCache<String, Keyword>,
    documents: GenerationalCache<String, Document>,
}

impl InvertedIndex {
    pub fn new(keyword_cache_size: usize, document_cache_size: usize) -> Self {
        InvertedIndex {
            keywords: GenerationalCache::new(keyword_cache_size),
            documents: GenerationalCache::new(document_cache_size),
        }
    }

    /// Cache-then-store lookup by normalized word. A total miss with
    /// `readonly` is the ordinary "term unknown" answer, not an error;
    /// otherwise the row is created (score 0, empty bitsets, clean).
    pub fn keyword(
        &mut self,
        session: &Session,
        word: &str,
        readonly: bool,
    ) -> Result<Option<&mut Keyword>> {
        let key = word.to_string();
        let mut flush = |_: &String, kw: &Keyword| keyword::write(session.conn(), kw);

        if !self.keywords.contains(&key) {
            let loaded = match keyword::read(session.conn(), word)? {
                Some(kw) => kw,
                None if readonly => return Ok(None),
                None => {
                    let id = keyword::create(session.conn(), word)?;
                    Keyword {
                        id,
                        word: key.clone(),
                        score: 0,
                        documents: Bitset::new(),
                        neighbours: Bitset::new(),
                        dirty: false,
                    }
                }
            };
            self.keywords.put(key.clone(), loaded, &mut flush)?;
        }
        self.keywords.get_mut(&key, &mut flush)
    }

    /// Cache-then-store lookup by uri; a miss creates a frontier row
    /// (content and distance unset). The flag reports whether the row
    /// was newly created.
    pub fn document(&mut self, session: &Session, uri: &str) -> Result<(&mut Document, bool)> {
        let key = uri.to_string();
        let mut flush = |_: &String, doc: &Document| document::write(session.conn(), doc);

        let mut created = false;
        if !self.documents.contains(&key) {
            let loaded = match document::read(session.conn(), uri)? {
                Some(doc) => doc,
                None => {
                    created = true;
                    let id = document::create(session.conn(), uri)?;
                    Document {
                        id,
                        uri: key.clone(),
                        score: 0,
                        distance: None,
                        referer: None,
                        content: None,
                        dirty: false,
                    }
                }
            };
            self.documents.put(key.clone(), loaded, &mut flush)?;
        }
        let doc = self
            .documents
            .get_mut(&key, &mut flush)?
            .expect("document cached above");
        Ok((doc, created))
    }

    /// Register fetched content for `uri`: store the text, build the
    /// shared co-occurrence bitset over every distinct word, then count
    /// one occurrence per word. Words arrive deduplicated and sorted so
    /// id assignment is deterministic.
    pub fn index_content(
        &mut self,
        session: &Session,
        uri: &str,
        content: &str,
        words: &BTreeSet<String>,
    ) -> Result<()> {
        let doc_id = {
            let (doc, _) = self.document(session, uri)?;
            doc.content = Some(content.to_string());
            doc.dirty = true;
            doc.id
        };

        let mut neighbours = Bitset::new();
        for word in words {
            let Some(kw) = self.keyword(session, word, false)? else {
                continue;
            };
            neighbours.set(kw.id as u64);
        }
        for word in words {
            let Some(kw) = self.keyword(session, word, false)? else {
                continue;
            };
            kw.apply(doc_id, &neighbours);
        }
        Ok(())
    }

    /// Drop a document row and any cached copy of it, so a pending
    /// flush cannot resurrect it.
    pub fn delete_document(&mut self, session: &Session, uri: &str, id: i64) -> Result<()> {
        document::delete(session.conn(), id)?;
        self.documents.remove(&uri.to_string());
        Ok(())
    }

    /// Push every cached document mutation down to the store. Row-level
    /// queries (frontier selection, statistics) read the store directly
    /// and would otherwise miss content, distances and scores still
    /// sitting in the write-back cache. Flushed entries leave the cache
    /// and are re-read on the next access.
    pub fn flush_documents(&mut self, session: &Session) -> Result<()> {
        self.documents
            .close(&mut |_: &String, doc: &Document| document::write(session.conn(), doc))
    }

    /// Flush both caches; must run before the session commits. Once
    /// flushed, entities are discarded and re-read before any further
    /// mutation (the dirty flag is never cleared in place).
    pub fn close(&mut self, session: &Session) -> Result<()> {
        self.documents
            .close(&mut |_: &String, doc: &Document| document::write(session.conn(), doc))?;
        self.keywords
            .close(&mut |_: &String, kw: &Keyword| keyword::write(session.conn(), kw))?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct IndexStats {
    pub keywords: u64,
    pub documents: u64,
    pub max_distance: Option<u32>,
    pub frontier: u64,
}

/// Index statistics as the session currently sees them. Counts come
/// from row-level queries, so cached document state is flushed first.
pub fn stats(index: &mut InvertedIndex, session: &Session) -> Result<IndexStats> {
    index.flush_documents(session)?;
    let conn = session.conn();
    let keywords = conn.query_row("SELECT count(*) FROM keyword", [], |r| r.get(0))?;
    let documents = conn.query_row(
        "SELECT count(*) FROM document WHERE content IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let max_distance = conn.query_row("SELECT max(distance) FROM document", [], |r| r.get(0))?;
    let frontier = conn.query_row(
        "SELECT count(*) FROM document WHERE content IS NULL",
        [],
        |r| r.get(0),
    )?;
    Ok(IndexStats {
        keywords,
        documents,
        max_distance,
        frontier,
    })
}

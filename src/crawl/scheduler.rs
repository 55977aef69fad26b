use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::core::error::Result;
use crate::core::session::Session;
use crate::extract::fetch::Fetcher;
use crate::index::inverted::InvertedIndex;

/// Outcome of one crawl batch, for operator-visible logging.
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Frontier rows successfully fetched this batch.
    pub fetched: usize,
    /// Dead or empty rows pruned from the frontier.
    pub deleted: usize,
    /// Documents newly discovered through links.
    pub discovered: usize,
}

/// Drive fetch → extract → index for up to `batch` frontier documents.
///
/// Frontier rows are taken in `(distance ASC, score DESC, id ASC)`
/// order: strict BFS by layer, popular pages first within a layer, id
/// as the deterministic tie-break. NULL distances sort first, so seeds
/// lead their own layer.
///
/// Per document: fetch failure or an empty yield prunes the row (the
/// frontier is self-healing, there is no retry); otherwise discovered
/// links are registered and relaxed, and produced content is indexed.
/// Repeated calls over a static frontier therefore process disjoint
/// rows and terminate once the frontier drains.
pub fn crawl(
    index: &mut InvertedIndex,
    session: &Session,
    fetcher: &dyn Fetcher,
    batch: usize,
) -> Result<CrawlReport> {
    // Frontier selection reads the store; cached document mutations
    // (content, distances, scores) must reach it first or rows indexed
    // earlier in this session get selected again.
    index.flush_documents(session)?;
    let uris = select_frontier(session, batch)?;
    let mut report = CrawlReport::default();

    for uri in &uris {
        debug!(uri, "fetching");
        let loaded = match fetcher.load(uri) {
            Ok(loaded) => loaded,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(uri, error = %err, "pruning dead frontier row");
                prune(index, session, uri)?;
                report.deleted += 1;
                continue;
            }
        };

        if loaded.is_empty() {
            info!(uri, "no content");
            prune(index, session, uri)?;
            report.deleted += 1;
            continue;
        }

        let (referer_id, referer_distance) = {
            let (doc, _) = index.document(session, uri)?;
            (doc.id, doc.distance)
        };
        report.discovered += register_links(
            index,
            session,
            &loaded.links,
            Some((referer_id, referer_distance)),
        )?;

        match loaded.content {
            Some(content) => {
                {
                    let (doc, _) = index.document(session, uri)?;
                    // A document discovered only as a link already has a
                    // distance from relaxation; only seeds start at 0.
                    if doc.distance.is_none() {
                        doc.distance = Some(0);
                        doc.dirty = true;
                    }
                }
                if session.config.collect_links {
                    // Collect-links-only: the document counts as fetched
                    // (empty content takes it out of the frontier for
                    // good) but nothing is tokenized.
                    let (doc, _) = index.document(session, uri)?;
                    doc.content = Some(String::new());
                    doc.dirty = true;
                } else {
                    index.index_content(session, uri, &content, &loaded.words)?;
                }
                report.fetched += 1;
            }
            None => {
                // Link-only yield (e.g. a places import): nothing will
                // ever be indexed here, so the row must not linger in
                // the frontier.
                prune(index, session, uri)?;
                report.deleted += 1;
            }
        }
    }

    info!(
        fetched = report.fetched,
        deleted = report.deleted,
        discovered = report.discovered,
        "crawl batch done"
    );
    Ok(report)
}

/// Record every discovered link: create missing documents as frontier
/// rows, vote up their scores, and relax distances (`referer distance +
/// 1`, or 1 when the referer is a seed without one). A new inbound edge
/// only ever lowers a distance. Returns how many documents are new.
pub fn register_links(
    index: &mut InvertedIndex,
    session: &Session,
    links: &BTreeSet<String>,
    referer: Option<(i64, Option<u32>)>,
) -> Result<usize> {
    let ref_distance = match referer {
        Some((_, Some(distance))) => distance + 1,
        _ => 1,
    };
    let referer_id = referer.map(|(id, _)| id);

    let mut created_count = 0;
    for link in links {
        let (doc, created) = index.document(session, link)?;
        if created {
            created_count += 1;
        }
        doc.score += 1;
        doc.dirty = true;
        if doc.distance.map_or(true, |d| d > ref_distance) {
            doc.distance = Some(ref_distance);
            doc.referer = referer_id;
        }
    }
    Ok(created_count)
}

fn select_frontier(session: &Session, batch: usize) -> Result<Vec<String>> {
    let mut statement = session.conn().prepare(
        "SELECT uri FROM document WHERE content IS NULL \
         ORDER BY distance ASC, score DESC, id ASC LIMIT ?1",
    )?;
    let rows = statement.query_map([batch as i64], |row| row.get::<_, String>(0))?;
    let mut uris = Vec::new();
    for uri in rows {
        uris.push(uri?);
    }
    Ok(uris)
}

fn prune(index: &mut InvertedIndex, session: &Session, uri: &str) -> Result<()> {
    let id = {
        let (doc, _) = index.document(session, uri)?;
        doc.id
    };
    index.delete_document(session, uri, id)
}

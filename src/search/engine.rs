use rusqlite::params;
use serde::Serialize;

use crate::bitmap::bitset::Bitset;
use crate::bitmap::codec;
use crate::core::error::Result;
use crate::core::session::Session;
use crate::extract::text::fold;
use crate::index::inverted::InvertedIndex;

/// One search result: the document uri and, when a line of the content
/// contains the first query word, a short window around that match.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub uri: String,
    pub snippet: Option<String>,
}

/// A co-occurring term, rarest first.
#[derive(Debug, Serialize)]
pub struct RelatedTerm {
    pub score: u64,
    pub word: String,
}

/// Characters of context kept on each side of a snippet match.
const SNIPPET_RADIUS: usize = 50;

/// How many related terms `neighbours` reports at most.
const NEIGHBOUR_LIMIT: usize = 30;

/// Strict conjunctive search: every query word must be a known keyword
/// and every returned document's bit is set in every matched keyword's
/// `documents` bitset. Frontier rows never match, even if a stale bit
/// still references them. Results come score-descending, paginated.
pub fn search(
    index: &mut InvertedIndex,
    session: &Session,
    words: &[String],
    page: usize,
    length: usize,
) -> Result<Vec<SearchHit>> {
    let folded: Vec<String> = words.iter().map(|w| fold(w)).collect();
    if folded.is_empty() {
        return Ok(Vec::new());
    }

    let mut doc_bits: Option<Bitset> = None;
    for word in &folded {
        let Some(kw) = index.keyword(session, word, true)? else {
            // Any unknown term empties the conjunction
            return Ok(Vec::new());
        };
        doc_bits = Some(match doc_bits {
            None => kw.documents.clone(),
            Some(acc) => acc.and(&kw.documents),
        });
    }

    let ids: Vec<i64> = doc_bits
        .map(|bits| bits.ranks().map(|bit| bit as i64).collect())
        .unwrap_or_default();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let id_list = join_ids(&ids);
    let sql = format!(
        "SELECT uri, content FROM document WHERE id IN ({}) AND content IS NOT NULL \
         ORDER BY score DESC LIMIT ?1 OFFSET ?2",
        id_list
    );
    let mut statement = session.conn().prepare(&sql)?;
    let rows = statement.query_map(
        params![length as i64, (page * length) as i64],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<Vec<u8>>>(1)?,
            ))
        },
    )?;

    let mut hits = Vec::new();
    for row in rows {
        let (uri, blob) = row?;
        let snippet = match blob {
            Some(blob) => snippet(&codec::decompress_text(&blob)?, &folded[0]),
            None => None,
        };
        hits.push(SearchHit { uri, snippet });
    }
    Ok(hits)
}

/// Lexicographic prefix completion over known keywords, paginated and
/// ordered alphabetically.
pub fn suggest(
    session: &Session,
    prefix: &str,
    page: usize,
    length: usize,
) -> Result<Vec<String>> {
    let mut statement = session.conn().prepare(
        "SELECT word FROM keyword WHERE word LIKE ?1 ESCAPE '\\' \
         ORDER BY word LIMIT ?2 OFFSET ?3",
    )?;
    // LIKE metacharacters in the prefix are literal text, not wildcards
    let escaped = fold(prefix)
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let pattern = format!("{}%", escaped);
    let rows = statement.query_map(
        params![pattern, length as i64, (page * length) as i64],
        |row| row.get::<_, String>(0),
    )?;

    let mut words = Vec::new();
    for word in rows {
        words.push(word?);
    }
    Ok(words)
}

/// Terms co-occurring with every given word, rarest first. Like
/// `search`, a single unknown word empties the result.
pub fn neighbours(
    index: &mut InvertedIndex,
    session: &Session,
    words: &[String],
) -> Result<Vec<RelatedTerm>> {
    let mut kw_bits: Option<Bitset> = None;
    for word in words {
        let word = fold(word);
        let Some(kw) = index.keyword(session, &word, true)? else {
            return Ok(Vec::new());
        };
        kw_bits = Some(match kw_bits {
            None => kw.neighbours.clone(),
            Some(acc) => acc.and(&kw.neighbours),
        });
    }

    let ids: Vec<i64> = kw_bits
        .map(|bits| bits.ranks().map(|bit| bit as i64).collect())
        .unwrap_or_default();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT score, word FROM keyword WHERE id IN ({}) \
         ORDER BY score ASC LIMIT {}",
        join_ids(&ids),
        NEIGHBOUR_LIMIT
    );
    let mut statement = session.conn().prepare(&sql)?;
    let rows = statement.query_map([], |row| {
        Ok(RelatedTerm {
            score: row.get::<_, Option<i64>>(0)?.unwrap_or(0) as u64,
            word: row.get(1)?,
        })
    })?;

    let mut terms = Vec::new();
    for term in rows {
        terms.push(term?);
    }
    Ok(terms)
}

/// Find the first line whose folded text contains the folded needle and
/// cut a window of `SNIPPET_RADIUS` characters around the match. The
/// fold may drop or expand characters, so each folded byte is mapped
/// back to the raw character it came from before the window is cut.
fn snippet(content: &str, needle: &str) -> Option<String> {
    for line in content.lines() {
        let mut hay = String::new();
        let mut origin = Vec::new();
        for (char_idx, c) in line.chars().enumerate() {
            let mut buf = [0u8; 4];
            for folded in fold(c.encode_utf8(&mut buf)).chars() {
                hay.push(folded);
                origin.push(char_idx);
            }
        }
        // The fold is ASCII, so byte offsets in it are character offsets
        if let Some(idx) = hay.find(needle) {
            let start = origin[idx].saturating_sub(SNIPPET_RADIUS);
            let window: String = line
                .chars()
                .skip(start)
                .take(2 * SNIPPET_RADIUS + needle.len())
                .collect();
            return Some(window.trim().to_string());
        }
    }
    None
}

/// Ids come from our own bitsets, never from user input.
fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_centers_on_the_match() {
        let content = "first line\nthe quick brown fox jumps over the lazy dog\nlast";
        let got = snippet(content, "fox").unwrap();
        assert!(got.contains("fox"));
        assert!(got.contains("quick"));
    }

    #[test]
    fn snippet_is_absent_without_a_match() {
        assert!(snippet("nothing relevant here", "zebra").is_none());
    }

    #[test]
    fn snippet_matching_is_accent_folded() {
        let content = "le Café du port";
        let got = snippet(content, "cafe").unwrap();
        assert!(got.contains("Café"));
    }

    #[test]
    fn snippet_survives_non_ascii_text_before_the_match() {
        // Characters the fold drops must not shift the window off the match
        let mut line = "漢".repeat(60);
        line.push_str("the target word");
        let got = snippet(&line, "target").unwrap();
        assert!(got.contains("target"));
    }

    #[test]
    fn snippet_windows_long_lines() {
        let mut line = "x".repeat(200);
        line.push_str(" target ");
        line.push_str(&"y".repeat(200));
        let got = snippet(&line, "target").unwrap();
        assert!(got.contains("target"));
        assert!(got.len() <= 2 * SNIPPET_RADIUS + "target".len() + 2);
    }
}

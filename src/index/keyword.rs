use rusqlite::{params, Connection, OptionalExtension};

use crate::bitmap::bitset::Bitset;
use crate::bitmap::codec;
use crate::core::error::Result;

/// Indexed term. `score` counts occurrences across all documents,
/// `documents` has bit *d* set iff document *d* contains the word,
/// `neighbours` has bit *k* set iff keyword *k* co-occurs with this one
/// somewhere. Rows are created on first sight and never deleted.
#[derive(Debug)]
pub struct Keyword {
    pub id: i64,
    pub word: String,
    pub score: u64,
    pub documents: Bitset,
    pub neighbours: Bitset,
    pub dirty: bool,
}

impl Keyword {
    /// Record one occurrence in `doc_id` together with the document's
    /// co-occurrence set. Call at most once per (document, keyword) pair
    /// per indexing pass or the score double-counts.
    pub fn apply(&mut self, doc_id: i64, neighbours: &Bitset) {
        self.dirty = true;
        self.score += 1;
        self.documents.set(doc_id as u64);
        self.neighbours.or_assign(neighbours);
    }
}

pub fn read(conn: &Connection, word: &str) -> Result<Option<Keyword>> {
    let row = conn
        .query_row(
            "SELECT id, score, documents, neighbours FROM keyword WHERE word = ?1",
            params![word],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<u64>>(1)?,
                    row.get::<_, Option<Vec<u8>>>(2)?,
                    row.get::<_, Option<Vec<u8>>>(3)?,
                ))
            },
        )
        .optional()?;

    match row {
        None => Ok(None),
        Some((id, score, documents, neighbours)) => {
            let documents = match documents {
                Some(blob) => codec::decode(&blob)?,
                None => Bitset::new(),
            };
            let neighbours = match neighbours {
                Some(blob) => codec::decode(&blob)?,
                None => Bitset::new(),
            };
            Ok(Some(Keyword {
                id,
                word: word.to_string(),
                score: score.unwrap_or(0),
                documents,
                neighbours,
                dirty: false,
            }))
        }
    }
}

pub fn create(conn: &Connection, word: &str) -> Result<i64> {
    conn.execute("INSERT INTO keyword (word) VALUES (?1)", params![word])?;
    Ok(conn.last_insert_rowid())
}

/// Write-back callback target: a no-op for clean keywords.
pub fn write(conn: &Connection, keyword: &Keyword) -> Result<()> {
    if !keyword.dirty {
        return Ok(());
    }
    let documents = codec::encode(&keyword.documents)?;
    let neighbours = codec::encode(&keyword.neighbours)?;
    conn.execute(
        "UPDATE keyword SET score = ?1, documents = ?2, neighbours = ?3 WHERE id = ?4",
        params![keyword.score as i64, documents, neighbours, keyword.id],
    )?;
    Ok(())
}

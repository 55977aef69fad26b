use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::bitmap::codec;
use crate::core::error::Result;

/// Indexed or frontier page/file. `content` absent means the document
/// is still in the frontier: known through a link but not yet fetched.
/// `distance` is the BFS depth from a seed, absent until first
/// discovered; `referer` is the document whose link established it.
#[derive(Debug)]
pub struct Document {
    pub id: i64,
    pub uri: String,
    pub score: u64,
    pub distance: Option<u32>,
    pub referer: Option<i64>,
    pub content: Option<String>,
    pub dirty: bool,
}

impl Document {
    pub fn is_frontier(&self) -> bool {
        self.content.is_none()
    }
}

pub fn read(conn: &Connection, uri: &str) -> Result<Option<Document>> {
    let row = conn
        .query_row(
            "SELECT id, score, distance, referer, content FROM document WHERE uri = ?1",
            params![uri],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<u64>>(1)?,
                    row.get::<_, Option<u32>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<Vec<u8>>>(4)?,
                ))
            },
        )
        .optional()?;

    match row {
        None => Ok(None),
        Some((id, score, distance, referer, content)) => {
            let content = match content {
                Some(blob) => Some(codec::decompress_text(&blob)?),
                None => None,
            };
            Ok(Some(Document {
                id,
                uri: uri.to_string(),
                score: score.unwrap_or(0),
                distance,
                referer,
                content,
                dirty: false,
            }))
        }
    }
}

pub fn create(conn: &Connection, uri: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO document (uri, score, timestamp) VALUES (?1, 0, ?2)",
        params![uri, Utc::now().timestamp()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Write-back callback target: a no-op for clean documents.
pub fn write(conn: &Connection, document: &Document) -> Result<()> {
    if !document.dirty {
        return Ok(());
    }
    let content = match &document.content {
        Some(text) => Some(codec::compress_text(text)?),
        None => None,
    };
    conn.execute(
        "UPDATE document SET score = ?1, distance = ?2, referer = ?3, content = ?4 \
         WHERE id = ?5",
        params![
            document.score as i64,
            document.distance,
            document.referer,
            content,
            document.id
        ],
    )?;
    Ok(())
}

/// Remove a row entirely; dead and unreachable links are pruned, not
/// retried.
pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM document WHERE id = ?1", params![id])?;
    Ok(())
}

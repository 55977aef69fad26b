use rusqlite::{Connection, OpenFlags};

use crate::core::config::Config;
use crate::core::error::Result;

/// Schema is created lazily on every read-write open; ids are SQLite
/// rowids and therefore start at 1, which keeps bit 0 of every bitset
/// unused.
const INIT_SQL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS keyword (id INTEGER PRIMARY KEY, word VARCHAR, \
     score INTEGER, documents BLOB, neighbours BLOB)",
    "CREATE UNIQUE INDEX IF NOT EXISTS keyword_index ON keyword (word)",
    "CREATE TABLE IF NOT EXISTS document (id INTEGER PRIMARY KEY, uri VARCHAR, \
     score INTEGER, distance INTEGER, referer INTEGER REFERENCES document (id), \
     timestamp INTEGER, content TEXT)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uri_index ON document (uri)",
];

/// One exclusive session per invocation: the store connection, its
/// active transaction, and a config snapshot. Replaces any notion of
/// process-wide mutable state; everything that touches the store takes
/// a `&Session`.
pub struct Session {
    conn: Connection,
    pub config: Config,
}

impl Session {
    /// Open a read-write session: create the schema if needed and start
    /// the one transaction the whole invocation runs inside.
    pub fn open(config: Config) -> Result<Session> {
        let conn = Connection::open(&config.db_path)?;
        for query in INIT_SQL {
            conn.execute(query, [])?;
        }
        conn.execute_batch("BEGIN")?;
        Ok(Session { conn, config })
    }

    /// Open a read-only session. A missing store is not an error: it
    /// behaves as an empty index (backed by a throwaway in-memory
    /// schema so queries still parse).
    pub fn open_readonly(config: Config) -> Result<Session> {
        if !config.db_path.exists() {
            let conn = Connection::open_in_memory()?;
            for query in INIT_SQL {
                conn.execute(query, [])?;
            }
            return Ok(Session { conn, config });
        }
        let conn = Connection::open_with_flags(
            &config.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Ok(Session { conn, config })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Commit the session transaction. Callers must flush the index
    /// caches first; mutations still sitting in a cache are lost to the
    /// store otherwise.
    pub fn commit(self) -> Result<()> {
        if !self.config.readonly {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    /// Roll back everything since the session opened.
    pub fn rollback(self) -> Result<()> {
        if !self.config.readonly {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or subprocess failure while fetching a URI.
    Fetch,
    /// Charset or unicode failure while decoding fetched bytes.
    Decode,
    /// The fetched resource has a content type we cannot extract.
    UnsupportedContentType,
    /// Store-level read/write or transaction failure.
    Store,
    /// Write-back callback failure during cache rotation.
    CacheFlush,
    Io,
    InvalidInput,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn fetch(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Fetch, context.into())
    }

    pub fn decode(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Decode, context.into())
    }

    pub fn unsupported(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::UnsupportedContentType, context.into())
    }

    /// Store and cache-flush failures abort the whole session; everything
    /// else is recovered locally by pruning the offending frontier row.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::Store | ErrorKind::CacheFlush)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error {
            kind: ErrorKind::Store,
            context: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error {
            kind: ErrorKind::Fetch,
            context: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use encoding_rs::Encoding;
use rusqlite::OpenFlags;
use tracing::warn;
use url::Url;

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::extract::html;
use crate::extract::text;

/// What one fetch yields: extracted text (absent for link-only
/// sources), its distinct normalized tokens, and the outbound links.
#[derive(Debug)]
pub struct Loaded {
    pub content: Option<String>,
    pub words: BTreeSet<String>,
    pub links: BTreeSet<String>,
}

impl Loaded {
    pub fn empty() -> Self {
        Loaded {
            content: None,
            words: BTreeSet::new(),
            links: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.links.is_empty()
    }
}

/// Content/link extraction collaborator. The crawl loop only sees this
/// trait; tests drive the scheduler with a scripted implementation.
pub trait Fetcher {
    fn load(&self, uri: &str) -> Result<Loaded>;
}

/// Production fetcher: http/https pages over a blocking client with a
/// bounded timeout, local text/HTML/PDF files, and the `:firefox`
/// pseudo-URI that harvests links from a Firefox places database.
pub struct WebFetcher {
    client: reqwest::blocking::Client,
    encoding: String,
    firefox_profile: Option<PathBuf>,
}

/// Pseudo-URI that imports browsing history as frontier links.
pub const FIREFOX_URI: &str = ":firefox";

const DEFAULT_HTTP_CHARSET: &str = "ISO-8859-1";

impl WebFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;
        Ok(WebFetcher {
            client,
            encoding: config.encoding.clone(),
            firefox_profile: config.firefox_profile.clone(),
        })
    }

    fn load_http(&self, uri: &str) -> Result<Loaded> {
        let response = self.client.get(uri).send()?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let (media_type, charset) = split_content_type(&content_type);

        match media_type.as_str() {
            "text/html" | "text/plain" | "" => {}
            "application/pdf" => {
                return Err(Error::unsupported(format!(
                    "PDF download not yet supported ({})",
                    uri
                )))
            }
            other => {
                return Err(Error::unsupported(format!(
                    "content type \"{}\" not supported ({})",
                    other, uri
                )))
            }
        }

        let bytes = response.bytes()?;
        let label = charset.unwrap_or_else(|| DEFAULT_HTTP_CHARSET.to_string());
        let encoding = Encoding::for_label(label.as_bytes())
            .unwrap_or(encoding_rs::WINDOWS_1252);
        // Servers lie about charsets; decode permissively here and keep
        // strict decoding for operator-supplied local files.
        let (data, _, _) = encoding.decode(&bytes);

        if data.trim().is_empty() {
            return Ok(Loaded::empty());
        }
        match media_type.as_str() {
            "text/html" | "" => Ok(from_html(&data, uri)),
            _ => Ok(from_text(&data)),
        }
    }

    fn load_file(&self, path: &str) -> Result<Loaded> {
        if path.ends_with(".pdf") {
            return self.load_pdf(path);
        }
        let bytes = std::fs::read(path)
            .map_err(|e| Error::fetch(format!("unable to read {}: {}", path, e)))?;

        let encoding = Encoding::for_label(self.encoding.as_bytes()).ok_or_else(|| {
            Error::new(
                crate::core::error::ErrorKind::InvalidInput,
                format!("unknown encoding \"{}\"", self.encoding),
            )
        })?;
        let (data, _, had_errors) = encoding.decode(&bytes);
        if had_errors {
            return Err(Error::decode(format!(
                "unable to load {} as {}",
                path, self.encoding
            )));
        }
        if data.trim().is_empty() {
            return Ok(Loaded::empty());
        }

        if path.ends_with(".html") || path.ends_with(".htm") {
            let base = Url::from_file_path(Path::new(path))
                .map(|u| u.to_string())
                .unwrap_or_default();
            Ok(from_html(&data, &base))
        } else {
            Ok(from_text(&data))
        }
    }

    fn load_pdf(&self, path: &str) -> Result<Loaded> {
        let output = Command::new("pdftotext")
            .args(["-enc", "UTF-8", path, "-"])
            .output()
            .map_err(|e| Error::fetch(format!("pdftotext failed for {}: {}", path, e)))?;
        if !output.status.success() {
            return Err(Error::fetch(format!(
                "pdftotext exited with {} for {}",
                output.status, path
            )));
        }
        let data = String::from_utf8(output.stdout)
            .map_err(|e| Error::decode(format!("pdftotext output for {}: {}", path, e)))?;
        if data.trim().is_empty() {
            return Ok(Loaded::empty());
        }
        Ok(from_text(&data))
    }

    /// Read every titled URL out of the profile's places.sqlite. Yields
    /// links only; the pseudo-document itself has nothing to index.
    fn load_firefox_places(&self) -> Result<Loaded> {
        let profile = self.firefox_profile.as_ref().ok_or_else(|| {
            Error::fetch("option \"firefox_profile\" undefined, cannot read places")
        })?;
        if !profile.is_dir() {
            return Err(Error::fetch(format!(
                "firefox profile path {} not found",
                profile.display()
            )));
        }
        let places = profile.join("places.sqlite");
        let conn = rusqlite::Connection::open_with_flags(
            &places,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| Error::fetch(format!("unable to open {}: {}", places.display(), e)))?;

        let mut statement =
            conn.prepare("SELECT url FROM moz_places WHERE title IS NOT NULL")?;
        let mut links = BTreeSet::new();
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        for url in rows {
            links.insert(url?);
        }

        Ok(Loaded {
            content: None,
            words: BTreeSet::new(),
            links,
        })
    }
}

impl Fetcher for WebFetcher {
    fn load(&self, uri: &str) -> Result<Loaded> {
        if uri == FIREFOX_URI {
            return self.load_firefox_places();
        }
        match Url::parse(uri) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => self.load_http(uri),
            Ok(url) => {
                warn!(uri, scheme = url.scheme(), "unsupported uri scheme");
                Err(Error::unsupported(format!(
                    "scheme \"{}\" not supported ({})",
                    url.scheme(),
                    uri
                )))
            }
            // Not a URL: treat as a local path
            Err(_) => self.load_file(uri),
        }
    }
}

fn from_html(data: &str, base: &str) -> Loaded {
    let page = html::parse_html(data, base);
    Loaded {
        content: Some(data.to_string()),
        words: page.words,
        links: page.links,
    }
}

fn from_text(data: &str) -> Loaded {
    Loaded {
        content: Some(data.to_string()),
        words: text::words(data),
        links: BTreeSet::new(),
    }
}

fn split_content_type(header: &str) -> (String, Option<String>) {
    let mut parts = header.split(';');
    let media_type = parts.next().unwrap_or("").trim().to_ascii_lowercase();
    let charset = parts
        .filter_map(|p| p.trim().strip_prefix("charset="))
        .map(|c| c.trim_matches('"').to_string())
        .next();
    (media_type, charset)
}

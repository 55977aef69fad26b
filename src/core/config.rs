use std::path::PathBuf;

/// Typed session configuration, snapshotted once per invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub readonly: bool,
    pub encoding: String,
    pub page: usize,
    pub length: usize,
    pub collect_links: bool,
    pub firefox_profile: Option<PathBuf>,
    pub fetch_timeout_secs: u64,

    // Cache capacities, one per entity type
    pub keyword_cache_size: usize,
    pub document_cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("ferret.db"),
            readonly: false,
            encoding: "utf-8".to_string(),
            page: 0,
            length: 10,
            collect_links: false,
            firefox_profile: None,
            fetch_timeout_secs: 5,

            keyword_cache_size: 10_000,
            document_cache_size: 1_000,
        }
    }
}

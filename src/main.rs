use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use ferret::core::config::Config;
use ferret::core::error::{Error, ErrorKind, Result};
use ferret::core::session::Session;
use ferret::crawl::scheduler;
use ferret::extract::fetch::WebFetcher;
use ferret::index::inverted::{self, InvertedIndex};
use ferret::search::engine;

#[derive(Parser)]
#[command(version, about = "Personal crawler and full-text indexer")]
struct Cli {
    /// Path of the index database
    #[arg(long, default_value = "ferret.db")]
    db: PathBuf,

    /// Open the store read-only (search-only sessions)
    #[arg(long, default_value_t = false)]
    readonly: bool,

    /// Text encoding used to decode local files
    #[arg(long, default_value = "utf-8")]
    encoding: String,

    /// Only collect outbound links, do not index page content
    #[arg(long, default_value_t = false)]
    collect_links: bool,

    /// Firefox profile directory for the :firefox pseudo-URI
    #[arg(long)]
    firefox_profile: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Register seed URIs as frontier documents
    Add { uris: Vec<String> },
    /// Fetch and index up to COUNT frontier documents
    Crawl {
        #[arg(default_value_t = 10)]
        count: usize,
    },
    /// Conjunctive keyword search
    Search {
        words: Vec<String>,
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        length: usize,
    },
    /// Complete a keyword prefix
    Suggest {
        prefix: String,
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        length: usize,
    },
    /// Terms co-occurring with every given word
    Neighbours { words: Vec<String> },
    /// Index statistics
    Stat {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "session aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // Query commands never need write access
    let readonly = cli.readonly
        || matches!(
            cli.cmd,
            Cmd::Search { .. } | Cmd::Suggest { .. } | Cmd::Neighbours { .. } | Cmd::Stat { .. }
        );
    if readonly && matches!(cli.cmd, Cmd::Add { .. } | Cmd::Crawl { .. }) {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "crawl and add need a read-write session".to_string(),
        ));
    }

    let config = session_config(&cli, readonly);

    let session = if readonly {
        Session::open_readonly(config.clone())?
    } else {
        Session::open(config.clone())?
    };
    let mut index = InvertedIndex::new(config.keyword_cache_size, config.document_cache_size);

    match dispatch(&cli.cmd, &mut index, &session) {
        Ok(()) => {
            // Flush write-back caches before the transaction commits
            if !readonly {
                index.close(&session)?;
            }
            session.commit()
        }
        Err(err) => {
            let _ = session.rollback();
            Err(err)
        }
    }
}

/// Snapshot the command line into the session config, pagination
/// included. Commands without pagination keep the defaults.
fn session_config(cli: &Cli, readonly: bool) -> Config {
    let defaults = Config::default();
    let (page, length) = match &cli.cmd {
        Cmd::Search { page, length, .. } | Cmd::Suggest { page, length, .. } => (*page, *length),
        _ => (defaults.page, defaults.length),
    };
    Config {
        db_path: cli.db.clone(),
        readonly,
        encoding: cli.encoding.clone(),
        page,
        length,
        collect_links: cli.collect_links,
        firefox_profile: cli.firefox_profile.clone(),
        ..defaults
    }
}

fn dispatch(cmd: &Cmd, index: &mut InvertedIndex, session: &Session) -> Result<()> {
    match cmd {
        Cmd::Add { uris } => {
            for uri in uris {
                let (_, created) = index.document(session, uri)?;
                if created {
                    println!("added {}", uri);
                } else {
                    println!("already known {}", uri);
                }
            }
            Ok(())
        }
        Cmd::Crawl { count } => {
            let fetcher = WebFetcher::new(&session.config)?;
            let report = scheduler::crawl(index, session, &fetcher, *count)?;
            println!(
                "fetched {}, pruned {}, discovered {}",
                report.fetched, report.deleted, report.discovered
            );
            Ok(())
        }
        Cmd::Search { words, .. } => {
            let cfg = &session.config;
            for hit in engine::search(index, session, words, cfg.page, cfg.length)? {
                match hit.snippet {
                    Some(snippet) => println!("{}\n    {}", hit.uri, snippet),
                    None => println!("{}", hit.uri),
                }
            }
            Ok(())
        }
        Cmd::Suggest { prefix, .. } => {
            let cfg = &session.config;
            for word in engine::suggest(session, prefix, cfg.page, cfg.length)? {
                println!("{}", word);
            }
            Ok(())
        }
        Cmd::Neighbours { words } => {
            for term in engine::neighbours(index, session, words)? {
                println!("{:>8}  {}", term.score, term.word);
            }
            Ok(())
        }
        Cmd::Stat { json } => {
            let stats = inverted::stats(index, session)?;
            if *json {
                let rendered = serde_json::to_string_pretty(&stats).map_err(|e| {
                    Error::new(ErrorKind::InvalidInput, e.to_string())
                })?;
                println!("{}", rendered);
            } else {
                println!("keywords        {}", stats.keywords);
                println!("documents       {}", stats.documents);
                println!(
                    "max distance    {}",
                    stats
                        .max_distance
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
                println!("frontier        {}", stats.frontier);
            }
            Ok(())
        }
    }
}

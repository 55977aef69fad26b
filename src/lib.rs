pub mod core;
pub mod bitmap;
pub mod cache;
pub mod index;
pub mod extract;
pub mod crawl;
pub mod search;

/*
┌─────────────────────────────────────────────────────────────────────────┐
│                         FERRET ARCHITECTURE                             │
└─────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────── CORE LAYER ───────────────────────────────┐
│  struct Session          // store connection + active transaction       │
│  struct Config           // typed invocation snapshot                   │
│  struct Error / ErrorKind // Fetch/Decode/Unsupported recover locally,  │
│                           // Store/CacheFlush abort the session         │
└─────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────── INDEXING LAYER ─────────────────────────────┐
│  struct InvertedIndex                                                   │
│    keywords:  GenerationalCache<String, Keyword>   // capacity 10 000   │
│    documents: GenerationalCache<String, Document>  // capacity 1 000    │
│                                                                         │
│  struct Keyword  { id, word, score, documents: Bitset,                  │
│                    neighbours: Bitset, dirty }                          │
│  struct Document { id, uri, score, distance, referer, content, dirty }  │
│  struct Bitset   // grow-only bit-vector, bit 0 reserved                │
│  bitmap::codec   // minimal big-endian image + zstd, bit-exact          │
└─────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────── CRAWL LAYER ───────────────────────────────┐
│  crawl::scheduler  // BFS frontier: (distance asc, score desc, id asc)  │
│  trait Fetcher     // load(uri) -> (content?, words, links)             │
│  struct WebFetcher // http/https, local files, pdftotext, :firefox      │
└─────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────── SEARCH LAYER ──────────────────────────────┐
│  search::engine  // conjunctive bitset AND + snippets,                  │
│                  // prefix suggestion, co-occurrence neighbours         │
└─────────────────────────────────────────────────────────────────────────┘

  Session ──owns──> Connection ──schema──> keyword / document tables
  CrawlScheduler ──fetches──> Fetcher ──yields──> Loaded
  CrawlScheduler ──registers──> InvertedIndex ──mutates──> cached entities
  GenerationalCache ──rotation──> write-back ──UPDATE──> store
  SearchEngine ──reads──> InvertedIndex ──cache-then-store──> rows
*/

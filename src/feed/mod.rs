mod fetcher;
mod parser;

pub use fetcher::{EntrySource, FetchError, HttpFetcher};
pub use parser::{parse_entries, Entry};

// src/page/mod.rs
// =============================================================================
// The primary page: fetching it (fatal on failure), undoing its
// Content-Encoding and parsing it into PageFacts plus the URL sets to probe.
// =============================================================================

mod encoding;
mod fetch;
mod parse;

pub use encoding::{decode_body, ACCEPT_ENCODING};
pub use fetch::{check_page, FetchedPage, HttpPageFetcher, PageFetcher};
pub use parse::{parse_page, ParsedPage};

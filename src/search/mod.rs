//! Two-phase search: keyword scan, then structural extraction

pub mod coordinator;
pub mod errors;
pub mod extractor;
pub mod scanner;

pub use coordinator::{SearchRequest, SearchResultItem, perform_search};
pub use errors::{SearchError, SearchResult};
pub use extractor::extract_text_with_selector;
pub use scanner::scan_files_for_keywords;

//! URL canonicalisation, path mapping, and the SSRF guard
//!
//! Everything keyed on a URL (visited set, index rows, local paths) goes
//! through [`canonical::canonicalize`] first so there is exactly one key
//! per page.

pub mod canonical;
pub mod path_map;
pub mod ssrf;

pub use canonical::{authority, canonicalize, resolve_link};
pub use path_map::{MappedPath, ensure_contained, ext_for_content_type};
pub use ssrf::{SsrfVerdict, check_url};

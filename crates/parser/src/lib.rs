pub mod html;
pub mod url;

pub use html::{extract_article, extract_links, hash_bytes};
pub use url::{canonicalize, identify_source, is_article, is_excluded};

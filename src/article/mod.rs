mod messaging;
mod source;

pub use messaging::SharedEndpoint;
pub use source::{Citation, FileSource, extract_article, locate_quote, normalize_quote};

#[cfg(test)]
pub(crate) use messaging::tests::LazyEndpoint;
#[cfg(test)]
pub(crate) use source::QuoteMatch;

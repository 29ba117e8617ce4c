use std::fs;
use std::path::PathBuf;
use std::sync::{MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::PipelineError;

use super::messaging::{
    ContentEndpoint, ContentReply, ContentRequest, DeliveryError, RETRY_DELAY, SharedEndpoint,
    send_with_retry,
};

pub const MIN_ARTICLE_CHARS: usize = 100;

const MIN_QUOTE_CHARS: usize = 5;

const QUOTE_MARKS: &[char] = &['"', '\'', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}'];

const CONTEXT_CHARS: usize = 80;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuoteMatch {
    pub start: usize,
    pub end: usize,
}

impl QuoteMatch {
    pub fn context<'a>(&self, text: &'a str, radius: usize) -> (&'a str, &'a str, &'a str) {
        let before_start = text[..self.start]
            .char_indices()
            .rev()
            .nth(radius.saturating_sub(1))
            .map(|(index, _)| index)
            .unwrap_or(0);
        let after_end = text[self.end..]
            .char_indices()
            .nth(radius)
            .map(|(index, _)| self.end + index)
            .unwrap_or(text.len());
        (
            &text[before_start..self.start],
            &text[self.start..self.end],
            &text[self.end..after_end],
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Citation {
    pub range: QuoteMatch,
    pub before: String,
    pub quote: String,
    pub after: String,
}

impl Citation {
    pub fn new(text: &str, range: QuoteMatch) -> Self {
        let (before, quote, after) = range.context(text, CONTEXT_CHARS);
        Self {
            range,
            before: before.to_owned(),
            quote: quote.to_owned(),
            after: after.to_owned(),
        }
    }
}

pub struct FileSource {
    path: PathBuf,
    text: Option<String>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            text: None,
        }
    }
}

impl ContentEndpoint for FileSource {
    fn deliver(&mut self, request: &ContentRequest) -> Result<ContentReply, DeliveryError> {
        let Some(text) = &self.text else {
            return Err(DeliveryError::NotReady);
        };

        match request {
            ContentRequest::ExtractText => {
                let trimmed = text.trim();
                Ok(ContentReply::Text(
                    (!trimmed.is_empty()).then(|| trimmed.to_owned()),
                ))
            }
            ContentRequest::FindText(quote) => Ok(ContentReply::Found(
                find_quote(text, quote).map(|range| Citation::new(text, range)),
            )),
        }
    }

    fn install(&mut self) -> Result<(), DeliveryError> {
        let text = fs::read_to_string(&self.path).map_err(|error| {
            DeliveryError::Failed(format!("cannot read {}: {error}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), bytes = text.len(), "article loaded");
        self.text = Some(text);
        Ok(())
    }
}

fn lock_endpoint(
    endpoint: &SharedEndpoint,
) -> MutexGuard<'_, dyn ContentEndpoint + 'static> {
    endpoint.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn check_article_length(text: &str) -> Result<&str, PipelineError> {
    let text = text.trim();
    let chars = text.chars().count();
    if chars < MIN_ARTICLE_CHARS {
        return Err(PipelineError::Extraction(format!(
            "Article text too short ({chars} characters). This page may be behind a paywall or \
             have no readable content."
        )));
    }
    Ok(text)
}

pub fn extract_article(endpoint: &SharedEndpoint) -> Result<String, PipelineError> {
    let reply = {
        let mut guard = lock_endpoint(endpoint);
        send_with_retry(&mut *guard, &ContentRequest::ExtractText, RETRY_DELAY)?
    };

    match reply {
        ContentReply::Text(Some(text)) => {
            let text = check_article_length(&text)?;
            info!(chars = text.chars().count(), "article extracted");
            Ok(text.to_owned())
        }
        ContentReply::Text(None) => Err(PipelineError::Extraction(
            "Failed to extract article text. This page may be behind a paywall or have no \
             readable content."
                .to_owned(),
        )),
        ContentReply::Found(_) => Err(PipelineError::Messaging(
            "unexpected reply to an extraction request".to_owned(),
        )),
    }
}

pub fn normalize_quote(quote: &str) -> Option<&str> {
    let cleaned = quote.trim().trim_matches(QUOTE_MARKS).trim();
    (cleaned.chars().count() >= MIN_QUOTE_CHARS).then_some(cleaned)
}

pub fn find_quote(text: &str, quote: &str) -> Option<QuoteMatch> {
    let needle = normalize_quote(quote)?.to_ascii_lowercase();
    let haystack = text.to_ascii_lowercase();
    haystack.find(&needle).map(|start| QuoteMatch {
        start,
        end: start + needle.len(),
    })
}

pub fn locate_quote(
    endpoint: &SharedEndpoint,
    quote: &str,
) -> Result<Option<Citation>, PipelineError> {
    if normalize_quote(quote).is_none() {
        return Ok(None);
    }

    let mut guard = lock_endpoint(endpoint);
    match send_with_retry(
        &mut *guard,
        &ContentRequest::FindText(quote.to_owned()),
        RETRY_DELAY,
    )? {
        ContentReply::Found(found) => Ok(found),
        ContentReply::Text(_) => Err(PipelineError::Messaging(
            "unexpected reply to a find request".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::article::messaging::tests::LazyEndpoint;

    fn shared(endpoint: LazyEndpoint) -> (Arc<Mutex<LazyEndpoint>>, SharedEndpoint) {
        let concrete = Arc::new(Mutex::new(endpoint));
        let shared: SharedEndpoint = concrete.clone();
        (concrete, shared)
    }

    #[test]
    fn length_guard_is_inclusive_at_one_hundred() {
        assert!(matches!(
            check_article_length(&"a".repeat(99)),
            Err(PipelineError::Extraction(_))
        ));
        assert!(check_article_length(&"a".repeat(100)).is_ok());
        assert!(check_article_length(&format!("  {}  ", "a".repeat(99))).is_err());
    }

    #[test]
    fn length_counts_characters() {
        assert!(check_article_length(&"é".repeat(100)).is_ok());
        assert!(check_article_length(&"é".repeat(60)).is_err());
    }

    #[test]
    fn extraction_reports_unavailable_text() {
        let (_, endpoint) = shared(LazyEndpoint::ready(None));
        assert!(matches!(extract_article(&endpoint), Err(PipelineError::Extraction(_))));
    }

    #[test]
    fn file_source_loads_on_install() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("article.txt");
        fs::write(&path, format!("\n\n{}\n", "word ".repeat(40))).unwrap();

        let mut source = FileSource::new(&path);
        assert!(matches!(
            source.deliver(&ContentRequest::ExtractText),
            Err(DeliveryError::NotReady)
        ));

        let shared: SharedEndpoint = Arc::new(Mutex::new(FileSource::new(&path)));
        let text = extract_article(&shared).unwrap();
        assert!(text.starts_with("word"));
        assert!(text.ends_with("word"));
    }

    #[test]
    fn missing_file_is_a_messaging_failure() {
        let shared: SharedEndpoint = Arc::new(Mutex::new(FileSource::new("/nonexistent/a.txt")));
        assert!(matches!(extract_article(&shared), Err(PipelineError::Messaging(_))));
    }

    #[test]
    fn quotes_are_normalized() {
        assert_eq!(normalize_quote("  \"Hello world\" "), Some("Hello world"));
        assert_eq!(normalize_quote("\u{201c}Smart quotes\u{201d}"), Some("Smart quotes"));
        assert_eq!(normalize_quote("'abc'"), None);
        assert_eq!(normalize_quote(""), None);
    }

    #[test]
    fn find_is_case_insensitive() {
        let text = "The Quick brown fox jumps.";
        assert_eq!(
            find_quote(text, "quick BROWN"),
            Some(QuoteMatch { start: 4, end: 15 })
        );
        assert_eq!(find_quote(text, "slow brown"), None);
    }

    #[test]
    fn empty_quote_is_not_sent() {
        let (concrete, endpoint) = shared(LazyEndpoint::ready(Some("text")));
        assert_eq!(locate_quote(&endpoint, "   ").unwrap(), None);
        assert_eq!(concrete.lock().unwrap().deliveries, 0);

        assert_eq!(locate_quote(&endpoint, "long enough").unwrap(), None);
        assert_eq!(concrete.lock().unwrap().deliveries, 1);
    }

    #[test]
    fn file_source_returns_quote_in_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("article.txt");
        fs::write(&path, "Rivers carve valleys. Glaciers Carve Fjords slowly.").unwrap();
        let shared: SharedEndpoint = Arc::new(Mutex::new(FileSource::new(&path)));

        let citation = locate_quote(&shared, "\"glaciers carve fjords\"").unwrap().unwrap();

        assert_eq!(citation.quote, "Glaciers Carve Fjords");
        assert_eq!(citation.before, "Rivers carve valleys. ");
        assert_eq!(citation.after, " slowly.");
        assert_eq!(locate_quote(&shared, "volcanoes").unwrap(), None);
    }

    #[test]
    fn context_window_is_character_based() {
        let text = "aaaaé quote ébbbb";
        let found = find_quote(text, "quote").unwrap();
        assert_eq!(found.context(text, 2), ("é ", "quote", " é"));
        assert_eq!(found.context(text, 100), ("aaaaé ", "quote", " ébbbb"));
    }
}

use std::time::{Duration, Instant};

use tracing::debug;

use crate::article::{Citation, normalize_quote};

pub const NOT_FOUND_RESET: Duration = Duration::from_secs(2);

static IDLE: CitationStatus = CitationStatus::Idle;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CitationStatus {
    #[default]
    Idle,
    Searching {
        node_id: String,
    },
    Found {
        node_id: String,
        citation: Citation,
    },
    NotFound {
        node_id: String,
        since: Instant,
    },
}

impl CitationStatus {
    fn node_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Searching { node_id }
            | Self::Found { node_id, .. }
            | Self::NotFound { node_id, .. } => Some(node_id),
        }
    }
}

#[derive(Default)]
pub struct CitationLookup {
    status: CitationStatus,
}

impl CitationLookup {
    #[cfg(test)]
    pub fn status(&self) -> &CitationStatus {
        &self.status
    }

    pub fn begin(&mut self, node_id: &str, quote: &str, now: Instant) -> bool {
        if normalize_quote(quote).is_none() {
            self.status = CitationStatus::NotFound {
                node_id: node_id.to_owned(),
                since: now,
            };
            return false;
        }
        self.status = CitationStatus::Searching {
            node_id: node_id.to_owned(),
        };
        true
    }

    pub fn finish(&mut self, node_id: &str, citation: Option<Citation>, now: Instant) {
        if !matches!(&self.status, CitationStatus::Searching { node_id: pending } if pending == node_id)
        {
            debug!(node = node_id, "dropping stale quote lookup");
            return;
        }

        self.status = match citation {
            Some(citation) => {
                debug!(node = node_id, start = citation.range.start, "quote located");
                CitationStatus::Found {
                    node_id: node_id.to_owned(),
                    citation,
                }
            }
            None => CitationStatus::NotFound {
                node_id: node_id.to_owned(),
                since: now,
            },
        };
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        match self.status {
            CitationStatus::Searching { .. } => true,
            CitationStatus::NotFound { since, .. } => {
                if now.saturating_duration_since(since) >= NOT_FOUND_RESET {
                    self.status = CitationStatus::Idle;
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.status = CitationStatus::Idle;
    }

    pub fn status_for(&self, node_id: &str) -> &CitationStatus {
        if self.status.node_id() == Some(node_id) {
            &self.status
        } else {
            &IDLE
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::article::QuoteMatch;

    fn citation() -> Citation {
        Citation::new("an article quote here", QuoteMatch { start: 3, end: 16 })
    }

    #[test]
    fn empty_quote_reports_not_found_without_searching() {
        let mut lookup = CitationLookup::default();

        assert!(!lookup.begin("p1", "", Instant::now()));
        assert!(!lookup.begin("p1", "\u{201c}ab\u{201d}", Instant::now()));

        assert!(matches!(lookup.status(), CitationStatus::NotFound { .. }));
    }

    #[test]
    fn answer_completes_the_pending_lookup() {
        let mut lookup = CitationLookup::default();
        let now = Instant::now();

        assert!(lookup.begin("p1", "article quote", now));
        assert!(lookup.tick(now));
        lookup.finish("p1", Some(citation()), now);

        assert_eq!(
            lookup.status(),
            &CitationStatus::Found {
                node_id: "p1".to_owned(),
                citation: citation(),
            }
        );
        assert_eq!(citation().quote, "article quote");
    }

    #[test]
    fn answer_for_another_node_is_ignored() {
        let mut lookup = CitationLookup::default();
        let now = Instant::now();
        lookup.begin("p1", "article quote", now);
        lookup.begin("d1", "article quote", now);

        lookup.finish("p1", Some(citation()), now);
        assert_eq!(
            lookup.status(),
            &CitationStatus::Searching {
                node_id: "d1".to_owned()
            }
        );

        lookup.reset();
        lookup.finish("d1", Some(citation()), now);
        assert_eq!(lookup.status(), &CitationStatus::Idle);
    }

    #[test]
    fn not_found_resets_after_two_seconds() {
        let mut lookup = CitationLookup::default();
        let now = Instant::now();
        lookup.begin("p1", "missing quote", now);
        lookup.finish("p1", None, now);

        assert!(lookup.tick(now + Duration::from_millis(1_999)));
        assert!(matches!(lookup.status(), CitationStatus::NotFound { .. }));

        assert!(!lookup.tick(now + NOT_FOUND_RESET));
        assert_eq!(lookup.status(), &CitationStatus::Idle);
    }

    #[test]
    fn status_is_scoped_to_its_node() {
        let mut lookup = CitationLookup::default();
        lookup.begin("p1", "", Instant::now());

        assert_eq!(lookup.status_for("d1"), &CitationStatus::Idle);
        assert!(matches!(lookup.status_for("p1"), CitationStatus::NotFound { .. }));
    }
}

use std::time::{Duration, Instant};

use clap::ValueEnum;

use crate::domain::{ConservationStatus, SpeciesRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SearchMode {
    /// Substring match on common and scientific name.
    #[default]
    Names,
    /// Also matches group, ISO code and conservation status.
    Extended,
}

/// A normalized free-text query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchQuery {
    raw: String,
    needle: String,
}

impl SearchQuery {
    pub fn new(text: &str) -> Self {
        Self {
            raw: text.to_string(),
            needle: text.to_lowercase(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whitespace-only input counts as no query at all.
    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }

    pub fn matches(&self, record: &SpeciesRecord, mode: SearchMode) -> bool {
        if self.is_empty() {
            return true;
        }
        let needle = self.needle.as_str();
        if contains(&record.common_name, needle) || contains(&record.scientific_name, needle) {
            return true;
        }
        match mode {
            SearchMode::Names => false,
            SearchMode::Extended => {
                let status = record.conservation_status;
                contains(&record.group, needle)
                    || contains(&record.iso_code, needle)
                    || contains(status.code(), needle)
                    || status.description().contains(needle)
                    || ConservationStatus::from_description(needle) == Some(status)
            }
        }
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Keeps records matching `query`, preserving input order.
pub fn filter_species(
    records: &[SpeciesRecord],
    query: &SearchQuery,
    mode: SearchMode,
) -> Vec<SpeciesRecord> {
    if query.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|record| query.matches(record, mode))
        .cloned()
        .collect()
}

/// Coalesces rapid updates: the latest value is released once no new value
/// has arrived for `delay`.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Releases the pending value if it has been quiet long enough.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|(_, at)| now.saturating_duration_since(*at) >= self.delay);
        if ready {
            self.pending.take().map(|(value, _)| value)
        } else {
            None
        }
    }

    /// Releases the pending value regardless of elapsed time.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SpeciesError;

/// IUCN Red List category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConservationStatus {
    CriticallyEndangered,
    Endangered,
    Vulnerable,
    NearThreatened,
    LeastConcern,
    Extinct,
    ExtinctInTheWild,
    DataDeficient,
    NotEvaluated,
}

impl ConservationStatus {
    pub const ALL: [ConservationStatus; 9] = [
        ConservationStatus::CriticallyEndangered,
        ConservationStatus::Endangered,
        ConservationStatus::Vulnerable,
        ConservationStatus::NearThreatened,
        ConservationStatus::LeastConcern,
        ConservationStatus::Extinct,
        ConservationStatus::ExtinctInTheWild,
        ConservationStatus::DataDeficient,
        ConservationStatus::NotEvaluated,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ConservationStatus::CriticallyEndangered => "CR",
            ConservationStatus::Endangered => "EN",
            ConservationStatus::Vulnerable => "VU",
            ConservationStatus::NearThreatened => "NT",
            ConservationStatus::LeastConcern => "LC",
            ConservationStatus::Extinct => "EX",
            ConservationStatus::ExtinctInTheWild => "EW",
            ConservationStatus::DataDeficient => "DD",
            ConservationStatus::NotEvaluated => "NE",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConservationStatus::CriticallyEndangered => "critically endangered",
            ConservationStatus::Endangered => "endangered",
            ConservationStatus::Vulnerable => "vulnerable",
            ConservationStatus::NearThreatened => "near threatened",
            ConservationStatus::LeastConcern => "least concern",
            ConservationStatus::Extinct => "extinct",
            ConservationStatus::ExtinctInTheWild => "extinct in the wild",
            ConservationStatus::DataDeficient => "data deficient",
            ConservationStatus::NotEvaluated => "not evaluated",
        }
    }

    /// Infers a category from free text such as "near threatened" or
    /// "Critically Endangered species". More specific phrases are checked
    /// before the phrases they contain.
    pub fn from_description(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        let has = |word: &str| lowered.contains(word);
        if has("critically") && has("endangered") {
            Some(ConservationStatus::CriticallyEndangered)
        } else if has("endangered") {
            Some(ConservationStatus::Endangered)
        } else if has("vulnerable") {
            Some(ConservationStatus::Vulnerable)
        } else if has("near") && has("threatened") {
            Some(ConservationStatus::NearThreatened)
        } else if has("least") && has("concern") {
            Some(ConservationStatus::LeastConcern)
        } else if has("extinct") && has("wild") {
            Some(ConservationStatus::ExtinctInTheWild)
        } else if has("extinct") {
            Some(ConservationStatus::Extinct)
        } else if has("data") && has("deficient") {
            Some(ConservationStatus::DataDeficient)
        } else if has("not") && has("evaluated") {
            Some(ConservationStatus::NotEvaluated)
        } else {
            None
        }
    }
}

impl fmt::Display for ConservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for ConservationStatus {
    type Err = SpeciesError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.code() == normalized)
            .ok_or_else(|| SpeciesError::InvalidStatus(value.to_string()))
    }
}

impl TryFrom<String> for ConservationStatus {
    type Error = SpeciesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConservationStatus> for String {
    fn from(value: ConservationStatus) -> Self {
        value.code().to_string()
    }
}

/// A species as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSpecies {
    pub id: i64,
    pub common_name: String,
    pub scientific_name: String,
    pub group: String,
    pub conservation_status: ConservationStatus,
    pub iso_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
    pub last_page: u32,
}

/// One decoded page of the species listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpeciesPage {
    pub species: Vec<RawSpecies>,
    pub meta: Option<PageMeta>,
}

impl SpeciesPage {
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

/// A species as cached in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesRecord {
    pub id: i64,
    pub common_name: String,
    pub scientific_name: String,
    pub group: String,
    pub conservation_status: ConservationStatus,
    pub iso_code: String,
    pub fetched_on_page: u32,
    pub last_updated: DateTime<Utc>,
}

impl SpeciesRecord {
    pub fn from_raw(raw: RawSpecies, page: u32, fetched_at: DateTime<Utc>) -> Self {
        Self {
            id: raw.id,
            common_name: raw.common_name,
            scientific_name: raw.scientific_name,
            group: raw.group,
            conservation_status: raw.conservation_status,
            iso_code: raw.iso_code,
            fetched_on_page: page,
            last_updated: fetched_at,
        }
    }
}

/// Which remote page to fetch next and whether any remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    current_page: u32,
    has_more_pages: bool,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            current_page: 1,
            has_more_pages: true,
        }
    }
}

impl PageCursor {
    /// Continues after the highest page already in the local store.
    pub fn resume_after(highest_fetched_page: Option<u32>) -> Self {
        Self {
            current_page: highest_fetched_page.map_or(1, |page| page.saturating_add(1)),
            has_more_pages: true,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn has_more_pages(&self) -> bool {
        self.has_more_pages
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn advance(&mut self) {
        self.current_page = self.current_page.saturating_add(1);
    }

    pub fn mark_exhausted(&mut self) {
        self.has_more_pages = false;
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::SpeciesRecord;
use crate::error::StoreError;

const SCHEMA_VERSION: u32 = 1;

/// Keyed species cache. Exactly one record is kept per id.
pub trait SpeciesStore {
    /// Inserts or overwrites each record by id. The batch is committed as a
    /// whole: on failure neither disk nor memory reflect any of it.
    fn upsert(&mut self, records: Vec<SpeciesRecord>) -> Result<(), StoreError>;

    /// All records ordered by common name, ties by id.
    fn all(&self) -> Vec<SpeciesRecord>;

    fn get(&self, id: i64) -> Option<SpeciesRecord>;

    fn highest_fetched_page(&self) -> Option<u32>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    schema_version: u32,
    #[serde(default)]
    species: Vec<SpeciesRecord>,
}

/// Species store persisted as a single JSON document, rewritten atomically on
/// every mutation.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: Utf8PathBuf,
    records: BTreeMap<i64, SpeciesRecord>,
}

impl JsonFileStore {
    pub fn default_path() -> Result<Utf8PathBuf, StoreError> {
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir()
                        .join(".cache")
                        .join("kira-species")
                        .join("species.json"),
                )
                .ok()
            })
            .ok_or_else(|| StoreError::Location("unable to resolve cache directory".to_string()))
    }

    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if !path.as_std_path().exists() {
            debug!(%path, "species store not found, starting empty");
            return Ok(Self {
                path,
                records: BTreeMap::new(),
            });
        }

        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| StoreError::ReadFailed(format!("{path}: {err}")))?;
        let file: StoreFile = serde_json::from_str(&content)
            .map_err(|err| StoreError::ReadFailed(format!("{path}: {err}")))?;
        if file.schema_version != SCHEMA_VERSION {
            return Err(StoreError::ReadFailed(format!(
                "{path}: unsupported schema version {}",
                file.schema_version
            )));
        }

        let mut records = BTreeMap::new();
        for record in file.species {
            records.insert(record.id, record);
        }
        debug!(%path, count = records.len(), "species store loaded");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn persist(&self, records: &BTreeMap<i64, SpeciesRecord>) -> Result<(), StoreError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| StoreError::WriteFailed(err.to_string()))?;

        let file = StoreFile {
            schema_version: SCHEMA_VERSION,
            species: records.values().cloned().collect(),
        };
        let content = serde_json::to_vec_pretty(&file)
            .map_err(|err| StoreError::WriteFailed(err.to_string()))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".species")
            .suffix(".tmp")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| StoreError::WriteFailed(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| StoreError::WriteFailed(err.to_string()))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| StoreError::WriteFailed(err.to_string()))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| StoreError::WriteFailed(err.to_string()))?;
        Ok(())
    }
}

impl SpeciesStore for JsonFileStore {
    fn upsert(&mut self, records: Vec<SpeciesRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let batch = records.len();
        let mut next = self.records.clone();
        for record in records {
            next.insert(record.id, record);
        }
        if let Err(err) = self.persist(&next) {
            warn!(path = %self.path, error = %err, "species upsert rolled back");
            return Err(err);
        }
        self.records = next;
        debug!(batch, total = self.records.len(), "species upserted");
        Ok(())
    }

    fn all(&self) -> Vec<SpeciesRecord> {
        let mut records = self.records.values().cloned().collect::<Vec<_>>();
        records.sort_by(|a, b| {
            a.common_name
                .cmp(&b.common_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    fn get(&self, id: i64) -> Option<SpeciesRecord> {
        self.records.get(&id).cloned()
    }

    fn highest_fetched_page(&self) -> Option<u32> {
        self.records
            .values()
            .map(|record| record.fetched_on_page)
            .max()
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let empty = BTreeMap::new();
        self.persist(&empty)?;
        self.records = empty;
        Ok(())
    }
}

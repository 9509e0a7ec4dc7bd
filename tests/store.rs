use std::collections::HashMap;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use chrono::{Duration, TimeZone, Utc};

use kira_species::domain::{ConservationStatus, SpeciesRecord};
use kira_species::error::StoreError;
use kira_species::store::{JsonFileStore, SpeciesStore};

fn record(id: i64, name: &str, page: u32, minute: u32) -> SpeciesRecord {
    SpeciesRecord {
        id,
        common_name: name.to_string(),
        scientific_name: format!("{name} latinus"),
        group: "Birds".to_string(),
        conservation_status: ConservationStatus::NearThreatened,
        iso_code: "PE".to_string(),
        fetched_on_page: page,
        last_updated: Utc.with_ymd_and_hms(2025, 5, 28, 9, minute, 0).unwrap(),
    }
}

fn store_path(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join("cache").join("species.json")).unwrap()
}

#[test]
fn one_record_per_id_reflecting_latest_upsert() {
    let temp = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::open(store_path(&temp)).unwrap();

    let batches = vec![
        vec![record(1, "Condor", 1, 0), record(2, "Hoatzin", 1, 0)],
        vec![record(3, "Quetzal", 2, 1), record(1, "Andean Condor", 2, 1)],
        vec![record(2, "Stinkbird", 3, 2)],
        vec![record(4, "Kea", 3, 2), record(3, "Resplendent Quetzal", 3, 2)],
    ];

    let mut expected = HashMap::new();
    for batch in batches {
        for item in &batch {
            expected.insert(item.id, item.clone());
        }
        store.upsert(batch).unwrap();
    }

    let all = store.all();
    assert_eq!(all.len(), expected.len());
    for item in &all {
        assert_eq!(Some(item), expected.get(&item.id));
    }
    let names = all
        .iter()
        .map(|item| item.common_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["Andean Condor", "Kea", "Resplendent Quetzal", "Stinkbird"]
    );
}

#[test]
fn persists_across_reopen() {
    let temp = tempfile::tempdir().unwrap();
    let path = store_path(&temp);
    {
        let mut store = JsonFileStore::open(path.clone()).unwrap();
        store
            .upsert(vec![record(10, "Shoebill", 4, 5), record(11, "Kiwi", 2, 5)])
            .unwrap();
    }

    let store = JsonFileStore::open(path).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.highest_fetched_page(), Some(4));
    let shoebill = store.get(10).unwrap();
    assert_eq!(
        shoebill.last_updated,
        Utc.with_ymd_and_hms(2025, 5, 28, 9, 5, 0).unwrap()
    );
}

#[test]
fn refreshed_timestamp_replaces_old_one() {
    let temp = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::open(store_path(&temp)).unwrap();
    let first = record(7, "Puffin", 1, 0);
    let mut second = first.clone();
    second.last_updated = first.last_updated + Duration::hours(3);
    store.upsert(vec![first]).unwrap();
    store.upsert(vec![second.clone()]).unwrap();
    assert_eq!(store.get(7), Some(second));
}

#[test]
fn empty_store_has_no_highest_page() {
    let temp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(store_path(&temp)).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.highest_fetched_page(), None);
    assert!(store.all().is_empty());
}

#[test]
fn failed_write_leaves_store_untouched() {
    let temp = tempfile::tempdir().unwrap();
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, b"file").unwrap();
    let path = Utf8PathBuf::from_path_buf(blocker.join("species.json")).unwrap();
    let mut store = JsonFileStore::open(path).unwrap();

    let err = store
        .upsert(vec![record(1, "Dodo", 1, 0), record(2, "Moa", 1, 0)])
        .unwrap_err();
    assert_matches!(err, StoreError::WriteFailed(_));
    assert!(store.is_empty());
    assert!(store.get(1).is_none());
}

#[test]
fn corrupt_file_is_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = store_path(&temp);
    std::fs::create_dir_all(path.parent().unwrap().as_std_path()).unwrap();
    std::fs::write(path.as_std_path(), b"{ not json").unwrap();

    let err = JsonFileStore::open(path).unwrap_err();
    assert_matches!(err, StoreError::ReadFailed(_));
}

#[test]
fn clear_empties_disk_and_memory() {
    let temp = tempfile::tempdir().unwrap();
    let path = store_path(&temp);
    let mut store = JsonFileStore::open(path.clone()).unwrap();
    store.upsert(vec![record(1, "Ibis", 1, 0)]).unwrap();
    store.clear().unwrap();
    assert!(store.is_empty());

    let reopened = JsonFileStore::open(path).unwrap();
    assert!(reopened.is_empty());
}

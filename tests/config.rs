use std::time::Duration;

use assert_matches::assert_matches;

use kira_species::api::DEFAULT_BASE_URL;
use kira_species::config::{Config, ConfigLoader};
use kira_species::error::SpeciesError;
use kira_species::search::SearchMode;

#[test]
fn defaults_when_fields_absent() {
    let config = Config {
        store_path: Some("/tmp/kira-species-test.json".to_string()),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.base_url, DEFAULT_BASE_URL);
    assert_eq!(resolved.page_size, 20);
    assert_eq!(resolved.search_debounce, Duration::from_millis(500));
    assert_eq!(resolved.timeout, Duration::from_secs(30));

    let options = resolved.coordinator_options(SearchMode::Extended);
    assert_eq!(options.page_size, 20);
    assert_eq!(options.search_mode, SearchMode::Extended);
}

#[test]
fn reads_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-species.json");
    std::fs::write(
        &path,
        r#"{ "base_url": "http://127.0.0.1:9000/api/v1", "page_size": 5, "store_path": "species.json" }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.base_url, "http://127.0.0.1:9000/api/v1");
    assert_eq!(resolved.page_size, 5);
    assert_eq!(resolved.store_path.as_str(), "species.json");
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("missing.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, SpeciesError::ConfigRead(_));
}

#[test]
fn rejects_invalid_values() {
    let zero_page = Config {
        page_size: Some(0),
        store_path: Some("species.json".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(zero_page),
        Err(SpeciesError::InvalidConfig(_))
    );

    let bad_url = Config {
        base_url: Some("ftp://example.org".to_string()),
        store_path: Some("species.json".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(bad_url),
        Err(SpeciesError::InvalidConfig(_))
    );
}

#[test]
fn malformed_json_is_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-species.json");
    std::fs::write(&path, "{ page_size: 5 }").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, SpeciesError::ConfigParse(_));
}

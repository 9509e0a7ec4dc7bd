//! Drives `SpeciesHttpClient` against a local axum server that mimics the
//! species endpoint, one page number per response shape.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use kira_species::api::{SpeciesClient, SpeciesHttpClient};
use kira_species::domain::ConservationStatus;
use kira_species::error::FetchError;

type Seen = Arc<Mutex<Vec<(u32, u32)>>>;

#[derive(Deserialize)]
struct PageQuery {
    page: u32,
    per_page: u32,
}

fn gorilla() -> serde_json::Value {
    json!({
        "id": 31,
        "common_name": "Mountain Gorilla",
        "scientific_name": "Gorilla beringei beringei",
        "group": "Mammals",
        "conservation_status": "EN",
        "iso_code": "RW"
    })
}

async fn species(State(seen): State<Seen>, Query(query): Query<PageQuery>) -> Response {
    seen.lock().unwrap().push((query.page, query.per_page));
    match query.page {
        1 => Json(json!({
            "data": [gorilla()],
            "meta": { "total": 1, "per_page": 20, "current_page": 1, "last_page": 1 }
        }))
        .into_response(),
        2 => Json(json!([gorilla()])).into_response(),
        3 => Json(json!([])).into_response(),
        4 => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        5 => StatusCode::NOT_FOUND.into_response(),
        _ => "<html>maintenance</html>".into_response(),
    }
}

fn start_server() -> (SocketAddr, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/v1/species", get(species))
        .with_state(Arc::clone(&seen));

    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            axum::serve(listener, app).await
        })
    });

    (addr, seen)
}

fn client_for(addr: SocketAddr) -> SpeciesHttpClient {
    SpeciesHttpClient::new(&format!("http://{addr}/api/v1"), Duration::from_secs(5)).unwrap()
}

#[test]
fn fetches_wrapped_and_bare_pages() {
    let (addr, seen) = start_server();
    let client = client_for(addr);

    let wrapped = client.fetch_page(1, 20).unwrap();
    assert_eq!(wrapped.species.len(), 1);
    assert_eq!(wrapped.species[0].common_name, "Mountain Gorilla");
    assert_eq!(
        wrapped.species[0].conservation_status,
        ConservationStatus::Endangered
    );
    assert_eq!(wrapped.meta.map(|meta| meta.total), Some(1));

    let bare = client.fetch_page(2, 20).unwrap();
    assert_eq!(bare.species[0].id, 31);
    assert!(bare.meta.is_none());

    let empty = client.fetch_page(3, 50).unwrap();
    assert!(empty.is_empty());

    assert_eq!(*seen.lock().unwrap(), vec![(1, 20), (2, 20), (3, 50)]);
}

#[test]
fn error_statuses_map_to_server_errors() {
    let (addr, _seen) = start_server();
    let client = client_for(addr);

    assert_eq!(client.fetch_page(4, 20).unwrap_err(), FetchError::Server(500));
    assert_eq!(client.fetch_page(5, 20).unwrap_err(), FetchError::Server(404));
}

#[test]
fn unexpected_body_is_decoding_error() {
    let (addr, _seen) = start_server();
    let client = client_for(addr);

    let err = client.fetch_page(6, 20).unwrap_err();
    assert_matches!(err, FetchError::Decoding(_));
    assert!(!err.retryable());
}

#[test]
fn unreachable_host_is_network_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = client_for(addr);

    let err = client.fetch_page(1, 20).unwrap_err();
    assert_matches!(err, FetchError::Network(_));
    assert!(err.retryable());
}

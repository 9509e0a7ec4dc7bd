use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::{PageMeta, RawSpecies, SpeciesPage};
use crate::error::{FetchError, SpeciesError};

pub const DEFAULT_BASE_URL: &str = "https://aes.shenlu.me/api/v1";

pub trait SpeciesClient: Send + Sync {
    fn fetch_page(&self, page: u32, per_page: u32) -> Result<SpeciesPage, FetchError>;
}

#[derive(Clone)]
pub struct SpeciesHttpClient {
    client: Client,
    base_url: String,
}

impl SpeciesHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SpeciesError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-species/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SpeciesError::HttpClient(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| SpeciesError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn species_url(&self) -> String {
        format!("{}/species", self.base_url)
    }
}

impl SpeciesClient for SpeciesHttpClient {
    fn fetch_page(&self, page: u32, per_page: u32) -> Result<SpeciesPage, FetchError> {
        let url = self.species_url();
        debug!(%url, page, per_page, "species.request");
        let start = std::time::Instant::now();
        let response = self
            .client
            .get(&url)
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .map_err(|err| {
                warn!(page, error = %err, "species request failed");
                FetchError::Network(err.to_string())
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            warn!(page, status, "species endpoint returned an error status");
            return Err(FetchError::Server(status));
        }

        let body = response
            .bytes()
            .map_err(|err| FetchError::Network(err.to_string()))?;
        let decoded = decode_species_page(&body)?;
        debug!(
            page,
            count = decoded.species.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "species.response"
        );
        Ok(decoded)
    }
}

#[derive(Deserialize)]
struct WrappedPage {
    data: Vec<RawSpecies>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

/// Decodes a species listing body. The wrapped `{ "data": [...], "meta": {...} }`
/// shape is tried first, then a bare JSON array.
pub fn decode_species_page(body: &[u8]) -> Result<SpeciesPage, FetchError> {
    let wrapped_err = match serde_json::from_slice::<WrappedPage>(body) {
        Ok(wrapped) => {
            return Ok(SpeciesPage {
                species: wrapped.data,
                meta: wrapped.meta,
            });
        }
        Err(err) => err,
    };

    match serde_json::from_slice::<Vec<RawSpecies>>(body) {
        Ok(species) => Ok(SpeciesPage {
            species,
            meta: None,
        }),
        Err(array_err) => Err(FetchError::Decoding(format!(
            "wrapped: {wrapped_err}; array: {array_err}"
        ))),
    }
}

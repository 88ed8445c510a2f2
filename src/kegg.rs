use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::{KeggEntityId, OrganismCode};
use crate::error::KeggError;

pub const KEGG_REST_BASE: &str = "https://rest.kegg.jp";

/// Plain-text endpoints of the KEGG REST API.
pub trait KeggClient: Send + Sync {
    /// `list/pathway/<org>`: `pathway id<TAB>name`
    fn list_pathways(&self, organism: &OrganismCode) -> Result<String, KeggError>;
    /// `link/pathway/<org>`: `gene id<TAB>pathway id`
    fn link_pathways(&self, organism: &OrganismCode) -> Result<String, KeggError>;
    /// `list/organism`: `T number<TAB>code<TAB>name<TAB>lineage`
    fn list_organisms(&self) -> Result<String, KeggError>;
    /// `get/<prefix:id>`: one flat-file entry
    fn get_entity(&self, id: &KeggEntityId) -> Result<String, KeggError>;
}

#[derive(Clone)]
pub struct KeggHttpClient {
    client: Client,
    base_url: String,
}

impl KeggHttpClient {
    pub fn new() -> Result<Self, KeggError> {
        Self::with_base_url(KEGG_REST_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, KeggError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kegg-pm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KeggError::KeggHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| KeggError::KeggHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn entity_url(&self, id: &KeggEntityId) -> String {
        format!("{}/get/{id}", self.base_url)
    }

    fn get_text(&self, url: &str) -> Result<String, KeggError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        let response = Self::handle_status(response)?;
        response
            .text()
            .map_err(|err| KeggError::KeggHttp(err.to_string()))
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, KeggError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "KEGG request failed".to_string());
        Err(KeggError::KeggStatus { status, message })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, KeggError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        // KEGG throttles bursts harder than the other registries
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(KeggError::KeggHttp(err.to_string()));
                }
            }
        }
    }
}

impl KeggClient for KeggHttpClient {
    fn list_pathways(&self, organism: &OrganismCode) -> Result<String, KeggError> {
        self.get_text(&format!("{}/list/pathway/{organism}", self.base_url))
    }

    fn link_pathways(&self, organism: &OrganismCode) -> Result<String, KeggError> {
        self.get_text(&format!("{}/link/pathway/{organism}", self.base_url))
    }

    fn list_organisms(&self) -> Result<String, KeggError> {
        self.get_text(&format!("{}/list/organism", self.base_url))
    }

    fn get_entity(&self, id: &KeggEntityId) -> Result<String, KeggError> {
        self.get_text(&self.entity_url(id))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 403 | 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

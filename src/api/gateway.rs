//! Authenticated HTTP plumbing for the Canvas REST API.
//!
//! `ApiGateway` owns the single `reqwest::Client` of the process. It builds
//! `/api/v1` URLs, attaches the bearer token, follows `Link` pagination and maps
//! failures onto `AppError`: transport problems become `Transport`, any non-2xx
//! answer becomes `RemoteApi { status, body }`. Nothing here retries.

use crate::config::Config;
use crate::error::{AppError, Result};
use reqwest::header::{HeaderMap, LINK};
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};

const API_PREFIX: &str = "/api/v1";
const PAGE_SIZE: &str = "100";
const MAX_PAGES: usize = 500;

pub struct ApiGateway {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiGateway {
    /// Creates a gateway for `config.base_url` authenticated with `config.token`.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Canvas instance root, without the API prefix.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API endpoint such as `/courses/1/folders`.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, endpoint)
    }

    fn authorized(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.token)
    }

    /// GET a single JSON document.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint_url(endpoint);
        debug!("GET {}", url);

        let response = self
            .authorized(Method::GET, &url)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        decode(check_status(response).await?).await
    }

    /// GET every page of a list endpoint, following `rel="next"` links.
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let first_url = self.endpoint_url(endpoint);
        let mut query = query.to_vec();
        if !query.iter().any(|(key, _)| *key == "per_page") {
            query.push(("per_page", PAGE_SIZE.to_string()));
        }

        let mut items = Vec::new();
        let mut url = first_url.clone();
        let mut request = self.authorized(Method::GET, &url).query(&query);

        for page in 1..=MAX_PAGES {
            debug!("GET {} (page {})", url, page);
            let response = request
                .send()
                .await
                .map_err(|e| transport_error(&url, e))?;
            let next = next_page_url(response.headers());
            let batch: Vec<T> = decode(check_status(response).await?).await?;
            items.extend(batch);

            match next {
                Some(next_url) => {
                    // The next link already carries the full query string.
                    request = self.authorized(Method::GET, &next_url);
                    url = next_url;
                },
                None => return Ok(items),
            }
        }

        warn!(
            "Stopped following pagination for {} after {} pages",
            first_url, MAX_PAGES
        );
        Ok(items)
    }

    /// Sends a request with an optional JSON body and decodes the JSON answer.
    pub async fn send_json<B, T>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint_url(endpoint);
        debug!("{} {}", method, url);

        let mut request = self.authorized(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        decode(check_status(response).await?).await
    }

    /// POSTs a multipart form to a one-time upload URL.
    ///
    /// Upload URLs are pre-authorized by the file store, so no bearer token is sent.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        form: Form,
        timeout: Duration,
    ) -> Result<T> {
        debug!("POST (multipart) {}", url);
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        decode(check_status(response).await?).await
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> AppError {
    error!("Request to {} failed: {}", url, err);
    AppError::from(err)
}

/// Passes 2xx responses through; reads the body of anything else into `RemoteApi`.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    error!("API request to {} failed with status {}: {}", url, status, body);

    // Provide more specific log hints for common errors
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        error!("Received 401/403. Check CANVAS_TOKEN validity and permissions.");
    }

    Err(AppError::RemoteApi {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().await?;
    // Some endpoints answer with an empty body.
    let body = if text.trim().is_empty() { "null" } else { text.as_str() };
    serde_json::from_str(body).map_err(|e| {
        error!("Error parsing API response JSON: {}", e);
        AppError::from(e)
    })
}

/// Extracts the `rel="next"` target from a `Link` header.
fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim().replace(' ', "");
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

//! REST client for the regional VPC API.
//!
//! Every request carries the `version` and `generation` query parameters and
//! an IAM bearer token. A 404 always surfaces as [`VpcError::NotFound`] so
//! callers can treat absence as a state rather than a failure.

mod auth;
mod error;
pub mod types;

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Timeouts, VpcConfig};

pub use auth::IamAuthenticator;
pub use error::VpcError;
pub use types::{BearerToken, Etag};

const MERGE_PATCH: &str = "application/merge-patch+json";
const PAGE_LIMIT: &str = "50";

struct RawResponse {
    etag: Option<Etag>,
    body: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct PageLink {
    href: String,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    next: Option<PageLink>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

/// Authenticated client for one region of the VPC API.
#[derive(Clone, Debug)]
pub struct VpcClient {
    http: reqwest::Client,
    base_url: String,
    version: String,
    generation: String,
    auth: IamAuthenticator,
    poll_interval: Duration,
    timeouts: Timeouts,
}

impl VpcClient {
    /// Builds a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::Config`] when the configuration is invalid or the
    /// HTTP client cannot be constructed.
    pub fn new(config: &VpcConfig) -> Result<Self, VpcError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|err| VpcError::Config(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url(),
            version: config.api_version.clone(),
            generation: config.generation.to_string(),
            auth: IamAuthenticator::new(config.api_key.clone(), &config.iam_endpoint),
            poll_interval: config.poll_interval(),
            timeouts: config.timeouts(),
        })
    }

    /// Overrides the poll interval, mainly for tests that cannot wait seconds.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Overrides the per-operation wait bounds.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Delay between lifecycle polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Per-operation wait bounds.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Fetches and decodes a single resource.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::NotFound`] on 404, [`VpcError::Api`] on other
    /// failures, and [`VpcError::Decode`] for malformed bodies.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, VpcError> {
        let raw = self.execute(Method::GET, path, &[], None, None).await?;
        decode(&raw.body)
    }

    /// Fetches a resource together with its `ETag` header.
    ///
    /// # Errors
    ///
    /// Same as [`VpcClient::get_json`].
    pub async fn get_json_with_etag<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<(T, Option<Etag>), VpcError> {
        let raw = self.execute(Method::GET, path, &[], None, None).await?;
        Ok((decode(&raw.body)?, raw.etag))
    }

    /// Creates a resource with a JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`VpcClient::get_json`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, VpcError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = encode(body)?;
        let raw = self
            .execute(Method::POST, path, &[], Some(Body::json(payload)), None)
            .await?;
        decode(&raw.body)
    }

    /// Replaces a sub-resource with a JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`VpcClient::get_json`].
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, VpcError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = encode(body)?;
        let raw = self
            .execute(Method::PUT, path, &[], Some(Body::json(payload)), None)
            .await?;
        decode(&raw.body)
    }

    /// Applies a merge patch, optionally guarded by `If-Match`.
    ///
    /// # Errors
    ///
    /// Same as [`VpcClient::get_json`]; a stale `If-Match` surfaces as
    /// [`VpcError::Api`] with status 412.
    pub async fn patch_json<B, T>(
        &self,
        path: &str,
        body: &B,
        if_match: Option<&Etag>,
    ) -> Result<T, VpcError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = encode(body)?;
        let raw = self
            .execute(
                Method::PATCH,
                path,
                &[],
                Some(Body::merge_patch(payload)),
                if_match,
            )
            .await?;
        decode(&raw.body)
    }

    /// Deletes a resource, optionally guarded by `If-Match`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::NotFound`] when the resource is already gone and
    /// [`VpcError::Api`] on other failures.
    pub async fn delete(&self, path: &str, if_match: Option<&Etag>) -> Result<(), VpcError> {
        self.execute(Method::DELETE, path, &[], None, if_match)
            .await
            .map(|_| ())
    }

    /// Lists every element of `collection` under `path`, following `next`
    /// links until the last page.
    ///
    /// # Errors
    ///
    /// Same as [`VpcClient::get_json`]; a page without `collection` is a
    /// [`VpcError::Decode`].
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        collection: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, VpcError> {
        let mut items = Vec::new();
        let mut start: Option<String> = None;
        loop {
            let raw = {
                let mut page_query: Vec<(&str, &str)> = query.to_vec();
                page_query.push(("limit", PAGE_LIMIT));
                if let Some(token) = start.as_deref() {
                    page_query.push(("start", token));
                }
                self.execute(Method::GET, path, &page_query, None, None)
                    .await?
            };
            let mut page: Page = decode(&raw.body)?;
            let elements = page.rest.remove(collection).ok_or_else(|| VpcError::Decode {
                message: format!("page is missing '{collection}'"),
            })?;
            let mut decoded: Vec<T> =
                serde_json::from_value(elements).map_err(|err| VpcError::decode(&err))?;
            items.append(&mut decoded);

            match page.next.as_ref().map(|link| start_token(&link.href)).transpose()? {
                Some(Some(token)) if start.as_deref() == Some(token.as_str()) => {
                    warn!(path, start = %token, "pagination token repeated; stopping");
                    break;
                }
                Some(Some(token)) => start = Some(token),
                Some(None) | None => break,
            }
        }
        debug!(path, count = items.len(), "listed collection");
        Ok(items)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Body>,
        if_match: Option<&Etag>,
    ) -> Result<RawResponse, VpcError> {
        let token = self.auth.token(&self.http).await?;
        let url = format!("{}{path}", self.base_url);
        debug!(method = %method, url = %url, "calling VPC API");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token.as_str())
            .query(&[
                ("version", self.version.as_str()),
                ("generation", self.generation.as_str()),
            ])
            .query(query);
        if let Some(etag) = if_match {
            request = request.header(IF_MATCH, etag.as_str());
        }
        if let Some(payload) = body {
            request = request
                .header(CONTENT_TYPE, payload.content_type)
                .body(payload.bytes);
        }

        let response = request.send().await.map_err(|err| VpcError::transport(&err))?;
        let status = response.status();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(Etag::from);
        let bytes = response
            .bytes()
            .await
            .map_err(|err| VpcError::transport(&err))?;

        if status == StatusCode::NOT_FOUND {
            return Err(VpcError::not_found_at(path));
        }
        if !status.is_success() {
            return Err(VpcError::Api {
                status: status.as_u16(),
                message: api_message(&bytes),
            });
        }
        Ok(RawResponse {
            etag,
            body: bytes.to_vec(),
        })
    }
}

struct Body {
    content_type: &'static str,
    bytes: Vec<u8>,
}

impl Body {
    const fn json(bytes: Vec<u8>) -> Self {
        Self {
            content_type: "application/json",
            bytes,
        }
    }

    const fn merge_patch(bytes: Vec<u8>) -> Self {
        Self {
            content_type: MERGE_PATCH,
            bytes,
        }
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>, VpcError> {
    serde_json::to_vec(body).map_err(|err| VpcError::decode(&err))
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, VpcError> {
    if body.is_empty() {
        return serde_json::from_slice(b"null").map_err(|err| VpcError::decode(&err));
    }
    serde_json::from_slice(body).map_err(|err| VpcError::decode(&err))
}

fn api_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.errors.into_iter().next().map_or_else(
            || String::from_utf8_lossy(body).into_owned(),
            |detail| match detail.code {
                Some(code) => format!("{code}: {}", detail.message),
                None => detail.message,
            },
        ),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

fn start_token(href: &str) -> Result<Option<String>, VpcError> {
    let url = Url::parse(href).map_err(|err| VpcError::Decode {
        message: format!("invalid next link '{href}': {err}"),
    })?;
    Ok(url
        .query_pairs()
        .find(|(key, _)| key == "start")
        .map(|(_, value)| value.into_owned()))
}

#[cfg(test)]
mod tests;

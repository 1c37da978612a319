//! Microsoft Graph REST client bound to one mailbox

use pn_core::GraphConfig;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{GraphError, Result};
use crate::models::Collection;

/// Request timeout for every Graph and identity endpoint call
const HTTP_TIMEOUT: Duration = Duration::from_secs(if cfg!(test) { 2 } else { 30 });

/// HTTP client shared by the token exchange and the mailbox client
pub(crate) fn http_client() -> Result<Client> {
    Ok(Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

/// Graph API client for a single user mailbox.
///
/// Holds an access token obtained from [`crate::TokenCache`]; the token is
/// not refreshed during the client's lifetime.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base_url: String,
    user_email: String,
    access_token: String,
}

impl GraphClient {
    /// Create a new Graph client
    pub fn new(config: &GraphConfig, access_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_email: config.user_email.clone(),
            access_token: access_token.into(),
        })
    }

    /// Mailbox address this client operates on
    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    /// `{base}/users/{mailbox}/{path}`
    pub(crate) fn user_url(&self, path: &str) -> String {
        format!("{}/users/{}/{}", self.base_url, self.user_email, path)
    }

    /// GET one page of an OData collection and return its `value` array
    pub(crate) async fn get_collection<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        Ok(self.get_page(url, query).await?.value)
    }

    /// GET every page of an OData collection, following `@odata.nextLink`
    pub(crate) async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut page: Collection<T> = self.get_page(url, query).await?;
        let mut items = Vec::new();

        loop {
            items.append(&mut page.value);
            match page.next_link.take() {
                // The link already carries the query
                Some(next) => page = self.get_page(&next, &[]).await?,
                None => break,
            }
        }

        Ok(items)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Collection<T>> {
        debug!("GET {}", url);

        let mut request = self.client.get(url).bearer_auth(&self.access_token);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// GET raw bytes (attachment `$value`)
    pub(crate) async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// PATCH a JSON body, discarding the response
    pub(crate) async fn patch_json(&self, url: &str, body: &serde_json::Value) -> Result<()> {
        debug!("PATCH {}", url);

        let response = self
            .client
            .patch(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!("Graph API error: {} - {}", status, body);
        Err(GraphError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

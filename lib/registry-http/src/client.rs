//! reqwest backed implementation of `RegistryBackend`

use async_trait::async_trait;
use registry_api::{
    AllowListEntry, AllowListPayload, AllowListQuery, CreatedEntry, CreatedItems, DeleteStatus,
    NewAllowListEntry, Peer, PeerStatusList,
};
use registry_core::{ConsoleConfig, RegistryBackend, RegistryError, Result, StatusSource};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// HttpBackend talks to the gateway over its REST endpoints.
///
/// Every method sends exactly one request. Transport failures and 5xx answers
/// become `Unavailable`; other statuses are classified by
/// `RegistryError::from_status`.
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    /// Create a new backend client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Use a preconfigured reqwest client (proxy, TLS roots, headers)
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn from_config(config: &ConsoleConfig) -> Result<Self> {
        config.validate()?;
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn status_path(source: StatusSource) -> &'static str {
        match source {
            StatusSource::Live => "/wireguard_user_status",
            StatusSource::Blank => "/wireguard_user_status_blank",
        }
    }

    /// Send a request and turn any non-success status into an error
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!("{} -> {}", response.url().path(), status);

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Backend answered {}: {}", status, body);
        Err(RegistryError::from_status(status.as_u16(), body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RegistryError::Unavailable(format!("invalid response body: {}", e)))
    }
}

fn transport_error(err: reqwest::Error) -> RegistryError {
    if err.is_timeout() {
        RegistryError::Unavailable(format!("request timed out: {}", err))
    } else {
        RegistryError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl RegistryBackend for HttpBackend {
    async fn list_allow_list(&self, query: &AllowListQuery) -> Result<Vec<AllowListEntry>> {
        let request = self.client.get(self.url("/whitelist")).query(query);
        let payload: AllowListPayload = self.send_json(request).await?;
        Ok(payload.into_entries())
    }

    async fn create_allow_list(&self, items: &[NewAllowListEntry]) -> Result<Vec<CreatedEntry>> {
        let request = self.client.post(self.url("/whitelist")).json(items);
        let created: CreatedItems = self.send_json(request).await?;
        Ok(created.items)
    }

    async fn import_allow_list(&self, file_name: &str, csv: Vec<u8>) -> Result<Vec<CreatedEntry>> {
        let part = Part::bytes(csv)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(|e| RegistryError::Validation(e.to_string()))?;
        let form = Form::new().part("file", part);

        let request = self.client.post(self.url("/whitelist_file")).multipart(form);
        let created: CreatedItems = self.send_json(request).await?;
        Ok(created.items)
    }

    async fn delete_allow_list(&self, id: i64) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/whitelist/{}", id)));
        let outcome: DeleteStatus = self.send_json(request).await?;
        if !outcome.is_success() {
            return Err(RegistryError::Rejected {
                status: 200,
                body: format!("delete of record {} answered '{}'", id, outcome.status),
            });
        }
        Ok(())
    }

    async fn peer_status(&self, source: StatusSource) -> Result<Vec<Peer>> {
        let request = self.client.get(self.url(Self::status_path(source)));
        let list: PeerStatusList = self.send_json(request).await?;
        Ok(list.clients)
    }

    async fn set_not_removable(&self, name: &str) -> Result<()> {
        let request = self
            .client
            .put(self.url("/wireguard_config_not_removed_flg"))
            .query(&[("config_name", name)]);
        self.send(request).await?;
        Ok(())
    }

    async fn remove_peer(&self, pub_key: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url("/wireguard_config_remove"))
            .query(&[("pub_key", pub_key)]);
        self.send(request).await?;
        Ok(())
    }
}

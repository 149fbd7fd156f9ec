//! Resource manager over an ARM-style REST API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use landing_zone_core::resource_types::PRIVATE_ENDPOINT;
use landing_zone_core::{ContainerRef, ManagedResource, PrivateEndpoint, ResourceSpec};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{classify_provider_error, CloudError, Result};
use crate::manager::ResourceManager;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    pub base_url: String,
    pub api_version: String,
    /// Version of the private DNS API used by the network-link delete path
    pub network_link_api_version: String,
    pub token: Option<String>,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://management.azure.com".to_string(),
            api_version: "2021-04-01".to_string(),
            network_link_api_version: "2020-06-01".to_string(),
            token: None,
        }
    }
}

/// Wire shape of a resource
#[derive(Debug, Serialize, Deserialize)]
struct ArmResource {
    id: String,
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    properties: serde_json::Value,
}

impl From<ArmResource> for ManagedResource {
    fn from(r: ArmResource) -> Self {
        ManagedResource {
            id: r.id,
            resource_type: r.resource_type,
            name: r.name,
            region: r.location,
            tags: r.tags.unwrap_or_default(),
            properties: r.properties,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArmPage {
    #[serde(default)]
    value: Vec<ArmResource>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ArmCreateBody<'a> {
    location: &'a str,
    tags: &'a BTreeMap<String, String>,
    properties: &'a serde_json::Value,
}

pub struct RestResourceManager {
    client: Client,
    config: RestConfig,
}

impl RestResourceManager {
    pub fn new(config: RestConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turns a non-success response into a classified error.
    async fn check(response: Response, resource_id: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ArmErrorBody>(&body).ok().map(|b| b.error);
        let code = detail.as_ref().and_then(|d| d.code.clone());
        let message = detail
            .and_then(|d| d.message)
            .unwrap_or_else(|| body.clone());
        warn!(
            resource_id,
            status = status.as_u16(),
            code = code.as_deref().unwrap_or(""),
            "Provider request failed"
        );
        Err(classify_provider_error(
            status.as_u16(),
            code.as_deref(),
            Some(&message),
            resource_id,
        ))
    }

    /// Follows `nextLink` until the listing is exhausted.
    async fn list_pages(&self, first_url: String, scope: &str) -> Result<Vec<ManagedResource>> {
        let mut resources = Vec::new();
        let mut next = Some(first_url);
        while let Some(url) = next {
            let response = self.authorize(self.client.get(&url)).send().await?;
            let page: ArmPage = Self::check(response, scope).await?.json().await?;
            resources.extend(page.value.into_iter().map(ManagedResource::from));
            next = page.next_link;
        }
        Ok(resources)
    }

    async fn delete_with_version(&self, resource_id: &str, api_version: &str) -> Result<()> {
        let response = self
            .authorize(self.client.delete(self.url(resource_id)))
            .query(&[("api-version", api_version)])
            .send()
            .await?;
        Self::check(response, resource_id).await?;
        debug!(resource_id, "Delete accepted");
        Ok(())
    }
}

#[async_trait]
impl ResourceManager for RestResourceManager {
    async fn list_resources(&self, container: &ContainerRef) -> Result<Vec<ManagedResource>> {
        let scope = container.scope();
        let url = format!(
            "{}?api-version={}",
            self.url(&format!("{}/resources", scope)),
            self.config.api_version
        );
        self.list_pages(url, &scope).await
    }

    async fn list_private_endpoints(
        &self,
        container: &ContainerRef,
    ) -> Result<Vec<PrivateEndpoint>> {
        let scope = container.scope();
        let url = format!(
            "{}?api-version={}",
            self.url(&format!("{}/providers/{}", scope, PRIVATE_ENDPOINT)),
            self.config.api_version
        );
        let endpoints = self.list_pages(url, &scope).await?;
        Ok(endpoints
            .into_iter()
            .map(PrivateEndpoint::from_resource)
            .collect())
    }

    async fn get_resource(&self, resource_id: &str) -> Result<ManagedResource> {
        let response = self
            .authorize(self.client.get(self.url(resource_id)))
            .query(&[("api-version", self.config.api_version.as_str())])
            .send()
            .await?;
        let resource: ArmResource = Self::check(response, resource_id).await?.json().await?;
        Ok(resource.into())
    }

    async fn create_resource(
        &self,
        container: &ContainerRef,
        spec: &ResourceSpec,
    ) -> Result<ManagedResource> {
        let resource_id = spec.resource_id(container);
        let body = ArmCreateBody {
            location: &spec.region,
            tags: &spec.tags,
            properties: &spec.properties,
        };
        let response = self
            .authorize(self.client.put(self.url(&resource_id)))
            .query(&[("api-version", self.config.api_version.as_str())])
            .header("If-None-Match", "*")
            .json(&body)
            .send()
            .await?;

        let response = Self::check(response, &resource_id).await?;
        if response.status() == StatusCode::ACCEPTED || response.content_length() == Some(0) {
            // Long-running create acknowledged without a body
            return Ok(spec.clone().into_resource(container));
        }
        let created: ArmResource = response
            .json()
            .await
            .map_err(|e| CloudError::InvalidResponse(e.to_string()))?;
        Ok(created.into())
    }

    async fn delete_by_id(&self, resource_id: &str) -> Result<()> {
        self.delete_with_version(resource_id, &self.config.api_version)
            .await
    }

    async fn delete_network_link(&self, resource_id: &str) -> Result<()> {
        self.delete_with_version(resource_id, &self.config.network_link_api_version)
            .await
    }
}

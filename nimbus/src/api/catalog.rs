//! Read-only catalog of images and flavors

use crate::api::{client::Client, common::ApiQueryParams, error::ApiError};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub os: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub min_disk_gb: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    pub vcpus: u32,
    pub memory_mb: u32,
    #[serde(default)]
    pub disk_gb: u32,
}

pub struct CatalogApi<'a> {
    client: &'a Client,
}

impl<'a> CatalogApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v1/images
    pub async fn images(&self, name: Option<&str>, os: Option<&str>) -> Result<Vec<Image>, ApiError> {
        let params = ApiQueryParams::new()
            .add_optional("name", name)
            .add_optional("os", os);
        self.client.get_with_params("/images", &params).await
    }

    /// GET /v1/flavors
    pub async fn flavors(&self) -> Result<Vec<Flavor>, ApiError> {
        self.client.get("/flavors").await
    }
}

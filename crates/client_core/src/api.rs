use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{OrderSummary, Product, UserSummary},
    error::ErrorCode,
    protocol::{
        OrderListQuery, OrderListResponse, PageResponse, ProductListQuery, ProductListResponse,
        UserListQuery, UserListResponse,
    },
};
use tracing::{debug, warn};

use crate::{
    config::ClientSettings,
    error::{ConfigError, FetchError},
};

#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn fetch_products(
        &self,
        query: ProductListQuery,
    ) -> Result<PageResponse<Product>, FetchError>;
}

#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn fetch_admin_products(
        &self,
        query: ProductListQuery,
    ) -> Result<PageResponse<Product>, FetchError>;
    async fn fetch_orders(
        &self,
        query: OrderListQuery,
    ) -> Result<PageResponse<OrderSummary>, FetchError>;
    async fn fetch_users(
        &self,
        query: UserListQuery,
    ) -> Result<PageResponse<UserSummary>, FetchError>;
}

pub struct HttpCatalogApi {
    http: Client,
    api_url: String,
    auth_token: Option<String>,
}

impl HttpCatalogApi {
    pub fn new(api_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            auth_token: settings.auth_token.clone(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn get_envelope<Q, E>(
        &self,
        path: &str,
        query: &Q,
        authorized: bool,
    ) -> Result<(E, u16), FetchError>
    where
        Q: Serialize + Sync,
        E: DeserializeOwned + Send,
    {
        let url = format!("{}{path}", self.api_url);
        let mut request = self.http.get(&url).query(query);
        if authorized {
            match &self.auth_token {
                Some(token) => request = request.bearer_auth(token),
                None => warn!(%url, "admin request issued without a bearer token"),
            }
        }

        let response = request.send().await.map_err(FetchError::network)?;
        let status = response.status();
        let body = response.bytes().await.map_err(FetchError::network)?;
        debug!(%url, status = status.as_u16(), bytes = body.len(), "listing response received");

        let envelope = serde_json::from_slice::<E>(&body).map_err(|err| {
            if status.is_success() {
                FetchError::Network(format!("malformed response body: {err}"))
            } else {
                FetchError::Network(format!("HTTP {status}"))
            }
        })?;
        Ok((envelope, status.as_u16()))
    }
}

/// Rejections on a non-2xx status carry the status-derived code instead of the generic one.
fn with_status_code<T>(
    result: Result<PageResponse<T>, shared::error::ApiError>,
    status: u16,
) -> Result<PageResponse<T>, FetchError> {
    result.map_err(|mut err| {
        if let Some(code) = ErrorCode::from_status(status) {
            err.code = code;
        }
        FetchError::Rejected(err)
    })
}

#[async_trait]
impl CatalogApi for HttpCatalogApi {
    async fn fetch_products(
        &self,
        query: ProductListQuery,
    ) -> Result<PageResponse<Product>, FetchError> {
        let (envelope, status) = self
            .get_envelope::<_, ProductListResponse>("/products", &query, false)
            .await?;
        with_status_code(envelope.into_page("Failed to fetch products"), status)
    }
}

#[async_trait]
impl AdminApi for HttpCatalogApi {
    async fn fetch_admin_products(
        &self,
        query: ProductListQuery,
    ) -> Result<PageResponse<Product>, FetchError> {
        let (envelope, status) = self
            .get_envelope::<_, ProductListResponse>("/admin/products", &query, true)
            .await?;
        with_status_code(envelope.into_page("Failed to fetch products"), status)
    }

    async fn fetch_orders(
        &self,
        query: OrderListQuery,
    ) -> Result<PageResponse<OrderSummary>, FetchError> {
        let (envelope, status) = self
            .get_envelope::<_, OrderListResponse>("/admin/orders", &query, true)
            .await?;
        with_status_code(envelope.into_page("Failed to fetch orders"), status)
    }

    async fn fetch_users(
        &self,
        query: UserListQuery,
    ) -> Result<PageResponse<UserSummary>, FetchError> {
        let (envelope, status) = self
            .get_envelope::<_, UserListResponse>("/admin/users", &query, true)
            .await?;
        with_status_code(envelope.into_page("Failed to fetch users"), status)
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;

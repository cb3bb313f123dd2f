use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{Category, OrderStatus, OrderSummary, Product, UserSummary},
    protocol::{
        OrderListQuery, PageResponse, ProductListQuery, UserListQuery, ADMIN_TABLE_PAGE_SIZE,
        STOREFRONT_PAGE_SIZE,
    },
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    api::{AdminApi, CatalogApi},
    error::FetchError,
    filters::FilterSet,
    paging::PageCursor,
};

#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Clone + Send + Sync + 'static;
    type Filter: Clone + Default + PartialEq + Send + Sync + 'static;

    /// What the rows are called in "Error loading ..." messages.
    const NOUN: &'static str;

    fn page_size(&self) -> u32;

    async fn fetch_page(
        &self,
        filter: &Self::Filter,
        page: u32,
    ) -> Result<PageResponse<Self::Item>, FetchError>;
}

pub struct CatalogPages {
    api: Arc<dyn CatalogApi>,
}

impl CatalogPages {
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageSource for CatalogPages {
    type Item = Product;
    type Filter = FilterSet;
    const NOUN: &'static str = "products";

    fn page_size(&self) -> u32 {
        STOREFRONT_PAGE_SIZE
    }

    async fn fetch_page(
        &self,
        filter: &FilterSet,
        page: u32,
    ) -> Result<PageResponse<Product>, FetchError> {
        self.api
            .fetch_products(filter.to_query(page, self.page_size()))
            .await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProductFilter {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub category: Option<Category>,
}

pub struct AdminProductPages {
    api: Arc<dyn AdminApi>,
}

impl AdminProductPages {
    pub fn new(api: Arc<dyn AdminApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageSource for AdminProductPages {
    type Item = Product;
    type Filter = AdminProductFilter;
    const NOUN: &'static str = "products";

    fn page_size(&self) -> u32 {
        STOREFRONT_PAGE_SIZE
    }

    async fn fetch_page(
        &self,
        filter: &AdminProductFilter,
        page: u32,
    ) -> Result<PageResponse<Product>, FetchError> {
        let query = ProductListQuery {
            search: Some(filter.search.clone()).filter(|search| !search.is_empty()),
            category: filter
                .category
                .map(|category| category.as_query_value().to_string()),
            page,
            limit: self.page_size(),
            ..ProductListQuery::default()
        };
        self.api.fetch_admin_products(query).await
    }
}

pub struct OrderPages {
    api: Arc<dyn AdminApi>,
}

impl OrderPages {
    pub fn new(api: Arc<dyn AdminApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageSource for OrderPages {
    type Item = OrderSummary;
    type Filter = Option<OrderStatus>;
    const NOUN: &'static str = "orders";

    fn page_size(&self) -> u32 {
        ADMIN_TABLE_PAGE_SIZE
    }

    async fn fetch_page(
        &self,
        filter: &Option<OrderStatus>,
        page: u32,
    ) -> Result<PageResponse<OrderSummary>, FetchError> {
        let query = OrderListQuery {
            status: filter.map(|status| status.as_query_value().to_string()),
            page,
            limit: self.page_size(),
        };
        self.api.fetch_orders(query).await
    }
}

pub struct UserPages {
    api: Arc<dyn AdminApi>,
}

impl UserPages {
    pub fn new(api: Arc<dyn AdminApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageSource for UserPages {
    type Item = UserSummary;
    type Filter = String;
    const NOUN: &'static str = "users";

    fn page_size(&self) -> u32 {
        ADMIN_TABLE_PAGE_SIZE
    }

    async fn fetch_page(
        &self,
        filter: &String,
        page: u32,
    ) -> Result<PageResponse<UserSummary>, FetchError> {
        let query = UserListQuery {
            search: Some(filter.clone()).filter(|search| !search.is_empty()),
            page,
            limit: self.page_size(),
        };
        self.api.fetch_users(query).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot<T, F> {
    pub filter: F,
    pub generation: u64,
    pub cursor: PageCursor,
    pub rows: Vec<T>,
    pub error: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableOutcome {
    Loaded {
        page: u32,
        rows: usize,
        total_pages: u32,
    },
    Failed { page: u32, error: FetchError },
    Stale { page: u32, generation: u64 },
}

struct TableState<T, F> {
    filter: F,
    generation: u64,
    cursor: PageCursor,
    rows: Vec<T>,
    error: Option<String>,
    loading: bool,
}

pub struct PagedTable<S: PageSource> {
    source: S,
    inner: Mutex<TableState<S::Item, S::Filter>>,
}

impl<S: PageSource> PagedTable<S> {
    pub fn new(source: S) -> Arc<Self> {
        Arc::new(Self {
            source,
            inner: Mutex::new(TableState {
                filter: S::Filter::default(),
                generation: 0,
                cursor: PageCursor::default(),
                rows: Vec::new(),
                error: None,
                loading: false,
            }),
        })
    }

    pub fn page_size(&self) -> u32 {
        self.source.page_size()
    }

    pub async fn snapshot(&self) -> TableSnapshot<S::Item, S::Filter> {
        let guard = self.inner.lock().await;
        TableSnapshot {
            filter: guard.filter.clone(),
            generation: guard.generation,
            cursor: guard.cursor,
            rows: guard.rows.clone(),
            error: guard.error.clone(),
            loading: guard.loading,
        }
    }

    pub async fn cursor(&self) -> PageCursor {
        self.inner.lock().await.cursor
    }

    pub async fn reload(&self) -> TableOutcome {
        let (filter, page, generation) = {
            let mut guard = self.inner.lock().await;
            Self::begin_request(&mut guard)
        };
        self.run_request(filter, page, generation).await
    }

    /// Jumps back to page 1 under `filter`. Returns `None` when the filter is unchanged.
    pub async fn set_filter(&self, filter: S::Filter) -> Option<TableOutcome> {
        let (filter, page, generation) = {
            let mut guard = self.inner.lock().await;
            if guard.filter == filter {
                return None;
            }
            guard.filter = filter;
            guard.cursor.page = 1;
            Self::begin_request(&mut guard)
        };
        info!(noun = S::NOUN, generation, "table filter changed");
        Some(self.run_request(filter, page, generation).await)
    }

    pub async fn next_page(&self) -> Option<TableOutcome> {
        self.navigate(PageCursor::next).await
    }

    pub async fn previous_page(&self) -> Option<TableOutcome> {
        self.navigate(PageCursor::previous).await
    }

    pub async fn go_to_page(&self, page: u32) -> Option<TableOutcome> {
        self.navigate(|cursor| cursor.go_to(page)).await
    }

    async fn navigate(
        &self,
        step: impl FnOnce(&mut PageCursor) -> bool,
    ) -> Option<TableOutcome> {
        let (filter, page, generation) = {
            let mut guard = self.inner.lock().await;
            if !step(&mut guard.cursor) {
                return None;
            }
            Self::begin_request(&mut guard)
        };
        Some(self.run_request(filter, page, generation).await)
    }

    fn begin_request(state: &mut TableState<S::Item, S::Filter>) -> (S::Filter, u32, u64) {
        state.generation += 1;
        state.loading = true;
        (state.filter.clone(), state.cursor.page, state.generation)
    }

    async fn run_request(&self, filter: S::Filter, page: u32, generation: u64) -> TableOutcome {
        debug!(noun = S::NOUN, page, generation, "requesting table page");
        let result = self.source.fetch_page(&filter, page).await;

        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            drop(guard);
            debug!(noun = S::NOUN, page, generation, "discarding superseded table page");
            return TableOutcome::Stale { page, generation };
        }
        guard.loading = false;

        match result {
            Ok(response) => {
                let rows = response.items.len();
                let total_pages = response.pages;
                guard.rows = response.items;
                guard.error = None;
                guard.cursor.set_total_pages(total_pages);
                drop(guard);
                debug!(noun = S::NOUN, page, rows, total_pages, "table page applied");
                TableOutcome::Loaded {
                    page,
                    rows,
                    total_pages,
                }
            }
            Err(error) => {
                guard.error = Some(error.user_message(S::NOUN));
                drop(guard);
                warn!(noun = S::NOUN, page, %error, "table page failed");
                TableOutcome::Failed { page, error }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/paged_table_tests.rs"]
mod tests;

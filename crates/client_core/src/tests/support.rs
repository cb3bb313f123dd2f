use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{
        OrderId, OrderStatus, OrderSummary, PaymentStatus, Product, ProductId, UserId, UserSummary,
    },
    protocol::{OrderListQuery, PageResponse, ProductListQuery, UserListQuery},
};
use tokio::sync::oneshot;

use crate::{
    api::{AdminApi, CatalogApi},
    error::FetchError,
};

pub(crate) fn products(prefix: &str, count: usize) -> Vec<Product> {
    (0..count)
        .map(|idx| Product {
            id: ProductId::new(format!("{prefix}-{idx}")),
            name: format!("{prefix} runner {idx}"),
            price: 80.0 + idx as f64,
            stock: 5,
            rating: 4.0,
            photos: vec![format!("https://cdn.example.com/{prefix}/{idx}.jpg")],
            description: None,
            category: Some("daily".into()),
        })
        .collect()
}

pub(crate) fn orders(prefix: &str, count: usize) -> Vec<OrderSummary> {
    (0..count)
        .map(|idx| OrderSummary {
            id: OrderId::new(format!("{prefix}-{idx}")),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total_amount: 100.0,
            created_at: None,
        })
        .collect()
}

pub(crate) fn users(prefix: &str, count: usize) -> Vec<UserSummary> {
    (0..count)
        .map(|idx| UserSummary {
            id: UserId::new(format!("{prefix}-{idx}")),
            name: format!("{prefix} {idx}"),
            email: format!("{prefix}{idx}@example.com"),
            is_admin: false,
            created_at: None,
        })
        .collect()
}

struct Step<T> {
    result: Result<PageResponse<T>, FetchError>,
    gate: Option<oneshot::Receiver<()>>,
}

/// Responses queued per (filter key, page). A gated step holds its request
/// open until the returned sender fires.
pub(crate) struct Script<T> {
    steps: Mutex<HashMap<(String, u32), VecDeque<Step<T>>>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            steps: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Script<T> {
    fn push(&self, key: &str, page: u32, step: Step<T>) {
        self.steps
            .lock()
            .expect("script lock")
            .entry((key.to_string(), page))
            .or_default()
            .push_back(step);
    }

    pub(crate) fn push_ok(&self, key: &str, page: u32, items: Vec<T>, pages: u32) {
        self.push(
            key,
            page,
            Step {
                result: Ok(PageResponse { items, pages }),
                gate: None,
            },
        );
    }

    pub(crate) fn push_err(&self, key: &str, page: u32, err: FetchError) {
        self.push(
            key,
            page,
            Step {
                result: Err(err),
                gate: None,
            },
        );
    }

    pub(crate) fn push_gated(
        &self,
        key: &str,
        page: u32,
        result: Result<PageResponse<T>, FetchError>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.push(
            key,
            page,
            Step {
                result,
                gate: Some(rx),
            },
        );
        tx
    }

    async fn respond(&self, key: &str, page: u32) -> Result<PageResponse<T>, FetchError> {
        let step = self
            .steps
            .lock()
            .expect("script lock")
            .get_mut(&(key.to_string(), page))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("unexpected request for key '{key}' page {page}"));
        if let Some(gate) = step.gate {
            let _ = gate.await;
        }
        step.result
    }
}

#[derive(Default)]
pub(crate) struct ScriptedCatalog {
    pub(crate) products: Script<Product>,
    pub(crate) orders: Script<OrderSummary>,
    pub(crate) users: Script<UserSummary>,
    product_queries: Mutex<Vec<ProductListQuery>>,
    order_queries: Mutex<Vec<OrderListQuery>>,
    user_queries: Mutex<Vec<UserListQuery>>,
}

impl ScriptedCatalog {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_ok(&self, search: &str, page: u32, items: Vec<Product>, pages: u32) {
        self.products.push_ok(search, page, items, pages);
    }

    pub(crate) fn push_err(&self, search: &str, page: u32, err: FetchError) {
        self.products.push_err(search, page, err);
    }

    pub(crate) fn push_gated_ok(
        &self,
        search: &str,
        page: u32,
        items: Vec<Product>,
        pages: u32,
    ) -> oneshot::Sender<()> {
        self.products
            .push_gated(search, page, Ok(PageResponse { items, pages }))
    }

    pub(crate) fn push_gated_err(
        &self,
        search: &str,
        page: u32,
        err: FetchError,
    ) -> oneshot::Sender<()> {
        self.products.push_gated(search, page, Err(err))
    }

    pub(crate) fn queries(&self) -> Vec<ProductListQuery> {
        self.product_queries.lock().expect("queries lock").clone()
    }

    pub(crate) fn order_queries(&self) -> Vec<OrderListQuery> {
        self.order_queries.lock().expect("queries lock").clone()
    }

    pub(crate) fn user_queries(&self) -> Vec<UserListQuery> {
        self.user_queries.lock().expect("queries lock").clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.product_queries.lock().expect("queries lock").len()
            + self.order_queries.lock().expect("queries lock").len()
            + self.user_queries.lock().expect("queries lock").len()
    }

    pub(crate) async fn wait_for_requests(&self, count: usize) {
        for _ in 0..400 {
            if self.request_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} requests, saw {}", self.request_count());
    }
}

#[async_trait]
impl CatalogApi for ScriptedCatalog {
    async fn fetch_products(
        &self,
        query: ProductListQuery,
    ) -> Result<PageResponse<Product>, FetchError> {
        let key = query.search.clone().unwrap_or_default();
        let page = query.page;
        self.product_queries.lock().expect("queries lock").push(query);
        self.products.respond(&key, page).await
    }
}

#[async_trait]
impl AdminApi for ScriptedCatalog {
    async fn fetch_admin_products(
        &self,
        query: ProductListQuery,
    ) -> Result<PageResponse<Product>, FetchError> {
        self.fetch_products(query).await
    }

    async fn fetch_orders(
        &self,
        query: OrderListQuery,
    ) -> Result<PageResponse<OrderSummary>, FetchError> {
        let key = query.status.clone().unwrap_or_default();
        let page = query.page;
        self.order_queries.lock().expect("queries lock").push(query);
        self.orders.respond(&key, page).await
    }

    async fn fetch_users(
        &self,
        query: UserListQuery,
    ) -> Result<PageResponse<UserSummary>, FetchError> {
        let key = query.search.clone().unwrap_or_default();
        let page = query.page;
        self.user_queries.lock().expect("queries lock").push(query);
        self.users.respond(&key, page).await
    }
}

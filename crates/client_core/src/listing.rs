use std::sync::Arc;

use shared::{domain::Product, protocol::STOREFRONT_PAGE_SIZE};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    api::CatalogApi,
    cart::{with_cart_flags, CartLookup, ProductView},
    error::FetchError,
    filters::{FilterField, FilterSet},
    paging::PageState,
};

const PRODUCTS_NOUN: &str = "products";

#[derive(Debug, Clone, PartialEq)]
pub enum ListingEvent {
    FiltersChanged {
        generation: u64,
        filters: FilterSet,
    },
    LoadStarted {
        page: u32,
        is_first_page: bool,
    },
    PageLoaded {
        page: u32,
        received: usize,
        total_items: usize,
        has_more: bool,
    },
    LoadFailed {
        page: u32,
        message: String,
    },
    StaleDiscarded {
        page: u32,
        generation: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded {
        page: u32,
        received: usize,
        has_more: bool,
    },
    Failed {
        page: u32,
        error: FetchError,
    },
    /// The filters changed while the request was in flight; nothing was applied.
    Stale { page: u32, generation: u64 },
}

impl LoadOutcome {
    pub fn page(&self) -> u32 {
        match self {
            LoadOutcome::Loaded { page, .. }
            | LoadOutcome::Failed { page, .. }
            | LoadOutcome::Stale { page, .. } => *page,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingSnapshot {
    pub filters: FilterSet,
    pub generation: u64,
    pub page: PageState,
    pub items: Vec<Product>,
    pub error: Option<String>,
}

struct ListingState {
    filters: FilterSet,
    generation: u64,
    page: PageState,
    items: Vec<Product>,
    error: Option<String>,
    first_page_requested: bool,
}

struct LoadTicket {
    page: u32,
    is_first_page: bool,
    generation: u64,
    filters: FilterSet,
}

pub struct ListingController {
    api: Arc<dyn CatalogApi>,
    inner: Mutex<ListingState>,
    events: broadcast::Sender<ListingEvent>,
}

impl ListingController {
    pub fn new(api: Arc<dyn CatalogApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            inner: Mutex::new(ListingState {
                filters: FilterSet::default(),
                generation: 0,
                page: PageState::default(),
                items: Vec::new(),
                error: None,
                first_page_requested: false,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ListingEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ListingSnapshot {
        let guard = self.inner.lock().await;
        ListingSnapshot {
            filters: guard.filters.clone(),
            generation: guard.generation,
            page: guard.page,
            items: guard.items.clone(),
            error: guard.error.clone(),
        }
    }

    pub async fn page_state(&self) -> PageState {
        self.inner.lock().await.page
    }

    pub async fn filters(&self) -> FilterSet {
        self.inner.lock().await.filters.clone()
    }

    pub async fn items(&self) -> Vec<Product> {
        self.inner.lock().await.items.clone()
    }

    pub async fn items_with_cart(&self, cart: &dyn CartLookup) -> Vec<ProductView> {
        let guard = self.inner.lock().await;
        with_cart_flags(&guard.items, cart)
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.lock().await.error.clone()
    }

    pub async fn set_search(&self, value: impl Into<String>) -> bool {
        self.set_filter(FilterField::Search, value).await
    }

    pub async fn set_category(&self, value: impl Into<String>) -> bool {
        self.set_filter(FilterField::Category, value).await
    }

    pub async fn set_min_price(&self, value: impl Into<String>) -> bool {
        self.set_filter(FilterField::MinPrice, value).await
    }

    pub async fn set_max_price(&self, value: impl Into<String>) -> bool {
        self.set_filter(FilterField::MaxPrice, value).await
    }

    pub async fn set_min_rating(&self, value: impl Into<String>) -> bool {
        self.set_filter(FilterField::MinRating, value).await
    }

    /// Returns `true` when the value changed; the caller then owes a page-1 load.
    pub async fn set_filter(&self, field: FilterField, value: impl Into<String>) -> bool {
        let value = value.into();
        self.update_filters(|filters| filters.set(field, value)).await
    }

    pub async fn set_filters(&self, filters: FilterSet) -> bool {
        self.update_filters(|current| {
            if *current == filters {
                return false;
            }
            *current = filters;
            true
        })
        .await
    }

    async fn update_filters(&self, update: impl FnOnce(&mut FilterSet) -> bool) -> bool {
        let mut guard = self.inner.lock().await;
        if !update(&mut guard.filters) {
            return false;
        }
        let generation = Self::start_new_session(&mut guard);
        let filters = guard.filters.clone();
        drop(guard);

        info!(generation, "listing filters changed");
        let _ = self
            .events
            .send(ListingEvent::FiltersChanged { generation, filters });
        true
    }

    /// Starts over from page 1 under the current filters, orphaning any in-flight page.
    pub async fn refresh(&self) -> LoadOutcome {
        {
            let mut guard = self.inner.lock().await;
            let generation = Self::start_new_session(&mut guard);
            debug!(generation, "listing refresh requested");
        }
        self.load_page(1, true).await
    }

    pub async fn load_page(&self, page_number: u32, is_first_page: bool) -> LoadOutcome {
        let ticket = {
            let mut guard = self.inner.lock().await;
            Self::begin_load(&mut guard, page_number, is_first_page)
        };
        self.run_load(ticket).await
    }

    pub async fn load_next_page(&self) -> Option<LoadOutcome> {
        let ticket = {
            let mut guard = self.inner.lock().await;
            // No page 2 before the session's page 1.
            if !guard.first_page_requested {
                return None;
            }
            let page = guard.page.try_advance()?;
            Self::begin_load(&mut guard, page, false)
        };
        Some(self.run_load(ticket).await)
    }

    fn start_new_session(state: &mut ListingState) -> u64 {
        state.generation += 1;
        state.page.reset();
        state.items.clear();
        state.error = None;
        state.first_page_requested = false;
        state.generation
    }

    fn begin_load(state: &mut ListingState, page_number: u32, is_first_page: bool) -> LoadTicket {
        let page = page_number.max(1);
        if is_first_page {
            state.first_page_requested = true;
            state.items.clear();
            state.page.has_more = true;
            state.error = None;
        }
        state.page.begin(page, is_first_page);
        LoadTicket {
            page,
            is_first_page,
            generation: state.generation,
            filters: state.filters.clone(),
        }
    }

    async fn run_load(&self, ticket: LoadTicket) -> LoadOutcome {
        let _ = self.events.send(ListingEvent::LoadStarted {
            page: ticket.page,
            is_first_page: ticket.is_first_page,
        });
        debug!(
            page = ticket.page,
            generation = ticket.generation,
            first = ticket.is_first_page,
            "requesting product page"
        );

        let result = self
            .api
            .fetch_products(ticket.filters.to_query(ticket.page, STOREFRONT_PAGE_SIZE))
            .await;

        let mut guard = self.inner.lock().await;
        if guard.generation != ticket.generation {
            drop(guard);
            debug!(
                page = ticket.page,
                generation = ticket.generation,
                "discarding response for outdated filters"
            );
            let _ = self.events.send(ListingEvent::StaleDiscarded {
                page: ticket.page,
                generation: ticket.generation,
            });
            return LoadOutcome::Stale {
                page: ticket.page,
                generation: ticket.generation,
            };
        }

        match result {
            Ok(response) => {
                let has_more = response.has_more_after(ticket.page);
                let received = response.items.len();
                if ticket.is_first_page {
                    guard.items = response.items;
                } else {
                    guard.items.extend(response.items);
                }
                guard.page.settle(has_more);
                let total_items = guard.items.len();
                drop(guard);

                info!(
                    page = ticket.page,
                    received,
                    total_items,
                    has_more,
                    "product page applied"
                );
                let _ = self.events.send(ListingEvent::PageLoaded {
                    page: ticket.page,
                    received,
                    total_items,
                    has_more,
                });
                LoadOutcome::Loaded {
                    page: ticket.page,
                    received,
                    has_more,
                }
            }
            Err(error) => {
                let message = error.user_message(PRODUCTS_NOUN);
                guard.error = Some(message.clone());
                guard.page.settle(false);
                drop(guard);

                warn!(page = ticket.page, %error, "product page failed");
                let _ = self.events.send(ListingEvent::LoadFailed {
                    page: ticket.page,
                    message,
                });
                LoadOutcome::Failed {
                    page: ticket.page,
                    error,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod filters;
pub mod listing;
pub mod paged_table;
pub mod paging;
pub mod scroll;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

pub use api::{AdminApi, CatalogApi, HttpCatalogApi};
pub use cart::{AddToCart, CartLine, CartLookup, EmptyCart, InMemoryCart, ProductView};
pub use config::{load_settings, load_settings_from, ClientSettings};
pub use error::{ConfigError, FetchError};
pub use filters::{FilterField, FilterSet};
pub use listing::{ListingController, ListingEvent, ListingSnapshot, LoadOutcome};
pub use paged_table::{
    AdminProductFilter, AdminProductPages, CatalogPages, OrderPages, PageSource, PagedTable,
    TableOutcome, TableSnapshot, UserPages,
};
pub use paging::{LoadPhase, PageCursor, PageState};
pub use scroll::{InfiniteScroll, ScrollStatus, ScrollTrigger, TriggerState, VisibilityEvent};

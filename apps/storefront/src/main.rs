use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    config::{normalize_api_url, DEFAULT_CONFIG_FILE},
    load_settings_from, AdminProductFilter, AdminProductPages, ClientSettings, EmptyCart,
    FilterSet, HttpCatalogApi, InfiniteScroll, ListingController, OrderPages, PageSource,
    PagedTable, ScrollStatus, TableSnapshot, TriggerState, UserPages, VisibilityEvent,
};
use serde_json::json;
use shared::domain::{Category, OrderStatus, OrderSummary, Product, UserSummary};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "runmate", about = "Browse the RunMate catalog and admin listings")]
struct Cli {
    /// Settings file; a missing file falls back to defaults and environment.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    api_url: Option<String>,
    /// Bearer token for the admin endpoints.
    #[arg(long)]
    token: Option<String>,
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CatalogFilters {
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long, default_value = "")]
    category: String,
    #[arg(long, default_value = "")]
    min_price: String,
    #[arg(long, default_value = "")]
    max_price: String,
    #[arg(long, default_value = "")]
    min_rating: String,
}

impl From<CatalogFilters> for FilterSet {
    fn from(args: CatalogFilters) -> Self {
        FilterSet {
            search: args.search,
            category: args.category,
            min_price: args.min_price,
            max_price: args.max_price,
            min_rating: args.min_rating,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Storefront listing; keeps scrolling until `--pages` pages are shown.
    Browse {
        #[command(flatten)]
        filters: CatalogFilters,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Admin {
        #[command(subcommand)]
        table: AdminTable,
    },
}

#[derive(Subcommand, Debug)]
enum AdminTable {
    Products {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        category: Option<Category>,
    },
    Orders {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        status: Option<OrderStatus>,
    },
    Users {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value = "")]
        search: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;
    info!(api_url = %settings.api_url, "runmate client ready");

    match cli.command {
        Command::Browse { filters, pages } => {
            browse(&settings, filters.into(), pages, cli.json).await
        }
        Command::Admin { table } => admin(&settings, table, cli.json).await,
    }
}

fn resolve_settings(cli: &Cli) -> Result<ClientSettings> {
    let mut settings = load_settings_from(&cli.config, |key| std::env::var(key).ok())
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    if let Some(api_url) = &cli.api_url {
        settings.api_url = normalize_api_url(api_url)?;
    }
    if let Some(token) = &cli.token {
        settings.auth_token = Some(token.trim().to_string()).filter(|token| !token.is_empty());
    }
    Ok(settings)
}

async fn browse(
    settings: &ClientSettings,
    filters: FilterSet,
    pages: u32,
    json: bool,
) -> Result<()> {
    let api = Arc::new(HttpCatalogApi::from_settings(settings)?);
    let listing = ListingController::new(api);
    listing.set_filters(filters).await;
    listing.load_page(1, true).await;

    if pages > 1 {
        let status = scroll_to_page(Arc::clone(&listing), pages).await?;
        debug!(fired = status.fired, "simulated scroll finished");
    }

    let snapshot = listing.snapshot().await;
    let views = listing.items_with_cart(&EmptyCart).await;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "filters": snapshot.filters,
                "page": snapshot.page,
                "items": views,
                "error": snapshot.error,
            }))?
        );
    } else {
        for view in &views {
            print_product(&view.product);
        }
        println!(
            "-- {} items, page {}{}",
            views.len(),
            snapshot.page.current_page,
            if snapshot.page.has_more { ", more available" } else { "" }
        );
    }

    if let Some(message) = snapshot.error {
        bail!(message);
    }
    Ok(())
}

/// Mounts the sentinel and keeps it visible until the trigger disarms.
async fn scroll_to_page(listing: Arc<ListingController>, pages: u32) -> Result<ScrollStatus> {
    let scroll = InfiniteScroll::new(listing).with_page_limit(pages);
    let mut status = scroll.status();
    let (tx, rx) = mpsc::channel(4);
    let driver = tokio::spawn(scroll.run(ReceiverStream::new(rx)));

    tx.send(VisibilityEvent::SentinelMounted).await?;
    tx.send(VisibilityEvent::Intersection { intersecting: true }).await?;
    status
        .wait_for(|status| {
            status.events_seen >= 2 && status.state != TriggerState::Firing && !status.fetching
        })
        .await?;
    drop(tx);
    Ok(driver.await?)
}

async fn admin(settings: &ClientSettings, table: AdminTable, json: bool) -> Result<()> {
    if settings.auth_token.is_none() {
        bail!("admin listings need a bearer token: pass --token or set RUNMATE_TOKEN");
    }
    let api = Arc::new(HttpCatalogApi::from_settings(settings)?);
    match table {
        AdminTable::Products {
            page,
            search,
            category,
        } => {
            let table = PagedTable::new(AdminProductPages::new(api));
            let snapshot = open_table(&table, AdminProductFilter { search, category }, page).await;
            render(&snapshot, json, print_product)
        }
        AdminTable::Orders { page, status } => {
            let table = PagedTable::new(OrderPages::new(api));
            let snapshot = open_table(&table, status, page).await;
            render(&snapshot, json, print_order)
        }
        AdminTable::Users { page, search } => {
            let table = PagedTable::new(UserPages::new(api));
            let snapshot = open_table(&table, search, page).await;
            render(&snapshot, json, print_user)
        }
    }
}

/// Loads page 1 under `filter`, then jumps to `page` once the page count is known.
async fn open_table<S: PageSource>(
    table: &PagedTable<S>,
    filter: S::Filter,
    page: u32,
) -> TableSnapshot<S::Item, S::Filter> {
    if table.set_filter(filter).await.is_none() {
        table.reload().await;
    }
    if page > 1 {
        table.go_to_page(page).await;
    }
    table.snapshot().await
}

fn render<T, F>(snapshot: &TableSnapshot<T, F>, json: bool, print_row: fn(&T)) -> Result<()>
where
    T: serde::Serialize,
{
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "page": snapshot.cursor.page,
                "total_pages": snapshot.cursor.total_pages,
                "rows": snapshot.rows,
                "error": snapshot.error,
            }))?
        );
    } else {
        snapshot.rows.iter().for_each(print_row);
        println!(
            "-- page {} of {}",
            snapshot.cursor.page,
            snapshot.cursor.total_pages.max(1)
        );
    }
    if let Some(message) = &snapshot.error {
        bail!(message.clone());
    }
    Ok(())
}

fn print_product(product: &Product) {
    println!(
        "{:<26} {:>9.2} {:>4} {:>5} in stock  {}",
        product.id.as_str(),
        product.price,
        format!("{:.1}", product.rating),
        product.stock,
        product.name
    );
}

fn print_order(order: &OrderSummary) {
    println!(
        "#{} {:<10} {:<9} {:>10.2} {}",
        order.id.short(),
        order.status.as_query_value(),
        format!("{:?}", order.payment_status).to_lowercase(),
        order.total_amount,
        order
            .created_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    );
}

fn print_user(user: &UserSummary) {
    println!(
        "{:<24} {:<32} {}",
        user.name,
        user.email,
        if user.is_admin { "admin" } else { "customer" }
    );
}

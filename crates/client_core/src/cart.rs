use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use serde::Serialize;
use shared::domain::{Product, ProductId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

/// Read-only, id-keyed view of the shopper's cart. Listings ask it whether an
/// item is already in the cart; they never hold on to the answer.
pub trait CartLookup: Send + Sync {
    fn cart_item(&self, product_id: &ProductId) -> Option<CartLine>;

    fn contains(&self, product_id: &ProductId) -> bool {
        self.cart_item(product_id).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddToCart {
    Added,
    AlreadyInCart,
    OutOfStock,
}

#[derive(Debug, Default)]
pub struct InMemoryCart {
    lines: RwLock<HashMap<ProductId, CartLine>>,
}

impl InMemoryCart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity changes for an existing line go through the cart screen, so a
    /// second add of the same product is refused rather than merged.
    pub fn add(&self, product: &Product, quantity: u32) -> AddToCart {
        if !product.in_stock() {
            return AddToCart::OutOfStock;
        }
        let mut lines = self.lines.write().unwrap_or_else(PoisonError::into_inner);
        if lines.contains_key(&product.id) {
            return AddToCart::AlreadyInCart;
        }
        let max_quantity = u32::try_from(product.stock).unwrap_or(u32::MAX);
        lines.insert(
            product.id.clone(),
            CartLine {
                product_id: product.id.clone(),
                name: product.name.clone(),
                unit_price: product.price,
                quantity: quantity.clamp(1, max_quantity),
            },
        );
        AddToCart::Added
    }

    pub fn remove(&self, product_id: &ProductId) -> Option<CartLine> {
        self.lines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(product_id)
    }

    pub fn len(&self) -> usize {
        self.lines.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subtotal(&self) -> f64 {
        self.lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|line| line.unit_price * f64::from(line.quantity))
            .sum()
    }
}

impl CartLookup for InMemoryCart {
    fn cart_item(&self, product_id: &ProductId) -> Option<CartLine> {
        self.lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product_id)
            .cloned()
    }
}

pub struct EmptyCart;

impl CartLookup for EmptyCart {
    fn cart_item(&self, _product_id: &ProductId) -> Option<CartLine> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub in_cart: bool,
}

pub fn with_cart_flags(products: &[Product], cart: &dyn CartLookup) -> Vec<ProductView> {
    products
        .iter()
        .map(|product| ProductView {
            in_cart: cart.contains(&product.id),
            product: product.clone(),
        })
        .collect()
}

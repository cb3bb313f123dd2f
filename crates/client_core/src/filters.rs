use serde::{Deserialize, Serialize};
use shared::protocol::ProductListQuery;

/// Search, category, price bounds and minimum rating scoping a catalog query.
///
/// Every field is raw user input. An empty string means "unset"; numeric fields
/// are never parsed here and reach the backend exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub min_price: String,
    #[serde(default)]
    pub max_price: String,
    #[serde(default)]
    pub min_rating: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Search,
    Category,
    MinPrice,
    MaxPrice,
    MinRating,
}

impl FilterSet {
    pub fn get(&self, field: FilterField) -> &str {
        match field {
            FilterField::Search => &self.search,
            FilterField::Category => &self.category,
            FilterField::MinPrice => &self.min_price,
            FilterField::MaxPrice => &self.max_price,
            FilterField::MinRating => &self.min_rating,
        }
    }

    /// Returns whether the stored value actually changed.
    pub fn set(&mut self, field: FilterField, value: impl Into<String>) -> bool {
        let value = value.into();
        let slot = match field {
            FilterField::Search => &mut self.search,
            FilterField::Category => &mut self.category,
            FilterField::MinPrice => &mut self.min_price,
            FilterField::MaxPrice => &mut self.max_price,
            FilterField::MinRating => &mut self.min_rating,
        };
        if *slot == value {
            return false;
        }
        *slot = value;
        true
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_query(&self, page: u32, limit: u32) -> ProductListQuery {
        ProductListQuery {
            search: non_empty(&self.search),
            category: non_empty(&self.category),
            min_price: non_empty(&self.min_price),
            max_price: non_empty(&self.max_price),
            min_rating: non_empty(&self.min_rating),
            page,
            limit,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

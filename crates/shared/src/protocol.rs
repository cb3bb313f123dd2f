use serde::{Deserialize, Serialize};

use crate::{
    domain::{OrderSummary, Product, UserSummary},
    error::ApiError,
};

pub const STOREFRONT_PAGE_SIZE: u32 = 12;
pub const ADMIN_TABLE_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    /// Total page count reported by the server.
    pub pages: u32,
}

impl<T> PageResponse<T> {
    pub fn has_more_after(&self, page: u32) -> bool {
        page < self.pages
    }
}

macro_rules! list_envelope {
    ($name:ident, $field:ident, $item:ty) => {
        /// `{ success, <items>, pages, message? }` envelope. Missing or null
        /// collections decode as empty; a missing page count decodes as 0.
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        pub struct $name {
            #[serde(default)]
            pub success: bool,
            #[serde(default)]
            pub $field: Option<Vec<$item>>,
            #[serde(default)]
            pub pages: Option<u32>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub message: Option<String>,
        }

        impl $name {
            pub fn ok(items: Vec<$item>, pages: u32) -> Self {
                Self {
                    success: true,
                    $field: Some(items),
                    pages: Some(pages),
                    message: None,
                }
            }

            pub fn failure(message: impl Into<String>) -> Self {
                Self {
                    success: false,
                    $field: None,
                    pages: None,
                    message: Some(message.into()),
                }
            }

            pub fn into_page(self, default_message: &str) -> Result<PageResponse<$item>, ApiError> {
                if !self.success {
                    return Err(ApiError::rejected(self.message, default_message));
                }
                Ok(PageResponse {
                    items: self.$field.unwrap_or_default(),
                    pages: self.pages.unwrap_or(0),
                })
            }
        }
    };
}

list_envelope!(ProductListResponse, products, Product);
list_envelope!(OrderListResponse, orders, OrderSummary);
list_envelope!(UserListResponse, users, UserSummary);

/// Query string for `GET /products` and `GET /admin/products`. Unset filters are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<String>,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_products_is_an_empty_page() {
        let envelope: ProductListResponse =
            serde_json::from_str(r#"{"success":true,"products":null}"#).expect("envelope");
        let page = envelope.into_page("Failed to fetch products").expect("page");
        assert!(page.items.is_empty());
        assert_eq!(page.pages, 0);
        assert!(!page.has_more_after(1));
    }

    #[test]
    fn unsuccessful_envelope_surfaces_message() {
        let envelope: OrderListResponse =
            serde_json::from_str(r#"{"success":false,"message":"Not authorized"}"#)
                .expect("envelope");
        let err = envelope
            .into_page("Failed to fetch orders")
            .expect_err("rejected");
        assert_eq!(err.message, "Not authorized");
    }

    #[test]
    fn has_more_is_strictly_less_than_pages() {
        let page = PageResponse::<Product> {
            items: Vec::new(),
            pages: 3,
        };
        assert!(page.has_more_after(2));
        assert!(!page.has_more_after(3));
    }

    #[test]
    fn product_query_uses_backend_parameter_names() {
        let query = ProductListQuery {
            min_price: Some("10".into()),
            page: 2,
            limit: STOREFRONT_PAGE_SIZE,
            ..ProductListQuery::default()
        };
        let json = serde_json::to_value(&query).expect("json");
        assert_eq!(json["minPrice"], "10");
        assert_eq!(json["limit"], 12);
        assert!(json.get("search").is_none());
    }
}

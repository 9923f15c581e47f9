//! Order ledger queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::UserId;
use stockroom_orders::Order;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 1000;

/// Pagination parameters for order queries.
///
/// `limit` always lies in `1..=1000`, including after deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PaginationParams")]
pub struct Pagination {
    limit: u32,
    offset: u32,
}

#[derive(Deserialize)]
struct PaginationParams {
    limit: Option<u32>,
    offset: Option<u32>,
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        Self::new(params.limit, params.offset)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0),
        }
    }

    /// 1-based page number of `size` orders.
    pub fn page(page: u32, size: u32) -> Self {
        let limit = size.clamp(1, MAX_PAGE_SIZE);
        Self {
            limit,
            offset: page.max(1).saturating_sub(1).saturating_mul(limit),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }
}

/// Filter criteria for order queries. Empty filter matches every order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQuery {
    pub user_id: Option<UserId>,
    /// Inclusive lower bound on placement time.
    pub placed_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on placement time.
    pub placed_before: Option<DateTime<Utc>>,
}

impl OrderQuery {
    pub fn matches(&self, order: &Order) -> bool {
        self.user_id.is_none_or(|u| order.user_id() == u)
            && self.placed_after.is_none_or(|t| order.placed_at() >= t)
            && self.placed_before.is_none_or(|t| order.placed_at() <= t)
    }
}

/// One page of orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    /// Number of orders matching the filter across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl OrderPage {
    pub fn new(orders: Vec<Order>, total: u64, pagination: Pagination) -> Self {
        let has_more = total > u64::from(pagination.offset) + u64::from(pagination.limit);
        Self {
            orders,
            total,
            pagination,
            has_more,
        }
    }
}

use thiserror::Error;

use crate::{
    db_types::{AccountId, OrderId, RevenueRecord},
    traits::RevenueRecognition,
};

#[allow(async_fn_in_trait)]
pub trait RevenueManagement {
    /// Atomically stores the revenue record for the order, credits the seller's wallet with the net amount and credits
    /// the platform account with the platform fee.
    ///
    /// If a record for the order already exists nothing is written, and the existing record is returned with
    /// `newly_recognized` set to false.
    async fn recognize_revenue(&self, record: RevenueRecord) -> Result<RevenueRecognition, RevenueError>;

    async fn fetch_revenue_record(&self, order_id: &OrderId) -> Result<Option<RevenueRecord>, RevenueError>;

    async fn fetch_revenue_for_seller(&self, seller_id: &AccountId) -> Result<Vec<RevenueRecord>, RevenueError>;
}

#[derive(Debug, Clone, Error)]
pub enum RevenueError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Revenue record is inconsistent: {0}")]
    InvalidRecord(String),
}

impl From<sqlx::Error> for RevenueError {
    fn from(e: sqlx::Error) -> Self {
        RevenueError::DatabaseError(e.to_string())
    }
}

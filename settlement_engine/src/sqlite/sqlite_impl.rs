//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Multi-statement operations run inside a single database transaction, and each begins with a write so that
//! concurrent writers queue on SQLite's lock instead of failing on a lock upgrade.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, inventory, new_pool, orders, revenue, wallets};
use crate::{
    db_types::{
        AccountId,
        ArtisanResponse,
        CostAbsorption,
        CourierDelivery,
        CourierStatus,
        LedgerEntry,
        NewOrder,
        NewProduct,
        Order,
        OrderId,
        OrderStatus,
        PaymentStatus,
        Product,
        ProductId,
        RevenueRecord,
        ScheduleSlot,
        WalletAccount,
        WalletTransaction,
    },
    traits::{
        InventoryError,
        InventoryManagement,
        OrderManagement,
        OrderQueryFilter,
        OrderStoreError,
        ReservationLine,
        RevenueError,
        RevenueManagement,
        RevenueRecognition,
        SettlementDatabase,
        WalletError,
        WalletManagement,
    },
};
use settle_common::Rate;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `MKT_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Applies any outstanding schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(order_id, &mut conn).await?)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut *tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn transition_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
        reason: Option<String>,
    ) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::transition_status(order_id, from, to, reason, &mut conn).await?)
    }

    async fn claim_capture(&self, order_id: &OrderId, lease: Duration) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::claim_capture(order_id, lease, &mut conn).await?)
    }

    async fn release_capture_claim(&self, order_id: &OrderId) -> Result<(), OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::release_capture_claim(order_id, &mut conn).await?)
    }

    async fn mark_payment_captured(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::mark_payment_captured(order_id, &mut conn).await?)
    }

    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::update_payment_status(order_id, from, to, &mut conn).await?)
    }

    async fn snapshot_commission_rate(&self, order_id: &OrderId, rate: Rate) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::snapshot_commission_rate(order_id, rate, &mut conn).await
    }

    async fn record_settlement_error(&self, order_id: &OrderId, error: Option<String>) -> Result<(), OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::record_settlement_error(order_id, error, &mut conn).await?)
    }

    async fn record_payout_transfer(&self, order_id: &OrderId, transfer_ref: &str) -> Result<bool, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::record_payout_transfer(order_id, transfer_ref, &mut conn).await?)
    }

    async fn set_cost_absorption(
        &self,
        order_id: &OrderId,
        absorption: &CostAbsorption,
    ) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::set_cost_absorption(order_id, absorption, &mut conn).await
    }

    async fn respond_to_cost_absorption(
        &self,
        order_id: &OrderId,
        response: ArtisanResponse,
    ) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::respond_to_cost_absorption(order_id, response, &mut conn).await?)
    }

    async fn book_courier_delivery(
        &self,
        order_id: &OrderId,
        delivery: &CourierDelivery,
    ) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::book_courier_delivery(order_id, delivery, &mut conn).await?)
    }

    async fn update_courier_delivery(
        &self,
        order_id: &OrderId,
        delivery: &CourierDelivery,
    ) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_courier_delivery(order_id, delivery, &mut conn)
            .await?
            .ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))
    }

    async fn update_courier_status(
        &self,
        delivery_id: &str,
        status: CourierStatus,
    ) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::update_courier_status(delivery_id, status, &mut conn).await?)
    }

    async fn fetch_order_by_delivery_id(&self, delivery_id: &str) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_delivery_id(delivery_id, &mut conn).await?)
    }

    async fn fetch_stale_authorized_orders(&self, older_than: Duration) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_stale_authorized_orders(older_than, &mut conn).await?)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::search_orders(query, &mut conn).await?)
    }
}

impl WalletManagement for SqliteDatabase {
    async fn fetch_wallet(&self, account_id: &AccountId) -> Result<Option<WalletAccount>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        Ok(wallets::fetch_wallet(account_id, &mut conn).await?)
    }

    async fn credit(&self, entry: LedgerEntry) -> Result<(WalletTransaction, bool), WalletError> {
        let mut tx = self.pool.begin().await?;
        let result = wallets::credit(&entry, &mut *tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn debit(&self, entry: LedgerEntry) -> Result<(WalletTransaction, bool), WalletError> {
        let mut tx = self.pool.begin().await?;
        match wallets::debit(&entry, &mut *tx).await {
            Ok(result) => {
                tx.commit().await?;
                Ok(result)
            },
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            },
        }
    }

    async fn fetch_transactions(&self, account_id: &AccountId) -> Result<Vec<WalletTransaction>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        Ok(wallets::fetch_transactions(account_id, &mut conn).await?)
    }

    async fn fetch_transactions_for_order(&self, order_id: &OrderId) -> Result<Vec<WalletTransaction>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        Ok(wallets::fetch_transactions_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_payout_destination(&self, account_id: &AccountId) -> Result<Option<String>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        Ok(wallets::fetch_payout_destination(account_id, &mut conn).await?)
    }

    async fn set_payout_destination(&self, account_id: &AccountId, destination: &str) -> Result<(), WalletError> {
        let mut conn = self.pool.acquire().await?;
        Ok(wallets::set_payout_destination(account_id, destination, &mut conn).await?)
    }
}

impl RevenueManagement for SqliteDatabase {
    async fn recognize_revenue(&self, record: RevenueRecord) -> Result<RevenueRecognition, RevenueError> {
        let mut tx = self.pool.begin().await?;
        match revenue::recognize_revenue(record, &mut *tx).await {
            Ok(result) => {
                tx.commit().await?;
                Ok(result)
            },
            Err(e) => {
                warn!("🗃️ Revenue recognition rolled back: {e}");
                tx.rollback().await?;
                Err(e)
            },
        }
    }

    async fn fetch_revenue_record(&self, order_id: &OrderId) -> Result<Option<RevenueRecord>, RevenueError> {
        let mut conn = self.pool.acquire().await?;
        Ok(revenue::fetch_revenue_record(order_id, &mut conn).await?)
    }

    async fn fetch_revenue_for_seller(&self, seller_id: &AccountId) -> Result<Vec<RevenueRecord>, RevenueError> {
        let mut conn = self.pool.acquire().await?;
        Ok(revenue::fetch_revenue_for_seller(seller_id, &mut conn).await?)
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn reserve(&self, lines: &[ReservationLine]) -> Result<(), InventoryError> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            if let Err(e) = inventory::reserve_line(line, &mut *tx).await {
                debug!("🗃️ Reservation failed, rolling back: {e}");
                tx.rollback().await?;
                return Err(e);
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn restore(&self, lines: &[ReservationLine]) -> Result<(), InventoryError> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            if let Err(e) = inventory::restore_line(line, &mut *tx).await {
                tx.rollback().await?;
                return Err(e);
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(inventory::fetch_product(product_id, &mut conn).await?)
    }

    async fn fetch_slots(&self, product_id: &ProductId) -> Result<Vec<ScheduleSlot>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(inventory::fetch_slots(product_id, &mut conn).await?)
    }

    async fn upsert_product(&self, product: NewProduct) -> Result<Product, InventoryError> {
        let mut tx = self.pool.begin().await?;
        let product = inventory::upsert_product(product, &mut *tx).await?;
        tx.commit().await?;
        Ok(product)
    }
}

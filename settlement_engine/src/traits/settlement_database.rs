use crate::traits::{InventoryManagement, OrderManagement, RevenueManagement, WalletManagement};

/// This trait defines the complete set of behaviour a storage backend must provide to run the settlement engine.
///
/// It adds nothing of its own beyond the backend URL; it exists so that API structs can take a single generic bound.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase:
    Clone + OrderManagement + WalletManagement + RevenueManagement + InventoryManagement
{
    /// The URL of the database
    fn url(&self) -> &str;
}

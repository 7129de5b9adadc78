use cucumber::given;
use settle_common::Rate;
use settlement_engine::{
    db_types::{AccountId, FulfillmentType, LedgerEntry, NewProduct, ProductId, WalletTransactionType},
    FeeSchedule,
    StaticFeeConfig,
};

use crate::cucumber::{
    settlement_world::{money, MarketplaceSystem},
    SettlementWorld,
};

fn rate(s: &str) -> Rate {
    s.parse().unwrap_or_else(|e| panic!("{s} is not a rate: {e}"))
}

#[given(expr = "a fresh marketplace charging {word}% commission and {word}% + {word} processing")]
async fn fresh_marketplace(world: &mut SettlementWorld, commission: String, processing: String, fixed: String) {
    let schedule = FeeSchedule { processing_rate: rate(&processing), processing_fixed: money(&fixed) };
    let fees = StaticFeeConfig::new(rate(&commission), schedule);
    world.system = Some(MarketplaceSystem::new(fees).await);
}

#[given(expr = "product {string} with {int} in stock")]
async fn product_in_stock(world: &mut SettlementWorld, product: String, stock: i64) {
    let product = NewProduct {
        product_id: ProductId::from(product),
        seller_id: AccountId::from("potter"),
        fulfillment_type: FulfillmentType::ReadyToShip,
        stock,
        available_quantity: stock,
        production_capacity: 0,
        slots: vec![],
    };
    world.api().inventory().upsert_product(product).await.expect("Error storing product");
}

#[given(expr = "{string} has {word} in their wallet")]
async fn wallet_balance(world: &mut SettlementWorld, account: String, amount: String) {
    let entry = LedgerEntry::new(AccountId::from(account.as_str()), money(&amount), WalletTransactionType::TransferIn, "Top up")
        .with_idempotency_key(format!("topup:{account}"));
    world.api().wallet().credit(entry).await.expect("Error topping up wallet");
}

#[given(expr = "the seller's payout destination is {string}")]
async fn payout_destination(world: &mut SettlementWorld, destination: String) {
    world
        .api()
        .wallet()
        .set_payout_destination(&AccountId::from("potter"), &destination)
        .await
        .expect("Error storing payout destination");
}

#[given(expr = "the courier now quotes {word}")]
async fn courier_quotes(world: &mut SettlementWorld, fee: String) {
    world.system().courier.set_quote_fee(money(&fee));
}

pub mod settlement_world;
pub mod setups;
pub mod steps;

pub use settlement_world::SettlementWorld;

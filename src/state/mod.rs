pub mod deal_store;

pub use deal_store::DealStore;

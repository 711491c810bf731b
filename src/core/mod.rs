pub mod errors;
pub mod execution;
pub mod gates;
pub mod monitor;
pub mod product;
pub mod product_queue;
pub mod roles;
pub mod theft_ledger;

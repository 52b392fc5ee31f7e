pub mod filter;
pub mod stock;

pub mod constituents;
pub mod fetcher;
pub mod provider;
pub mod types;

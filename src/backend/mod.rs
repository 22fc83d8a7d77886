//! Backend access: the row store seam, its PostgREST implementation and the
//! concurrent dashboard loader.

pub mod fetcher;
#[cfg(test)]
pub mod memory;
pub mod rest;
pub mod store;

pub use fetcher::{DashboardData, DataFetcher};
pub use rest::RestClient;
pub use store::{RowQuery, RowStore};

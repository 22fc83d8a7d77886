//! Analysis modules.
//!
//! Aggregation is pure: it never touches the network and takes the
//! evaluation date as an argument.

pub mod aggregator;

pub use aggregator::*;

//! Printable agent statements.

pub mod generator;
pub mod statement;

pub use generator::{generate_statement_html, write_statement};
pub use statement::AgentStatement;

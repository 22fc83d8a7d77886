//! Admin dashboard: load cycle and presentation.

pub mod controller;
pub mod view;

pub use controller::{DashboardController, DashboardState, Liveness};
pub use view::{DashboardView, Navigator, Route};

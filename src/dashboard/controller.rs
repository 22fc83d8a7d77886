//! Dashboard load cycle: loading indicator, fetch, aggregate, swap.

use crate::analysis::{aggregate, AggregateOptions, DashboardSnapshot};
use crate::backend::{DataFetcher, RowStore};
use crate::models::DateRange;
use crate::notify::Notifier;
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Shared "view still mounted" flag.
///
/// Tearing down does not cancel requests already in flight; their results
/// are dropped instead of written.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn teardown(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// What the dashboard is currently showing.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardState {
    Loading,
    Ready(Box<DashboardSnapshot>),
    Failed(String),
}

pub struct DashboardController<S> {
    fetcher: DataFetcher<S>,
    options: AggregateOptions,
    liveness: Liveness,
    state: DashboardState,
    show_progress: bool,
}

impl<S: RowStore> DashboardController<S> {
    pub fn new(fetcher: DataFetcher<S>, options: AggregateOptions, show_progress: bool) -> Self {
        Self {
            fetcher,
            options,
            liveness: Liveness::new(),
            state: DashboardState::Loading,
            show_progress,
        }
    }

    /// Handle for tearing the dashboard down from elsewhere.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn fetcher(&self) -> &DataFetcher<S> {
        &self.fetcher
    }

    /// Load and aggregate `range`. The state only changes once every fetch
    /// has settled; a failure is reported to `notifier` exactly once.
    pub async fn load(
        &mut self,
        range: DateRange,
        today: NaiveDate,
        notifier: &dyn Notifier,
    ) -> &DashboardState {
        if !self.liveness.is_alive() {
            debug!("Dashboard torn down; skipping load");
            return &self.state;
        }

        self.state = DashboardState::Loading;
        let spinner = self.spinner(range);

        let result = self.fetcher.load_dashboard(range, today).await;

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        if !self.liveness.is_alive() {
            debug!("Dashboard torn down during load; discarding result");
            return &self.state;
        }

        self.state = match result {
            Ok(data) => {
                let snapshot = aggregate(
                    data.range,
                    &data.rows,
                    &data.activity,
                    data.summary.as_ref(),
                    self.options,
                    today,
                );
                info!(
                    "Dashboard ready: {} agents outstanding, {} alerts",
                    snapshot.outstanding.len(),
                    snapshot.alerts.len()
                );
                DashboardState::Ready(Box::new(snapshot))
            }
            Err(e) => {
                notifier.error(&format!("Failed to load dashboard: {}", e));
                DashboardState::Failed(e.to_string())
            }
        };

        &self.state
    }

    fn spinner(&self, range: DateRange) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Loading dashboard ({})...", range));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}

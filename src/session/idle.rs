//! Inactivity sign-out.
//!
//! A privileged session is signed out after a period with no activity.
//! Any activity event resets the countdown. Dropping the timer tears it
//! down without signing out.

use super::Session;
use crate::config::SessionConfig;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Input that counts as "the operator is still here".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)] // The console only produces key presses
pub enum ActivityEvent {
    KeyPress,
    PointerMove,
    Click,
    Scroll,
    Touch,
}

/// Running inactivity countdown for one session.
pub struct IdleTimer {
    activity: mpsc::UnboundedSender<ActivityEvent>,
    expired: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

/// True if `route` is one of `excluded`, or nested below one.
pub fn is_excluded_route(route: &str, excluded: &[String]) -> bool {
    excluded.iter().any(|r| {
        let base = r.trim_end_matches('/');
        route == r || route == base || route.starts_with(&format!("{}/", base))
    })
}

impl IdleTimer {
    /// Start the countdown for `session` on `route`.
    ///
    /// Returns `None` when the role is not privileged, the route is
    /// excluded, or the timeout is zero. Must be called inside a tokio
    /// runtime.
    pub fn arm(session: &Session, route: &str, config: &SessionConfig) -> Option<Self> {
        if !session.is_privileged(config) {
            debug!("Idle timer not armed for role {}", session.role);
            return None;
        }
        if is_excluded_route(route, &config.excluded_routes) {
            debug!("Idle timer not armed on excluded route {}", route);
            return None;
        }
        if config.idle_timeout_minutes == 0 {
            return None;
        }

        let minutes = config.idle_timeout_minutes;
        let timeout = Duration::from_secs(minutes * 60);
        let (activity, mut events) = mpsc::unbounded_channel();
        let (expired_tx, expired) = watch::channel(false);
        let session = session.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        warn!("No activity for {} minutes; signing out", minutes);
                        session.sign_out(&format!("idle for {} minutes", minutes));
                        let _ = expired_tx.send(true);
                        break;
                    }
                    event = events.recv() => match event {
                        Some(event) => debug!("Activity {:?}; idle countdown reset", event),
                        None => break,
                    }
                }
            }
        });

        info!("Idle sign-out armed: {} minutes", minutes);
        Some(Self {
            activity,
            expired,
            task,
        })
    }

    /// Record activity, restarting the countdown.
    pub fn touch(&self, event: ActivityEvent) {
        let _ = self.activity.send(event);
    }

    /// Resolves once the countdown has run out. Never resolves if the timer
    /// was torn down first.
    pub async fn expired(&mut self) {
        loop {
            if *self.expired.borrow() {
                return;
            }
            if self.expired.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Tear down and re-arm for a role change.
    pub fn rearm(self, session: &Session, route: &str, config: &SessionConfig) -> Option<Self> {
        drop(self);
        Self::arm(session, route, config)
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

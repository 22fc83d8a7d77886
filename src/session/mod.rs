//! The signed-in operator.
//!
//! Authentication happens elsewhere; this crate is handed a [`Session`] and
//! only decides whether the inactivity timer applies to it.

pub mod idle;

pub use idle::{ActivityEvent, IdleTimer};

use crate::config::SessionConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Who is using the console.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: String,
    pub role: String,
    signed_in: Arc<AtomicBool>,
}

impl Session {
    pub fn new(user: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            role: role.into(),
            signed_in: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the idle sign-out applies to this role.
    pub fn is_privileged(&self, config: &SessionConfig) -> bool {
        config
            .privileged_roles
            .iter()
            .any(|r| r.eq_ignore_ascii_case(&self.role))
    }

    pub fn is_signed_in(&self) -> bool {
        self.signed_in.load(Ordering::SeqCst)
    }

    pub fn sign_out(&self, reason: &str) {
        if self.signed_in.swap(false, Ordering::SeqCst) {
            info!("Signed out {} ({}): {}", self.user, self.role, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privileged_roles_case_insensitive() {
        let config = SessionConfig::default();
        assert!(Session::new("kwame", "Admin").is_privileged(&config));
        assert!(!Session::new("efua", "clerk").is_privileged(&config));
    }

    #[test]
    fn test_sign_out_is_shared_between_clones() {
        let session = Session::new("kwame", "admin");
        let handle = session.clone();
        assert!(session.is_signed_in());
        handle.sign_out("test");
        assert!(!session.is_signed_in());
    }
}

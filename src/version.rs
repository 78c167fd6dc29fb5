//! Layout generations and cooperative cancellation.
//!
//! Every wholesale rebuild or teardown of the layout starts a new generation.
//! In-flight draws capture the generation they started in and drop their
//! result once it is no longer current. The generation also owns a
//! [`CancelToken`] that is tripped on bump, so painters that poll it can stop
//! work instead of finishing a draw nobody will look at.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use log::debug;

/// Shared cancellation flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Monotonic layout generation counter plus the token for that generation.
#[derive(Debug, Default)]
pub struct LayoutVersion {
    value: u64,
    token: CancelToken,
}

impl LayoutVersion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.value
    }

    pub fn is_current(&self, version: u64) -> bool {
        self.value == version
    }

    /// Token handed to draws started in the current generation.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Start a new generation, cancelling everything started in the old one.
    pub fn bump(&mut self) -> u64 {
        self.token.cancel();
        self.token = CancelToken::new();
        self.value += 1;
        debug!("version: layout generation {}", self.value);
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_clones_share_state() {
        let token = CancelToken::new();
        let worker = token.clone();
        assert!(!worker.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(worker.is_cancelled());
    }

    #[test]
    fn bump_invalidates_previous_generation() {
        let mut version = LayoutVersion::new();
        let captured = version.current();
        let token = version.token();

        let next = version.bump();
        assert_eq!(next, captured + 1);
        assert!(!version.is_current(captured));
        assert!(version.is_current(next));
        assert!(token.is_cancelled());
        assert!(!version.token().is_cancelled());
    }
}

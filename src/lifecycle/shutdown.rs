//! Shutdown coordination.

use tokio_util::sync::CancellationToken;

use crate::lifecycle::signals;

/// Coordinator for graceful shutdown.
///
/// Long-running tasks hold a child of the root token; a single
/// [`Shutdown::trigger`] reaches all of them.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// The root token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// A token cancelled together with the root, or on its own.
    pub fn subscribe(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Wait for SIGINT or SIGTERM, then trigger.
    pub async fn wait_for_signal(&self) {
        signals::terminate_signal().await;
        self.trigger();
    }
}

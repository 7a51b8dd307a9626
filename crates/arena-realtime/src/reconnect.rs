//! What happens after the link drops.
//!
//! The client never reconnects on its own. After every teardown that the
//! application did not ask for, it calls the configured [`ReconnectPolicy`]
//! once, after the `Disconnected` event has been delivered.

use tracing::info;

use crate::events::DisconnectCause;

/// Hook invoked after a non-user disconnect.
pub trait ReconnectPolicy: Send + Sync + 'static {
    /// The link closed for `cause`.
    fn on_disconnect(&self, cause: &DisconnectCause);
}

impl<F> ReconnectPolicy for F
where
    F: Fn(&DisconnectCause) + Send + Sync + 'static,
{
    fn on_disconnect(&self, cause: &DisconnectCause) {
        self(cause);
    }
}

/// Leaves reconnection to the application.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualReconnect;

impl ReconnectPolicy for ManualReconnect {
    fn on_disconnect(&self, cause: &DisconnectCause) {
        info!(%cause, "realtime link lost; reconnect is left to the application");
    }
}

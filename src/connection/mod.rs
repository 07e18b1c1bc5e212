//! Platform connections
//!
//! - [`ConnectionStore`]: cached connected/disconnected status per platform
//! - [`ConnectionManager`]: the external-auth handshake and disconnect
//! - [`CallbackServer`]: loopback listener for completion messages

mod callback;
mod handshake;
mod manager;
mod store;
mod window;

pub use callback::{
    CallbackRejection, CallbackServer, CallbackStatus, OAuthCallback, OAUTH_CALLBACK_TYPE,
};
pub use handshake::{FailureReason, HandshakeState};
pub use manager::{ConnectionManager, ConnectionManagerParts};
pub use store::ConnectionStore;
pub use window::{AuthWindow, AuthWindowLauncher, SystemBrowser};

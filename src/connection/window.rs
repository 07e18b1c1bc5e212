//! Detached authorization contexts
//!
//! The embedding host decides what "opening the sign-in page" means: an in-page
//! popup, a webview, or the system browser. The manager only needs to open one
//! and later ask whether it has been closed.

use crate::{CrosspostError, Result};

/// An opened sign-in context
pub trait AuthWindow: Send + Sync {
    /// True once the user (or the host) closed the context
    fn is_closed(&self) -> bool;

    /// Close the context; closing twice is harmless
    fn close(&self);
}

/// Opens sign-in contexts
pub trait AuthWindowLauncher: Send + Sync {
    /// Open `url`; an error means the context was blocked
    fn open(&self, url: &str) -> Result<Box<dyn AuthWindow>>;

    /// Whether completion can only arrive through the loopback callback listener
    fn needs_callback_listener(&self) -> bool {
        false
    }
}

/// Launcher that hands the URL to the operating system's browser
///
/// The browser tab cannot be observed, so completion arrives only through the
/// callback listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

struct BrowserTab;

impl AuthWindow for BrowserTab {
    fn is_closed(&self) -> bool {
        false
    }

    fn close(&self) {}
}

impl AuthWindowLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<Box<dyn AuthWindow>> {
        tracing::debug!(url = url, "Opening sign-in page in system browser");
        open::that(url)
            .map_err(|e| CrosspostError::Other(format!("Could not open browser: {}", e)))?;
        Ok(Box::new(BrowserTab))
    }

    fn needs_callback_listener(&self) -> bool {
        true
    }
}

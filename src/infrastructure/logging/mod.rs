//! Logging setup and the diagnostics handle passed into stores

use std::fmt;

use tracing::Dispatch;

/// Install the process-wide subscriber. Safe to call more than once.
pub fn init(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}

/// Diagnostics sink handed to each storage component at construction.
///
/// Events are delivered to the captured dispatcher rather than whatever
/// subscriber happens to be global at call time. Emitting an event cannot
/// fail, so logging never turns into a storage error.
#[derive(Clone)]
pub struct Diagnostics {
    dispatch: Dispatch,
    component: &'static str,
}

impl Diagnostics {
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch, component: "storage" }
    }

    /// Capture the dispatcher that is current for the calling thread.
    pub fn current() -> Self {
        Self::new(tracing::dispatcher::get_default(|d| d.clone()))
    }

    /// A sink that drops everything.
    pub fn none() -> Self {
        Self::new(Dispatch::none())
    }

    pub fn for_component(&self, component: &'static str) -> Self {
        Self {
            dispatch: self.dispatch.clone(),
            component,
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn debug(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::debug!(component = self.component, "{}", message)
        });
    }

    pub fn info(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::info!(component = self.component, "{}", message)
        });
    }

    pub fn warn(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::warn!(component = self.component, "{}", message)
        });
    }

    pub fn error(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::error!(component = self.component, "{}", message)
        });
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("component", &self.component)
            .finish()
    }
}

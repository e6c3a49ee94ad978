//! Run-wide state threaded through every dispatch call.

use cap_config::Configuration;
use cap_core::errors::CapError;
use cap_core::status::{Site, Status, StatusReport, StatusToken};
use cap_hist::KeyValueStore;

/// Status token, resolved configuration and persistence collaborator of one run.
pub struct RunContext {
    status: StatusToken,
    config: Configuration,
    store: Box<dyn KeyValueStore>,
}

impl RunContext {
    /// Creates a context with an OK status.
    pub fn new(config: Configuration, store: Box<dyn KeyValueStore>) -> Self {
        Self {
            status: StatusToken::new(),
            config,
            store,
        }
    }

    /// Current run status.
    pub fn status(&self) -> Status {
        self.status.current()
    }

    /// The full status token.
    pub fn token(&self) -> &StatusToken {
        &self.status
    }

    /// Last report that set the current status.
    pub fn last_report(&self) -> Option<&StatusReport> {
        self.status.last_report()
    }

    /// Returns true when phase dispatch may proceed.
    pub fn allows_dispatch(&self) -> bool {
        self.status.allows_dispatch()
    }

    /// Posts `status` raised at `site`.
    pub fn post(&mut self, status: Status, site: Site, message: impl Into<String>) {
        self.status.post(status, site, message);
    }

    /// Posts the status carried by `error`.
    pub fn post_error(&mut self, site: Site, error: &CapError) {
        self.status.post(error.status(), site, error.to_string());
    }

    /// Clears the status back to OK.
    pub fn reset_to_ok(&mut self) {
        self.status.reset_to_ok();
    }

    /// Resolved configuration.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Mutable configuration, for late overrides.
    pub fn config_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    /// Persisted key-value store.
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("status", &self.status.current())
            .field("parameters", &self.config.len())
            .finish()
    }
}

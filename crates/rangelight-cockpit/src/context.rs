//! Shared state handed to every request handler.

use std::sync::Arc;
use std::time::Duration;

use rangelight_actuation::ActuationPublisher;
use rangelight_middleware::ConnectionRegistry;
use rangelight_store::Store;

/// Request-path tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// Upper bound for one request, from dispatch to response.
    pub request_timeout: Duration,
    /// Readings broadcast after every `logSensorData`.
    pub broadcast_history: usize,
    /// Readings returned by `getLogs`.
    pub log_history: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            broadcast_history: 10,
            log_history: 20,
        }
    }
}

/// Process-wide handles. Clone it cheaply – every field is shared.
#[derive(Clone)]
pub struct AppContext {
    pub store: Store,
    pub hub: ConnectionRegistry,
    pub actuation: ActuationPublisher,
    pub settings: Arc<ServerSettings>,
}

impl AppContext {
    pub fn new(
        store: Store,
        hub: ConnectionRegistry,
        actuation: ActuationPublisher,
        settings: ServerSettings,
    ) -> Self {
        Self {
            store,
            hub,
            actuation,
            settings: Arc::new(settings),
        }
    }
}

//! `rangelight-cockpit` – the WebSocket face of the bridge.
//!
//! Boots a WebSocket server (default port `8080`) that dashboards and sensor
//! apps talk to with `{action, payload}` frames:
//!
//! 1. **Dispatches** every frame to one of the handlers in [`handlers`]
//!    through the closed [`Action`] table.
//! 2. **Answers** each request with exactly one
//!    `{action, data | message | error}` frame on the same channel.
//! 3. **Broadcasts** the latest readings to every open channel after each
//!    logged reading.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rangelight_actuation::{ActuationPublisher, ActuationSettings};
//! use rangelight_cockpit::{AppContext, CockpitServer, ServerSettings};
//! use rangelight_middleware::{ConnectionRegistry, MemoryBroker};
//! use rangelight_store::Store;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Store::open("rangelight.db").unwrap();
//!     let actuation = ActuationPublisher::new(
//!         store.clone(),
//!         Arc::new(MemoryBroker::new()),
//!         ActuationSettings::default(),
//!     );
//!     let ctx = AppContext::new(store, ConnectionRegistry::new(), actuation, ServerSettings::default());
//!     CockpitServer::new(ctx).run().await.unwrap();
//! }
//! ```

pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod server;

pub use context::{AppContext, ServerSettings};
pub use dispatcher::{Action, dispatch};
pub use server::{BoundServer, CockpitServer, DEFAULT_PORT, ServerError};

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use rangelight_actuation::{ActuationPublisher, ActuationSettings};
    use rangelight_middleware::{ConnectionRegistry, MemoryBroker};
    use rangelight_store::{Store, schema};

    use crate::context::{AppContext, ServerSettings};

    /// Seeded in-memory store, recording broker, default settings.
    pub async fn context() -> (AppContext, Arc<MemoryBroker>) {
        context_with(ServerSettings::default()).await
    }

    pub async fn context_with(settings: ServerSettings) -> (AppContext, Arc<MemoryBroker>) {
        let store = Store::open_in_memory().unwrap();
        store.execute_batch(schema::DEMO_SEED).await.unwrap();
        let broker = Arc::new(MemoryBroker::new());
        let actuation =
            ActuationPublisher::new(store.clone(), broker.clone(), ActuationSettings::default());
        let ctx = AppContext::new(store, ConnectionRegistry::new(), actuation, settings);
        (ctx, broker)
    }
}

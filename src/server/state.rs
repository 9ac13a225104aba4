use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::connection_manager::ConnectionRegistry;
use crate::notification::{BroadcastDispatcher, NotificationPublisher};
use crate::shutdown::ShutdownSignal;
use crate::subscriber::SubscriberDirectory;
use crate::websocket::InboundRouter;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<ConnectionRegistry>,
    pub directory: Arc<SubscriberDirectory>,
    pub dispatcher: Arc<BroadcastDispatcher>,
    pub router: Arc<InboundRouter>,
    pub publisher: Arc<NotificationPublisher>,
    pub shutdown: ShutdownSignal,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let directory = Arc::new(SubscriberDirectory::new());
        let dispatcher = Arc::new(BroadcastDispatcher::new(registry.clone(), directory.clone()));
        let router = Arc::new(InboundRouter::new(directory.clone(), dispatcher.clone()));
        let publisher = Arc::new(NotificationPublisher::new(dispatcher.clone()));

        Self {
            settings: Arc::new(settings),
            registry,
            directory,
            dispatcher,
            router,
            publisher,
            shutdown: ShutdownSignal::new(),
            start_time: Instant::now(),
        }
    }
}

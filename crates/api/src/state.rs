//! Shared application state.

use std::sync::Arc;

use domain::{AccountService, CatalogService, CategoryService, OrderService};
use notifications::{Notifier, NotifierConfig, NotifierHandle, NotificationDispatcher};
use store::RecordStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S: RecordStore> {
    pub categories: CategoryService<S>,
    pub catalog: CatalogService<S>,
    pub orders: OrderService<S>,
    pub accounts: AccountService<S>,
}

impl<S: RecordStore> AppState<S> {
    /// Wires every service to `store` and starts the notification workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<D>(
        store: S,
        dispatcher: Arc<D>,
        notify: NotifierConfig,
    ) -> (Arc<Self>, NotifierHandle)
    where
        D: NotificationDispatcher + 'static,
    {
        let store = Arc::new(store);
        let (notifier, handle) = Notifier::spawn(dispatcher, notify);

        let state = Arc::new(Self {
            categories: CategoryService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            orders: OrderService::new(store.clone(), notifier.clone()),
            accounts: AccountService::new(store, notifier),
        });
        (state, handle)
    }
}

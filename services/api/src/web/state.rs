//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use driverroom_core::ports::{DutyStore, IdentityService, MessagingStore, ReturnsStore};
use driverroom_core::{DispatchBoard, MessagingDesk};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityService>,
    pub board: DispatchBoard,
    pub messaging: MessagingDesk,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires every port and core service to a single store implementation.
    pub fn from_store<S>(store: Arc<S>, config: Arc<Config>) -> Self
    where
        S: IdentityService + DutyStore + ReturnsStore + MessagingStore + 'static,
    {
        let identity: Arc<dyn IdentityService> = store.clone();
        let duty: Arc<dyn DutyStore> = store.clone();
        let returns: Arc<dyn ReturnsStore> = store.clone();
        let messages: Arc<dyn MessagingStore> = store;

        let board = DispatchBoard::new(duty, returns, config.off_duty_after);
        let messaging = MessagingDesk::new(identity.clone(), messages);

        Self {
            identity,
            board,
            messaging,
            config,
        }
    }
}

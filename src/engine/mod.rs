mod availability;
mod booking;
mod error;
mod loyalty;

pub use availability::{first_slot, round_up_to_slot, slot_starts};
pub use error::EngineError;

use std::sync::Arc;

use crate::config::ShopConfig;
use crate::notify::NotifyHub;
use crate::store::BookingStore;

/// The booking engine: availability, reservation, lifecycle and loyalty,
/// bound to one shop's configuration. All operations take `now` explicitly
/// so behavior is a pure function of store state, config and the clock.
pub struct Engine {
    store: Arc<dyn BookingStore>,
    config: ShopConfig,
    notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(store: Arc<dyn BookingStore>, config: ShopConfig, notify: Arc<NotifyHub>) -> Self {
        Self {
            store,
            config,
            notify,
        }
    }

    pub fn config(&self) -> &ShopConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    pub fn notify(&self) -> &NotifyHub {
        &self.notify
    }
}

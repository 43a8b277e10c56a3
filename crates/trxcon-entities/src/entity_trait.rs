use std::time::Instant;

use as_any::AsAny;
use trxcon_config::SharedConfig;
use trxcon_core::TrxconEntity;
use trxcon_saps::SapMsg;

use crate::MessageQueue;

/// Trait for trxcon entities
/// Used by MessageRouter for passing messages between entities
pub trait TrxconEntityTrait: Send + AsAny {
    /// Returns the entity type identifier
    fn entity(&self) -> TrxconEntity;

    /// Handle incoming SAP primitive
    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg);

    /// Update configuration (optional)
    #[allow(dead_code)]
    fn set_config(&mut self, _config: SharedConfig) {}

    /// Socket and timer work. Called on every iteration of the event loop, must not block.
    fn poll(&mut self, _queue: &mut MessageQueue, _now: Instant) {}

    /// Earliest instant at which `poll` has timer work to do
    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    /// Called once for every TDMA frame produced by the clock
    fn tick_start(&mut self, _queue: &mut MessageQueue, _fn: u32) {}
}

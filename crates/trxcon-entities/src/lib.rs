#![allow(dead_code)]

pub mod entity_trait;
pub mod l1ctl;
pub mod l1sched;
pub mod messagerouter;
pub mod trx;

// Re-export commonly used items from router
pub use entity_trait::TrxconEntityTrait;
pub use messagerouter::{MessagePrio, MessageQueue, MessageRouter};

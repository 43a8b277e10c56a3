use trxcon_core::TrxconEntity;
use trxcon_entities::{MessageQueue, TrxconEntityTrait};
use trxcon_saps::SapMsg;

/// A trxcon entity sink for testing purposes
/// Collects all received SapMsg messages and the frames it was ticked on
pub struct Sink {
    component: TrxconEntity,
    msgqueue: Vec<SapMsg>,
    ticks: Vec<u32>,
}

impl Sink {
    pub fn new(component: TrxconEntity) -> Self {
        Self {
            component,
            msgqueue: vec![],
            ticks: vec![],
        }
    }

    pub fn take_msgqueue(&mut self) -> Vec<SapMsg> {
        std::mem::take(&mut self.msgqueue)
    }

    pub fn take_ticks(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.ticks)
    }
}

impl TrxconEntityTrait for Sink {
    fn entity(&self) -> TrxconEntity {
        self.component
    }

    fn rx_prim(&mut self, _queue: &mut MessageQueue, message: SapMsg) {
        tracing::debug!(ts = message.fn_, "rx_prim: {:?} {}", message.sap, message.msg);
        self.msgqueue.push(message);
    }

    fn tick_start(&mut self, _queue: &mut MessageQueue, fn_: u32) {
        self.ticks.push(fn_);
    }
}

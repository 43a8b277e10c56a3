use std::time::Instant;

use trxcon_config::{SharedConfig, StackConfig, StackState};
use trxcon_core::TrxconEntity;
use trxcon_entities::l1ctl::L1ctl;
use trxcon_entities::l1sched::L1Sched;
use trxcon_entities::trx::TrxLink;
use trxcon_entities::{MessageRouter, TrxconEntityTrait};
use trxcon_saps::SapMsg;

use super::mock_trx::MockTransport;
use super::sink::Sink;

pub const TEST_BAND_ARFCN: u16 = 871;
pub const TEST_BSIC: u8 = 0x2a;

/// Creates a default config for testing. It can still be modified as needed
/// before passing it to the ComponentTest constructor
pub fn default_test_config() -> StackConfig {
    let mut cfg = StackConfig::new(TEST_BAND_ARFCN);
    cfg.cell.bsic = Some(TEST_BSIC);
    cfg
}

/// Infrastructure for testing trxcon entities
/// Wires real entities and sinks to one router. The transceiver link, when requested,
/// talks to an in-memory transport the test can inspect and feed.
pub struct ComponentTest {
    pub config: SharedConfig,
    pub router: MessageRouter,
    pub sinks: Vec<TrxconEntity>,
    pub trx: MockTransport,
}

impl ComponentTest {
    pub fn new(config: StackConfig) -> Self {
        let shared_config = SharedConfig::from_parts(config, StackState::default());
        let router = MessageRouter::new(shared_config.clone());
        Self {
            config: shared_config,
            router,
            sinks: vec![],
            trx: MockTransport::default(),
        }
    }

    pub fn get_shared_config(&self) -> SharedConfig {
        self.config.clone()
    }

    pub fn populate_entities(&mut self, components: Vec<TrxconEntity>, sinks: Vec<TrxconEntity>) {
        for component in components.iter() {
            match component {
                TrxconEntity::L1Sched => {
                    let sched = L1Sched::new(self.config.clone());
                    self.register_entity(sched);
                }
                TrxconEntity::TrxLink => {
                    let link = TrxLink::new(self.config.clone(), Box::new(self.trx.clone()));
                    self.register_entity(link);
                }
                TrxconEntity::L1ctl => {
                    let l1ctl = L1ctl::new(self.config.clone());
                    self.register_entity(l1ctl);
                }
            }
        }

        for sink in sinks.iter() {
            assert!(!self.sinks.contains(sink), "Sink already exists: {:?}", sink);
            assert!(
                self.router.get_entity(*sink).is_none(),
                "Sink already registered as entity: {:?}",
                sink
            );
            self.sinks.push(*sink);
            self.register_entity(Sink::new(*sink));
        }
    }

    pub fn register_entity<T: 'static + TrxconEntityTrait>(&mut self, entity: T) {
        self.router.register_entity(Box::new(entity));
    }

    pub fn submit_message(&mut self, message: SapMsg) {
        self.router.submit_message(message);
    }

    pub fn deliver_all_messages(&mut self) {
        self.router.deliver_all_messages();
    }

    /// One frame: scheduler first, then everybody else, then delivery of what was produced
    pub fn tick(&mut self, fn_: u32) {
        self.router.tick_start(fn_);
        self.router.deliver_all_messages();
    }

    pub fn poll(&mut self, now: Instant) {
        self.router.poll(now);
    }

    /// Typed access to a registered entity
    pub fn entity<T: 'static>(&mut self, comp: TrxconEntity) -> &mut T {
        self.router
            .get_entity(comp)
            .and_then(|e| e.as_any_mut().downcast_mut::<T>())
            .unwrap_or_else(|| panic!("{:?} not registered with the expected type", comp))
    }

    pub fn dump_sinks(&mut self) -> Vec<SapMsg> {
        let mut msgs = vec![];
        for sink in self.sinks.iter() {
            if let Some(component) = self.router.get_entity(*sink) {
                if let Some(sink) = component.as_any_mut().downcast_mut::<Sink>() {
                    msgs.append(&mut sink.take_msgqueue());
                }
            }
        }
        msgs
    }

    pub fn sink_ticks(&mut self, sink: TrxconEntity) -> Vec<u32> {
        self.entity::<Sink>(sink).take_ticks()
    }
}

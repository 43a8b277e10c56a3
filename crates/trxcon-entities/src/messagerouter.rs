use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use trxcon_config::SharedConfig;
use trxcon_core::{Sap, TrxconEntity};
use trxcon_saps::trxc::TrxLinkEvent;
use trxcon_saps::{SapMsg, SapMsgInner};

use crate::TrxconEntityTrait;
use crate::l1sched::clock::{ClockTick, TdmaClock};

/// Upper bound on how long the event loop sleeps when no timer is pending
const MAX_IDLE_SLEEP: Duration = Duration::from_millis(1);

#[derive(Default)]
pub enum MessagePrio {
    Immediate,
    #[default]
    Normal,
}

pub struct MessageQueue {
    messages: VecDeque<SapMsg>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            messages: VecDeque::new(),
        }
    }

    pub fn push_back(&mut self, message: SapMsg) {
        self.messages.push_back(message);
    }

    pub fn push_prio(&mut self, message: SapMsg, prio: MessagePrio) {
        match prio {
            MessagePrio::Immediate => {
                self.messages.push_front(message);
            }
            MessagePrio::Normal => {
                self.messages.push_back(message);
            }
        }
    }

    pub fn pop_front(&mut self) -> Option<SapMsg> {
        self.messages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

pub struct MessageRouter {
    _config: SharedConfig,
    entities: HashMap<TrxconEntity, Box<dyn TrxconEntityTrait>>,
    msg_queue: MessageQueue,

    /// Frame clock driving `tick_start`. Clock indications addressed to the scheduler are
    /// consumed here, the clock being shared by every entity.
    clock: TdmaClock,
}

impl MessageRouter {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            entities: HashMap::new(),
            msg_queue: MessageQueue::new(),
            _config: config,
            clock: TdmaClock::new(),
        }
    }

    pub fn register_entity(&mut self, entity: Box<dyn TrxconEntityTrait>) {
        let comp_type = entity.entity();
        tracing::debug!("register_entity {:?}", comp_type);
        self.entities.insert(comp_type, entity);
    }

    /// Returns a mut ref to a component of the requested type
    pub fn get_entity(&mut self, comp: TrxconEntity) -> Option<&mut dyn TrxconEntityTrait> {
        self.entities.get_mut(&comp).map(|entity| entity.as_mut())
    }

    pub fn clock(&self) -> &TdmaClock {
        &self.clock
    }

    pub fn submit_message(&mut self, message: SapMsg) {
        tracing::debug!(
            "submit_message {:?}: {:?} -> {:?} {}",
            message.get_sap(),
            message.get_source(),
            message.get_dest(),
            message.msg
        );
        self.msg_queue.push_back(message);
    }

    pub fn deliver_message(&mut self) {
        self.deliver_message_at(Instant::now());
    }

    fn deliver_message_at(&mut self, now: Instant) {
        let Some(message) = self.msg_queue.pop_front() else {
            return;
        };

        tracing::trace!(
            "deliver_message: got {:?}: {:?} -> {:?} {}",
            message.get_sap(),
            message.get_source(),
            message.get_dest(),
            message.msg
        );

        match &message.msg {
            SapMsgInner::TrxClockInd(ind) => {
                let fn_ind = ind.fn_;
                let Self {
                    clock,
                    entities,
                    msg_queue,
                    ..
                } = self;
                clock.handle_indication(fn_ind, now, |fn_| {
                    Self::tick_entities(entities, msg_queue, fn_);
                });
                return;
            }
            SapMsgInner::ClockResetReq => {
                tracing::info!("clock reset requested by {:?}", message.get_source());
                self.clock.reset();
                return;
            }
            _ => {}
        }

        let dest = *message.get_dest();
        if let Some(entity) = self.entities.get_mut(&dest) {
            entity.rx_prim(&mut self.msg_queue, message);
        } else {
            tracing::warn!(
                "deliver_message: entity {:?} not found for {:?}: {:?} -> {:?} {}",
                dest,
                message.get_sap(),
                message.get_source(),
                message.get_dest(),
                message.msg
            );
        }
    }

    pub fn deliver_all_messages(&mut self) {
        while !self.msg_queue.is_empty() {
            self.deliver_message();
        }
    }

    pub fn get_msgqueue_len(&self) -> usize {
        self.msg_queue.len()
    }

    fn tick_entities(
        entities: &mut HashMap<TrxconEntity, Box<dyn TrxconEntityTrait>>,
        queue: &mut MessageQueue,
        fn_: u32,
    ) {
        tracing::trace!(ts = fn_, "--- tick ---");
        // The scheduler goes first so uplink bursts are queued before the link polls again
        if let Some(entity) = entities.get_mut(&TrxconEntity::L1Sched) {
            entity.tick_start(queue, fn_);
        }
        for (id, entity) in entities.iter_mut() {
            if *id != TrxconEntity::L1Sched {
                entity.tick_start(queue, fn_);
            }
        }
    }

    /// Drives every entity through one frame without involving the clock
    pub fn tick_start(&mut self, fn_: u32) {
        Self::tick_entities(&mut self.entities, &mut self.msg_queue, fn_);
    }

    /// One event loop iteration: socket and timer work, the frame clock, then message delivery
    pub fn poll(&mut self, now: Instant) {
        for entity in self.entities.values_mut() {
            entity.poll(&mut self.msg_queue, now);
        }
        while !self.msg_queue.is_empty() {
            self.deliver_message_at(now);
        }

        let Self {
            clock,
            entities,
            msg_queue,
            ..
        } = self;
        let res = clock.tick(now, |fn_| {
            Self::tick_entities(entities, msg_queue, fn_);
        });
        if res == ClockTick::Lost {
            let fn_ = self.clock.fn_counter_proc();
            self.submit_message(SapMsg::new(
                Sap::TrxcSap,
                TrxconEntity::TrxLink,
                TrxconEntity::L1ctl,
                fn_,
                SapMsgInner::TrxLinkEvent(TrxLinkEvent::ClockLost),
            ));
        }

        while !self.msg_queue.is_empty() {
            self.deliver_message_at(now);
        }
    }

    /// Earliest pending deadline of the clock and all entities
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entities
            .values()
            .filter_map(|e| e.next_deadline())
            .chain(self.clock.next_deadline())
            .min()
    }

    /// Runs the event loop either forever or for a given number of iterations.
    /// The loop also ends when `running` is cleared.
    pub fn run_stack(&mut self, num_iterations: Option<usize>, running: Option<Arc<AtomicBool>>) {
        let mut iterations: usize = 0;

        loop {
            if let Some(ref r) = running {
                if !r.load(Ordering::SeqCst) {
                    tracing::info!("run_stack: stop requested");
                    break;
                }
            }

            self.poll(Instant::now());

            iterations += 1;
            if let Some(n) = num_iterations {
                if iterations >= n {
                    break;
                }
            }

            let now = Instant::now();
            let sleep = match self.next_deadline() {
                Some(deadline) => deadline.saturating_duration_since(now).min(MAX_IDLE_SLEEP),
                None => MAX_IDLE_SLEEP,
            };
            if !sleep.is_zero() {
                std::thread::sleep(sleep);
            }
        }
    }
}

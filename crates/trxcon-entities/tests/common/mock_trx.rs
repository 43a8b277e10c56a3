use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use trxcon_entities::trx::{TrxChannel, TrxError, TrxTransport};

/// In-memory transport; the test plays the transceiver.
/// Clones share the same buffers, so one copy goes into the link and one stays with the test.
#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<(TrxChannel, Vec<u8>)>>>,
    inbox: Arc<Mutex<HashMap<TrxChannel, Vec<Vec<u8>>>>>,
}

impl MockTransport {
    /// Queues a datagram for the link to receive on its next poll
    pub fn push(&self, chan: TrxChannel, buf: &[u8]) {
        self.inbox.lock().unwrap().entry(chan).or_default().push(buf.to_vec());
    }

    pub fn take_sent(&self, chan: TrxChannel) -> Vec<Vec<u8>> {
        let mut sent = self.sent.lock().unwrap();
        let (out, keep) = sent.drain(..).partition(|(c, _)| *c == chan);
        *sent = keep;
        out.into_iter().map(|(_, b)| b).collect()
    }

    /// Control commands sent so far, without the trailing NUL
    pub fn take_commands(&self) -> Vec<String> {
        self.take_sent(TrxChannel::Ctrl)
            .into_iter()
            .map(|b| String::from_utf8_lossy(&b).trim_end_matches('\0').to_string())
            .collect()
    }

    /// Answers every pending control command with status 0
    pub fn answer_commands(&self) -> Vec<String> {
        let cmds = self.take_commands();
        for cmd in &cmds {
            let body = cmd.trim_start_matches("CMD ");
            let rsp = match body.split_once(' ') {
                Some((verb, params)) => format!("RSP {} 0 {}\0", verb, params),
                None => format!("RSP {} 0\0", body),
            };
            self.push(TrxChannel::Ctrl, rsp.as_bytes());
        }
        cmds
    }
}

impl TrxTransport for MockTransport {
    fn send(&mut self, chan: TrxChannel, payload: &[u8]) -> Result<(), TrxError> {
        self.sent.lock().unwrap().push((chan, payload.to_vec()));
        Ok(())
    }

    fn receive(&mut self, chan: TrxChannel) -> Vec<Vec<u8>> {
        self.inbox.lock().unwrap().remove(&chan).unwrap_or_default()
    }
}

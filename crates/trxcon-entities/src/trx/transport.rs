use std::net::UdpSocket;

use trxcon_config::stack_config::CfgTrx;

use super::TrxError;
use super::proto::{TRXC_BUF_SIZE, TRXD_BUF_SIZE};

/// The three logical channels to a transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrxChannel {
    Clck,
    Ctrl,
    Data,
}

impl TrxChannel {
    /// Our side binds base+100.., the transceiver listens on base..
    pub fn local_port(self, base_port: u16) -> u16 {
        base_port + 100 + self.offset()
    }

    pub fn remote_port(self, base_port: u16) -> u16 {
        base_port + self.offset()
    }

    fn offset(self) -> u16 {
        match self {
            TrxChannel::Clck => 0,
            TrxChannel::Ctrl => 1,
            TrxChannel::Data => 2,
        }
    }

    fn buf_size(self) -> usize {
        match self {
            TrxChannel::Data => TRXD_BUF_SIZE,
            _ => TRXC_BUF_SIZE,
        }
    }
}

/// Datagram transport towards the transceiver. Must never block.
pub trait TrxTransport: Send {
    fn send(&mut self, chan: TrxChannel, payload: &[u8]) -> Result<(), TrxError>;

    /// All datagrams received on a channel since the last call
    fn receive(&mut self, chan: TrxChannel) -> Vec<Vec<u8>>;
}

/// A UDP socket bound locally and connected to one transceiver port
pub struct UdpEndpoint {
    socket: UdpSocket,
    buf_size: usize,
}

impl UdpEndpoint {
    pub fn open(local: &str, local_port: u16, remote: &str, remote_port: u16, buf_size: usize) -> Result<Self, TrxError> {
        let bind_err = |e: std::io::Error| TrxError::Bind {
            port: local_port,
            reason: e.to_string(),
        };
        let socket = UdpSocket::bind((local, local_port)).map_err(bind_err)?;
        socket.connect((remote, remote_port)).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;
        Ok(Self { socket, buf_size })
    }

    pub fn send(&self, payload: &[u8]) -> Result<(), TrxError> {
        self.socket
            .send(payload)
            .map(|_| ())
            .map_err(|e| TrxError::Send(format!("UDP send failed: {}", e)))
    }

    pub fn receive(&self) -> Vec<Vec<u8>> {
        let mut messages = Vec::new();
        loop {
            let mut buffer = vec![0u8; self.buf_size];
            match self.socket.recv(&mut buffer) {
                Ok(len) => {
                    buffer.truncate(len);
                    messages.push(buffer);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    break; // No more data
                }
                Err(e) => {
                    // ICMP port unreachable shows up here while the transceiver is down
                    tracing::trace!("UDP receive failed: {}", e);
                    break;
                }
            }
        }
        messages
    }
}

/// CLCK, CTRL and DATA sockets. The CLCK socket is only opened when the clock is taken from it.
pub struct UdpTrxTransport {
    clck: Option<UdpEndpoint>,
    ctrl: UdpEndpoint,
    data: UdpEndpoint,
}

impl UdpTrxTransport {
    pub fn open(cfg: &CfgTrx) -> Result<Self, TrxError> {
        tracing::info!("Init transceiver interface ({}:{})", cfg.remote_host, cfg.base_port);
        let open = |chan: TrxChannel| {
            UdpEndpoint::open(
                &cfg.local_host,
                chan.local_port(cfg.base_port),
                &cfg.remote_host,
                chan.remote_port(cfg.base_port),
                chan.buf_size(),
            )
        };
        Ok(Self {
            clck: if cfg.use_clck { Some(open(TrxChannel::Clck)?) } else { None },
            ctrl: open(TrxChannel::Ctrl)?,
            data: open(TrxChannel::Data)?,
        })
    }

    fn endpoint(&self, chan: TrxChannel) -> Option<&UdpEndpoint> {
        match chan {
            TrxChannel::Clck => self.clck.as_ref(),
            TrxChannel::Ctrl => Some(&self.ctrl),
            TrxChannel::Data => Some(&self.data),
        }
    }
}

impl TrxTransport for UdpTrxTransport {
    fn send(&mut self, chan: TrxChannel, payload: &[u8]) -> Result<(), TrxError> {
        match self.endpoint(chan) {
            Some(ep) => ep.send(payload),
            None => Err(TrxError::Send(format!("{:?} socket not open", chan))),
        }
    }

    fn receive(&mut self, chan: TrxChannel) -> Vec<Vec<u8>> {
        self.endpoint(chan).map(UdpEndpoint::receive).unwrap_or_default()
    }
}

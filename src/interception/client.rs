// src/interception/client.rs
//! Interception controller
//!
//! Decides, per socket call, whether the call belongs to an emulated link or
//! goes to the real Winsock function. Connections to the account or game port
//! are claimed on `connect` and never reach the network afterwards.

use crate::connection::{Connection, ConnectionType, RecvOutcome};
use crate::interception::winsock::{
    destination_port, last_socket, reset_last_error, set_last_error, RawSocket, INVALID_SOCKET,
    SOCKET_ERROR, WSAEWOULDBLOCK,
};
use crate::network::definitions::{HEADER_SIZE, MAX_FRAME_SIZE};
use crate::network::{Message, ServerContext};
use crate::observability::{
    METRIC_BYTES_DELIVERED, METRIC_FRAMES, METRIC_MOCKED_CONNECTS, METRIC_PASSTHROUGH_CALLS,
};
use crate::player::Player;
use crate::utils::config::EngineConfig;
use crate::utils::errors::{EngineError, Result};
use metrics::counter;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, trace, warn};

/// Largest single send accepted on an emulated link
pub const STAGING_CAPACITY: usize = 8192;

const _: () = assert!(STAGING_CAPACITY >= MAX_FRAME_SIZE);

/// The real socket functions
///
/// In the injected module these call through the hook trampolines.
pub trait Passthrough: Send + Sync {
    fn connect(&self, socket: RawSocket, name: &[u8]) -> i32;

    fn send(&self, socket: RawSocket, buf: &[u8], flags: i32) -> i32;

    fn recv(&self, socket: RawSocket, buf: &mut [u8], flags: i32) -> i32;

    fn close(&self, socket: RawSocket) -> i32;

    fn last_error(&self) -> i32;
}

struct Slot {
    socket: AtomicUsize,
    connection: Mutex<Connection>,
}

impl Slot {
    fn new() -> Self {
        Self {
            socket: AtomicUsize::new(INVALID_SOCKET),
            connection: Mutex::new(Connection::new()),
        }
    }
}

/// Process-wide controller state
pub struct Client {
    slots: [Slot; 2],
    player: Player,
    config: EngineConfig,
    passthrough: Box<dyn Passthrough>,
}

impl Client {
    pub fn new(config: EngineConfig, player: Player, passthrough: Box<dyn Passthrough>) -> Self {
        Self {
            slots: [Slot::new(), Slot::new()],
            player,
            config,
            passthrough,
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether `socket` is bound to an emulated link
    pub fn is_claimed(&self, socket: RawSocket) -> bool {
        self.find(socket).is_some()
    }

    /// Run `f` on the link emulating `kind`
    pub fn with_connection<R>(&self, kind: ConnectionType, f: impl FnOnce(&mut Connection) -> R) -> Option<R> {
        let slot = self.slots.get(kind.slot()?)?;
        let mut connection = slot.connection.lock();
        Some(f(&mut connection))
    }

    fn find(&self, socket: RawSocket) -> Option<&Slot> {
        if socket == INVALID_SOCKET {
            return None;
        }
        self.slots
            .iter()
            .find(|slot| slot.socket.load(Ordering::Acquire) == socket)
    }

    /// Bind `socket` to the slot for `kind`
    ///
    /// A handle maps to at most one link, so any other slot still holding
    /// `socket` is released first.
    fn claim(&self, kind: ConnectionType, socket: RawSocket) -> bool {
        let Some(index) = kind.slot().filter(|&i| i < self.slots.len()) else {
            return false;
        };

        for (i, other) in self.slots.iter().enumerate() {
            if i != index && other.socket.load(Ordering::Acquire) == socket {
                let mut connection = other.connection.lock();
                debug!(
                    "Socket {:#x} moves from {:?} to {:?}",
                    socket,
                    connection.connection_type(),
                    kind
                );
                connection.disconnect();
                other.socket.store(INVALID_SOCKET, Ordering::Release);
            }
        }

        let slot = &self.slots[index];
        let mut connection = slot.connection.lock();
        connection.connect(kind, socket);
        slot.socket.store(socket, Ordering::Release);
        true
    }

    fn classify(&self, port: u16) -> ConnectionType {
        let endpoints = &self.config.endpoints;
        if port == endpoints.account_port {
            ConnectionType::AccountServer
        } else if port == endpoints.game_port {
            ConnectionType::GameServer
        } else {
            ConnectionType::Unknown
        }
    }

    /// `connect`: claim connections to the emulated ports
    pub fn on_connect(&self, socket: RawSocket, name: &[u8]) -> i32 {
        trace!("connect({:#x}, port {:?})", socket, destination_port(name));
        reset_last_error(socket);

        let kind = destination_port(name)
            .map(|port| self.classify(port))
            .unwrap_or(ConnectionType::Unknown);

        if kind != ConnectionType::Unknown && self.claim(kind, socket) {
            info!("Emulating {:?} on socket {:#x}", kind, socket);
            let endpoint = match kind {
                ConnectionType::AccountServer => "account",
                _ => "game",
            };
            counter!(METRIC_MOCKED_CONNECTS, "endpoint" => endpoint).increment(1);
            return 0;
        }

        counter!(METRIC_PASSTHROUGH_CALLS, "call" => "connect").increment(1);
        self.passthrough.connect(socket, name)
    }

    /// `send`: decrypt and process every frame in `buf`
    ///
    /// All bytes are reported accepted. Errors are returned only when they
    /// are fatal; anything else is logged and the frame skipped.
    pub fn on_send(&self, socket: RawSocket, buf: &[u8], flags: i32) -> Result<i32> {
        trace!("send({:#x}, {} bytes)", socket, buf.len());
        reset_last_error(socket);

        let Some(slot) = self.find(socket) else {
            counter!(METRIC_PASSTHROUGH_CALLS, "call" => "send").increment(1);
            return Ok(self.passthrough.send(socket, buf, flags));
        };

        if buf.len() > STAGING_CAPACITY {
            return Err(EngineError::FrameTooLarge {
                size: buf.len(),
                capacity: STAGING_CAPACITY,
            });
        }

        let mut staging = [0u8; STAGING_CAPACITY];
        let data = &mut staging[..buf.len()];
        data.copy_from_slice(buf);

        let mut connection = slot.connection.lock();
        connection.cipher_mut().decrypt(data);

        let ctx = ServerContext {
            player: &self.player,
            config: &self.config,
        };

        let mut offset = 0;
        while offset < data.len() {
            let available = data.len() - offset;
            let length = if available >= HEADER_SIZE {
                u16::from_le_bytes([data[offset], data[offset + 1]]) as usize
            } else {
                available
            };

            if length < HEADER_SIZE || length > available {
                return Err(EngineError::MalformedFrame {
                    offset,
                    length,
                    available,
                });
            }

            let frame = &data[offset..offset + length];
            offset += length;

            let message = match Message::create(frame) {
                Ok(message) => message,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!("Skipping frame on {:?}: {}", connection.connection_type(), err);
                    continue;
                }
            };

            trace!("Received msg[{:04}] {} ({} bytes)", message.msg_type(), message.name(), length);
            counter!(METRIC_FRAMES, "type" => message.name()).increment(1);

            let name = message.name();
            if let Err(err) = message.process(&ctx, &mut connection) {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!("Failed to process {}: {}", name, err);
            }
        }

        Ok(buf.len() as i32)
    }

    /// `recv`: deliver queued replies
    pub fn on_recv(&self, socket: RawSocket, buf: &mut [u8], flags: i32) -> i32 {
        trace!("recv({:#x}, {} bytes, flags {:#x})", socket, buf.len(), flags);
        reset_last_error(socket);

        let Some(slot) = self.find(socket) else {
            counter!(METRIC_PASSTHROUGH_CALLS, "call" => "recv").increment(1);
            return self.passthrough.recv(socket, buf, flags);
        };

        let outcome = slot.connection.lock().recv_from(buf, flags);
        match outcome {
            RecvOutcome::Data(n) => {
                counter!(METRIC_BYTES_DELIVERED).increment(n as u64);
                n as i32
            }
            RecvOutcome::WouldBlock => {
                set_last_error(WSAEWOULDBLOCK);
                SOCKET_ERROR
            }
        }
    }

    /// `closesocket`: release the link, then close the real handle
    pub fn on_close(&self, socket: RawSocket) -> i32 {
        trace!("closesocket({:#x})", socket);
        reset_last_error(socket);

        if let Some(slot) = self.find(socket) {
            let mut connection = slot.connection.lock();
            debug!("Releasing {:?} on socket {:#x}", connection.connection_type(), socket);
            connection.disconnect();
            slot.socket.store(INVALID_SOCKET, Ordering::Release);
        }

        counter!(METRIC_PASSTHROUGH_CALLS, "call" => "closesocket").increment(1);
        self.passthrough.close(socket)
    }

    /// `WSAGetLastError`: synthetic error for emulated links
    pub fn on_last_error(&self) -> i32 {
        if self.is_claimed(last_socket()) {
            return crate::interception::winsock::last_error();
        }
        self.passthrough.last_error()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sockets: Vec<RawSocket> = self
            .slots
            .iter()
            .map(|slot| slot.socket.load(Ordering::Relaxed))
            .collect();
        f.debug_struct("Client")
            .field("sockets", &sockets)
            .field("player", &self.player.name)
            .finish()
    }
}

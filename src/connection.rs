// src/connection.rs
//! One emulated server link
//!
//! Holds the stream cipher for the link and the FIFO of replies waiting to be
//! read by the client. Replies are delivered whole: a read never splits a
//! message, so a short buffer simply receives fewer messages.

use crate::interception::winsock::{RawSocket, INVALID_SOCKET, MSG_PEEK};
use crate::network::Msg;
use crate::security::TqCipher;
use std::collections::VecDeque;
use tracing::trace;

/// Which server a link emulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    Unknown,
    AccountServer,
    GameServer,
}

impl ConnectionType {
    /// Slot index in the controller's connection table
    pub fn slot(self) -> Option<usize> {
        match self {
            ConnectionType::Unknown => None,
            ConnectionType::AccountServer => Some(0),
            ConnectionType::GameServer => Some(1),
        }
    }
}

/// Result of a read on an emulated link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// Bytes written to the buffer, or available when peeking
    Data(usize),

    /// Nothing deliverable right now
    WouldBlock,
}

/// Emulated server link
#[derive(Debug)]
pub struct Connection {
    kind: ConnectionType,
    socket: RawSocket,
    cipher: TqCipher,
    queue: VecDeque<Msg>,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            kind: ConnectionType::Unknown,
            socket: INVALID_SOCKET,
            cipher: TqCipher::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.kind
    }

    pub fn socket(&self) -> RawSocket {
        self.socket
    }

    pub fn is_connected(&self) -> bool {
        self.socket != INVALID_SOCKET
    }

    pub fn cipher(&self) -> &TqCipher {
        &self.cipher
    }

    pub fn cipher_mut(&mut self) -> &mut TqCipher {
        &mut self.cipher
    }

    /// Bind the link to `socket` with a fresh cipher
    ///
    /// Pending replies are kept.
    pub fn connect(&mut self, kind: ConnectionType, socket: RawSocket) {
        self.kind = kind;
        self.socket = socket;
        self.cipher.reset();
    }

    /// Queue a reply for the client
    pub fn send_to(&mut self, msg: impl Into<Msg>) {
        let msg = msg.into();
        trace!("Queueing msg[{:04}] ({} bytes) on {:?}", msg.msg_type(), msg.len(), self.kind);
        self.queue.push_back(msg);
    }

    /// Deliver as many whole replies as fit in `buf`, encrypted
    ///
    /// With `MSG_PEEK` in `flags` nothing is copied or consumed; the total
    /// queued size is reported instead.
    pub fn recv_from(&mut self, buf: &mut [u8], flags: i32) -> RecvOutcome {
        if flags & MSG_PEEK != 0 {
            return match self.pending_bytes() {
                0 => RecvOutcome::WouldBlock,
                available => RecvOutcome::Data(available),
            };
        }

        let mut offset = 0;
        while let Some(msg) = self.queue.front() {
            let len = msg.len();
            if offset + len > buf.len() {
                break;
            }
            buf[offset..offset + len].copy_from_slice(msg.as_bytes());
            offset += len;
            self.queue.pop_front();
        }

        if offset == 0 {
            return RecvOutcome::WouldBlock;
        }

        self.cipher.encrypt(&mut buf[..offset]);
        RecvOutcome::Data(offset)
    }

    /// Release the link and drop undelivered replies
    pub fn disconnect(&mut self) {
        self.kind = ConnectionType::Unknown;
        self.socket = INVALID_SOCKET;
        self.queue.clear();
    }

    /// Total size of queued replies
    pub fn pending_bytes(&self) -> usize {
        self.queue.iter().map(Msg::len).sum()
    }

    /// Number of queued replies
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Msg> + '_ {
        self.queue.iter()
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

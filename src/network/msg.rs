// src/network/msg.rs
//! Frame container, message dispatch and processing context
//!
//! Every frame is `{length: u16, type: u16}` followed by a packed payload,
//! all little-endian. [`Message::create`] resolves the type code through
//! [`DISPATCH`]; codes without an entry become [`Message::Unknown`] and are
//! only logged.

use crate::connection::Connection;
use crate::network::definitions::{HEADER_SIZE, MAX_NAMESIZE};
use crate::network::{MsgAccount, MsgAction, MsgConnect, MsgItem, MsgTalk, MsgWalk};
use crate::player::Player;
use crate::utils::config::EngineConfig;
use crate::utils::errors::{EngineError, Result};
use bytes::{Buf, BufMut, BytesMut};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Owned wire frame
#[derive(Clone, PartialEq, Eq)]
pub struct Msg {
    buf: BytesMut,
}

impl Msg {
    /// Copy a complete frame received from the client
    pub fn from_frame(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_SIZE {
            return Err(EngineError::MalformedFrame {
                offset: 0,
                length: frame.len(),
                available: frame.len(),
            });
        }
        Ok(Self {
            buf: BytesMut::from(frame),
        })
    }

    /// Zeroed frame of `len` bytes with its header filled in
    pub(crate) fn with_type(msg_type: u16, len: usize) -> Self {
        debug_assert!(len >= HEADER_SIZE && len <= u16::MAX as usize);

        let mut msg = Self {
            buf: BytesMut::zeroed(len),
        };
        msg.put_u16(0, len as u16);
        msg.put_u16(2, msg_type);
        msg
    }

    /// Type code from the header
    pub fn msg_type(&self) -> u16 {
        self.get_u16(2)
    }

    /// Length declared in the header
    pub fn declared_length(&self) -> u16 {
        self.get_u16(0)
    }

    /// Size of the owned buffer
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn get_u8(&self, offset: usize) -> u8 {
        self.buf[offset]
    }

    pub(crate) fn get_u16(&self, offset: usize) -> u16 {
        (&self.buf[offset..]).get_u16_le()
    }

    pub(crate) fn get_i16(&self, offset: usize) -> i16 {
        (&self.buf[offset..]).get_i16_le()
    }

    pub(crate) fn get_u32(&self, offset: usize) -> u32 {
        (&self.buf[offset..]).get_u32_le()
    }

    pub(crate) fn get_i32(&self, offset: usize) -> i32 {
        (&self.buf[offset..]).get_i32_le()
    }

    pub(crate) fn put_u8(&mut self, offset: usize, value: u8) {
        self.buf[offset] = value;
    }

    pub(crate) fn put_u16(&mut self, offset: usize, value: u16) {
        (&mut self.buf[offset..]).put_u16_le(value);
    }

    pub(crate) fn put_i16(&mut self, offset: usize, value: i16) {
        (&mut self.buf[offset..]).put_i16_le(value);
    }

    pub(crate) fn put_u32(&mut self, offset: usize, value: u32) {
        (&mut self.buf[offset..]).put_u32_le(value);
    }

    pub(crate) fn put_i32(&mut self, offset: usize, value: i32) {
        (&mut self.buf[offset..]).put_i32_le(value);
    }

    /// NUL-terminated text of a fixed name field
    pub(crate) fn get_name(&self, offset: usize) -> &[u8] {
        let field = &self.buf[offset..offset + MAX_NAMESIZE];
        let end = field.iter().position(|&b| b == 0).unwrap_or(MAX_NAMESIZE);
        &field[..end]
    }

    /// Write `text` into a fixed name field, NUL padded
    pub(crate) fn put_name(&mut self, offset: usize, field: &'static str, text: &str) -> Result<()> {
        if text.len() >= MAX_NAMESIZE {
            return Err(EngineError::FieldTooLong {
                field,
                max: MAX_NAMESIZE - 1,
                actual: text.len(),
            });
        }

        let slot = &mut self.buf[offset..offset + MAX_NAMESIZE];
        slot.fill(0);
        slot[..text.len()].copy_from_slice(text.as_bytes());
        Ok(())
    }

    pub(crate) fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.buf[offset..offset + len]
    }

    pub(crate) fn tail(&self, offset: usize) -> &[u8] {
        &self.buf[offset.min(self.buf.len())..]
    }

    pub(crate) fn tail_mut(&mut self, offset: usize) -> &mut [u8] {
        let start = offset.min(self.buf.len());
        &mut self.buf[start..]
    }
}

impl fmt::Debug for Msg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Msg")
            .field("type", &self.msg_type())
            .field("len", &self.len())
            .finish()
    }
}

impl From<&Msg> for Msg {
    fn from(value: &Msg) -> Self {
        value.clone()
    }
}

impl AsRef<[u8]> for Msg {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

/// State a message may consult while being processed
pub struct ServerContext<'a> {
    pub player: &'a Player,
    pub config: &'a EngineConfig,
}

/// A message type the client sends to the server
pub trait Inbound: Sized + Into<Msg> {
    /// Type code in the header
    const TYPE: u16;

    /// Name used in logs
    const NAME: &'static str;

    /// Size of the fixed layout, header included
    const SIZE: usize;

    /// Wrap a frame already checked to hold `SIZE` bytes
    fn from_msg(msg: Msg) -> Self;

    fn into_message(self) -> Message;
}

/// Dispatch table entry
pub struct Route {
    pub msg_type: u16,
    pub name: &'static str,
    pub decode: fn(Msg) -> Result<Message>,
}

const fn route<T: Inbound>() -> Route {
    Route {
        msg_type: T::TYPE,
        name: T::NAME,
        decode: decode::<T>,
    }
}

/// Message types handled by the emulation
pub const DISPATCH: &[Route] = &[
    route::<MsgAccount>(),
    route::<MsgAction>(),
    route::<MsgConnect>(),
    route::<MsgItem>(),
    route::<MsgTalk>(),
    route::<MsgWalk>(),
];

fn decode<T: Inbound>(msg: Msg) -> Result<Message> {
    if msg.len() < T::SIZE {
        return Err(EngineError::Truncated {
            kind: T::NAME,
            expected: T::SIZE,
            actual: msg.len(),
        });
    }
    Ok(T::from_msg(msg).into_message())
}

/// Decoded client message
#[derive(Debug, Clone)]
pub enum Message {
    Account(MsgAccount),
    Action(MsgAction),
    Connect(MsgConnect),
    Item(MsgItem),
    Talk(MsgTalk),
    Walk(MsgWalk),
    Unknown(Msg),
}

impl Message {
    /// Build the variant matching the frame's type code
    pub fn create(frame: &[u8]) -> Result<Self> {
        let msg = Msg::from_frame(frame)?;
        match DISPATCH.iter().find(|route| route.msg_type == msg.msg_type()) {
            Some(route) => (route.decode)(msg),
            None => Ok(Message::Unknown(msg)),
        }
    }

    /// Type code of the underlying frame
    pub fn msg_type(&self) -> u16 {
        self.as_msg().msg_type()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Message::Account(_) => MsgAccount::NAME,
            Message::Action(_) => MsgAction::NAME,
            Message::Connect(_) => MsgConnect::NAME,
            Message::Item(_) => MsgItem::NAME,
            Message::Talk(_) => MsgTalk::NAME,
            Message::Walk(_) => MsgWalk::NAME,
            Message::Unknown(_) => "Unknown",
        }
    }

    pub fn as_msg(&self) -> &Msg {
        match self {
            Message::Account(m) => m.as_msg(),
            Message::Action(m) => m.as_msg(),
            Message::Connect(m) => m.as_msg(),
            Message::Item(m) => m.as_msg(),
            Message::Talk(m) => m.as_msg(),
            Message::Walk(m) => m.as_msg(),
            Message::Unknown(m) => m,
        }
    }

    /// Handle a message received on `connection`, queueing any replies
    pub fn process(self, ctx: &ServerContext<'_>, connection: &mut Connection) -> Result<()> {
        match self {
            Message::Account(m) => m.process(ctx, connection),
            Message::Action(m) => m.process(ctx, connection),
            Message::Connect(m) => m.process(ctx, connection),
            Message::Item(m) => m.process(ctx, connection),
            Message::Talk(m) => m.process(ctx, connection),
            Message::Walk(m) => m.process(ctx, connection),
            Message::Unknown(m) => {
                warn!("Unknown msg[{:04}], len=[{:03}]", m.msg_type(), m.declared_length());
                debug!("\n{}", hex_dump(m.as_bytes()));
                Ok(())
            }
        }
    }
}

/// Render bytes as 16-per-line hex with an ASCII column
pub fn hex_dump(bytes: &[u8]) -> String {
    const PER_LINE: usize = 16;

    let mut out = String::with_capacity(bytes.len() * 4 + bytes.len() / PER_LINE + 1);
    for line in bytes.chunks(PER_LINE) {
        for i in 0..PER_LINE {
            match line.get(i) {
                Some(b) => out.push_str(&format!("{:02X} ", b)),
                None => out.push_str("   "),
            }
        }
        out.push(' ');
        out.extend(line.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out
}

/// Millisecond tick stamped on server-built messages
pub(crate) fn timestamp() -> i32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let msg = Msg::with_type(1010, 24);
        assert_eq!(msg.len(), 24);
        assert_eq!(msg.declared_length(), 24);
        assert_eq!(msg.msg_type(), 1010);
        assert_eq!(&msg.as_bytes()[..4], &[24, 0, 0xF2, 0x03]);
    }

    #[test]
    fn test_short_frame_rejected() {
        assert!(matches!(
            Msg::from_frame(&[1, 2, 3]),
            Err(EngineError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_dispatch_unknown_code() {
        let frame = [8, 0, 0x0F, 0x27, 1, 2, 3, 4];
        let message = Message::create(&frame).unwrap();
        assert!(matches!(message, Message::Unknown(_)));
        assert_eq!(message.msg_type(), 9999);
        assert_eq!(message.name(), "Unknown");
    }

    #[test]
    fn test_dispatch_known_codes() {
        for route in DISPATCH {
            let size = match route.name {
                "Account" => 52,
                "Action" => 24,
                "Connect" => 28,
                "Item" => 20,
                "Talk" => 16,
                "Walk" => 12,
                other => panic!("unexpected route {}", other),
            };
            let msg = Msg::with_type(route.msg_type, size);
            let message = Message::create(msg.as_bytes()).unwrap();
            assert_eq!(message.name(), route.name);
            assert_eq!(message.msg_type(), route.msg_type);
        }
    }

    #[test]
    fn test_dispatch_truncated_known_code() {
        let msg = Msg::with_type(1010, 8);
        assert!(matches!(
            Message::create(msg.as_bytes()),
            Err(EngineError::Truncated { kind: "Action", expected: 24, actual: 8 })
        ));
    }

    #[test]
    fn test_name_field() {
        let mut msg = Msg::with_type(1051, 52);
        msg.put_name(4, "Account", "player").unwrap();
        assert_eq!(msg.get_name(4), b"player");
        assert!(msg.put_name(4, "Account", "sixteen-bytes-xx").is_err());
        msg.put_name(4, "Account", "fifteen-bytes-x").unwrap();
        assert_eq!(msg.get_name(4), b"fifteen-bytes-x");
    }

    #[test]
    fn test_hex_dump() {
        let dump = hex_dump(b"AB\x00");
        assert_eq!(dump, format!("41 42 00 {} AB.\n", "   ".repeat(13)));
    }
}

// src/network/msg_talk.rs
//! Chat message
//!
//! Layout: header, `color: u32` @4, `channel: u16` @8, `style: u16` @10,
//! `timestamp: i32` @12, string pack @16 holding speaker, hearer, emotion
//! and words.

use crate::connection::Connection;
use crate::network::definitions::{MAX_NAMESIZE, MAX_WORDSSIZE, MSG_TALK};
use crate::network::msg::{timestamp, Inbound, Message, Msg, ServerContext};
use crate::network::string_packer::{encoded_len, StringPacker};
use crate::utils::errors::{EngineError, Result};
use std::borrow::Cow;
use tracing::debug;

const COLOR: usize = 4;
const CHANNEL: usize = 8;
const STYLE: usize = 10;
const TIMESTAMP: usize = 12;
const STRING_PACK: usize = 16;

const SPEAKER: usize = 0;
const HEARER: usize = 1;
const EMOTION: usize = 2;
const WORDS: usize = 3;

/// Chat channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Channel {
    Normal = 2000,
    Private = 2001,
    Action = 2002,
    Team = 2003,
    Syndicate = 2004,
    System = 2005,
    Talk = 2007,
    Gm = 2011,
    Register = 2100,
    Entrance = 2101,
    Shop = 2102,
    MessageBox = 2112,
}

/// Text color, `0x00RRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Color {
    Red = 0x00FF_0000,
    Magenta = 0x00FF_00FF,
    Blue = 0x0000_00FF,
    Cyan = 0x0000_FFFF,
    Green = 0x0000_FF00,
    Yellow = 0x00FF_FF00,
    White = 0x00FF_FFFF,
}

#[derive(Debug, Clone)]
pub struct MsgTalk {
    msg: Msg,
}

impl MsgTalk {
    /// Build a chat line with an empty emotion
    pub fn new(speaker: &str, hearer: &str, words: &str, channel: Channel, color: Color) -> Result<Self> {
        check_len("Speaker", speaker, MAX_NAMESIZE)?;
        check_len("Hearer", hearer, MAX_NAMESIZE)?;
        check_len("Words", words, MAX_WORDSSIZE)?;

        let strings: [&[u8]; 4] = [speaker.as_bytes(), hearer.as_bytes(), b"", words.as_bytes()];
        let mut msg = Msg::with_type(MSG_TALK, STRING_PACK + encoded_len(strings));
        msg.put_u32(COLOR, color as u32);
        msg.put_u16(CHANNEL, channel as u16);
        msg.put_u16(STYLE, 0);
        msg.put_i32(TIMESTAMP, timestamp());

        let mut packer = StringPacker::new(msg.tail_mut(STRING_PACK));
        for s in strings {
            packer.add_string(s)?;
        }
        Ok(Self { msg })
    }

    pub fn color(&self) -> u32 {
        self.msg.get_u32(COLOR)
    }

    /// Raw channel code
    pub fn channel(&self) -> u16 {
        self.msg.get_u16(CHANNEL)
    }

    pub fn style(&self) -> u16 {
        self.msg.get_u16(STYLE)
    }

    pub fn timestamp(&self) -> i32 {
        self.msg.get_i32(TIMESTAMP)
    }

    fn string(&self, index: usize) -> Option<Cow<'_, str>> {
        StringPacker::new(self.msg.tail(STRING_PACK))
            .entry(index)
            .map(String::from_utf8_lossy)
    }

    pub fn speaker(&self) -> Option<Cow<'_, str>> {
        self.string(SPEAKER)
    }

    pub fn hearer(&self) -> Option<Cow<'_, str>> {
        self.string(HEARER)
    }

    pub fn emotion(&self) -> Option<Cow<'_, str>> {
        self.string(EMOTION)
    }

    pub fn words(&self) -> Option<Cow<'_, str>> {
        self.string(WORDS)
    }

    pub fn as_msg(&self) -> &Msg {
        &self.msg
    }

    /// Chat is only logged
    pub fn process(self, _ctx: &ServerContext<'_>, _connection: &mut Connection) -> Result<()> {
        debug!(
            "{} said {} to {}",
            self.speaker().unwrap_or_default(),
            self.words().unwrap_or_default(),
            self.hearer().unwrap_or_default()
        );
        Ok(())
    }
}

fn check_len(field: &'static str, text: &str, size: usize) -> Result<()> {
    if text.len() >= size {
        return Err(EngineError::FieldTooLong {
            field,
            max: size - 1,
            actual: text.len(),
        });
    }
    Ok(())
}

impl Inbound for MsgTalk {
    const TYPE: u16 = MSG_TALK;
    const NAME: &'static str = "Talk";
    const SIZE: usize = STRING_PACK;

    fn from_msg(msg: Msg) -> Self {
        Self { msg }
    }

    fn into_message(self) -> Message {
        Message::Talk(self)
    }
}

impl From<MsgTalk> for Msg {
    fn from(value: MsgTalk) -> Self {
        value.msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_exact_size() {
        let msg = MsgTalk::new("SYSTEM", "ALLUSERS", "ANSWER_OK", Channel::Entrance, Color::White).unwrap();
        let expected = 16 + 1 + (1 + 6) + (1 + 8) + 1 + (1 + 9);
        assert_eq!(msg.as_msg().len(), expected);
        assert_eq!(msg.as_msg().declared_length() as usize, expected);
        assert_eq!(msg.channel(), 2101);
        assert_eq!(msg.color(), 0x00FFFFFF);
        assert_eq!(msg.speaker().as_deref(), Some("SYSTEM"));
        assert_eq!(msg.hearer().as_deref(), Some("ALLUSERS"));
        assert_eq!(msg.emotion().as_deref(), Some(""));
        assert_eq!(msg.words().as_deref(), Some("ANSWER_OK"));
    }

    #[test]
    fn test_decode_from_frame() {
        let built = MsgTalk::new("player", "ALL", "hello", Channel::Normal, Color::Red).unwrap();
        let message = Message::create(built.as_msg().as_bytes()).unwrap();
        match message {
            Message::Talk(talk) => assert_eq!(talk.words().as_deref(), Some("hello")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_pack_is_tolerated() {
        let msg = MsgTalk::from_msg(Msg::with_type(MSG_TALK, 16));
        assert_eq!(msg.speaker(), None);
        assert_eq!(msg.words(), None);
    }

    #[test]
    fn test_long_name_rejected() {
        assert!(MsgTalk::new("a-very-long-speaker", "ALL", "hi", Channel::Normal, Color::White).is_err());
    }
}

// src/network/definitions.rs
//! Wire constants shared by every message

/// Maximum length of a fixed name field, NUL included
pub const MAX_NAMESIZE: usize = 16;

/// Maximum length of chat text, NUL included
pub const MAX_WORDSSIZE: usize = 255;

/// Size of the `{length, type}` header prefixing every frame
pub const HEADER_SIZE: usize = 4;

/// Largest frame the client produces
pub const MAX_FRAME_SIZE: usize = 4096;

pub const MSG_GENERAL: u16 = 1000;
pub const MSG_TALK: u16 = MSG_GENERAL + 4;
pub const MSG_WALK: u16 = MSG_GENERAL + 5;
pub const MSG_USERINFO: u16 = MSG_GENERAL + 6;
pub const MSG_ITEM: u16 = MSG_GENERAL + 9;
pub const MSG_ACTION: u16 = MSG_GENERAL + 10;
pub const MSG_ACCOUNT: u16 = MSG_GENERAL + 51;
pub const MSG_CONNECT: u16 = MSG_GENERAL + 52;
pub const MSG_CONNECTEX: u16 = MSG_GENERAL + 55;

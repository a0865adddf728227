// src/network/msg_item.rs
//! Item actions
//!
//! Layout: header, `uid: u32` @4, `data: u32` @8 (or `y: u16` @8 and
//! `x: u16` @10), `action: u32` @12, `timestamp: u32` @16.

use crate::connection::Connection;
use crate::network::definitions::MSG_ITEM;
use crate::network::msg::{Inbound, Message, Msg, ServerContext};
use crate::utils::errors::Result;
use tracing::{debug, warn};

const UID: usize = 4;
const DATA: usize = 8;
const POS_Y: usize = 8;
const POS_X: usize = 10;
const ACTION: usize = 12;
const TIMESTAMP: usize = 16;

/// Client acknowledges the end of the item transfer
pub const ITEM_COMPLETE_TASK: u32 = 27;

#[derive(Debug, Clone)]
pub struct MsgItem {
    msg: Msg,
}

impl MsgItem {
    pub fn new(uid: u32, data: u32, action: u32) -> Self {
        let mut msg = Msg::with_type(MSG_ITEM, Self::SIZE);
        msg.put_u32(UID, uid);
        msg.put_u32(DATA, data);
        msg.put_u32(ACTION, action);
        msg.put_u32(TIMESTAMP, crate::network::msg::timestamp() as u32);
        Self { msg }
    }

    pub fn uid(&self) -> u32 {
        self.msg.get_u32(UID)
    }

    pub fn data(&self) -> u32 {
        self.msg.get_u32(DATA)
    }

    /// `data` read as a map position
    pub fn position(&self) -> (u16, u16) {
        (self.msg.get_u16(POS_X), self.msg.get_u16(POS_Y))
    }

    pub fn action(&self) -> u32 {
        self.msg.get_u32(ACTION)
    }

    pub fn timestamp(&self) -> u32 {
        self.msg.get_u32(TIMESTAMP)
    }

    pub fn as_msg(&self) -> &Msg {
        &self.msg
    }

    pub fn process(self, _ctx: &ServerContext<'_>, connection: &mut Connection) -> Result<()> {
        match self.action() {
            ITEM_COMPLETE_TASK => {
                debug!("Item task complete for {}", self.uid());
                connection.send_to(self);
            }
            other => warn!("Unknown action[{:04}], data=[{}]", other, self.data()),
        }
        Ok(())
    }
}

impl Inbound for MsgItem {
    const TYPE: u16 = MSG_ITEM;
    const NAME: &'static str = "Item";
    const SIZE: usize = TIMESTAMP + 4;

    fn from_msg(msg: Msg) -> Self {
        Self { msg }
    }

    fn into_message(self) -> Message {
        Message::Item(self)
    }
}

impl From<MsgItem> for Msg {
    fn from(value: MsgItem) -> Self {
        value.msg
    }
}

// src/network/msg_walk.rs
//! Movement notification
//!
//! Layout: header, `uid: u32` @4, `direction: u8` @8, `mode: u8` @9,
//! `reserved: u16` @10.

use crate::connection::Connection;
use crate::network::definitions::MSG_WALK;
use crate::network::msg::{Inbound, Message, Msg, ServerContext};
use crate::utils::errors::Result;
use tracing::trace;

const UID: usize = 4;
const DIRECTION: usize = 8;
const MODE: usize = 9;

#[derive(Debug, Clone)]
pub struct MsgWalk {
    msg: Msg,
}

impl MsgWalk {
    pub fn new(uid: u32, direction: u8, mode: u8) -> Self {
        let mut msg = Msg::with_type(MSG_WALK, Self::SIZE);
        msg.put_u32(UID, uid);
        msg.put_u8(DIRECTION, direction);
        msg.put_u8(MODE, mode);
        Self { msg }
    }

    pub fn uid(&self) -> u32 {
        self.msg.get_u32(UID)
    }

    pub fn direction(&self) -> u8 {
        self.msg.get_u8(DIRECTION)
    }

    /// 0 walks, 1 runs
    pub fn mode(&self) -> u8 {
        self.msg.get_u8(MODE)
    }

    pub fn as_msg(&self) -> &Msg {
        &self.msg
    }

    /// Movement is accepted silently; nothing else shares the map
    pub fn process(self, _ctx: &ServerContext<'_>, _connection: &mut Connection) -> Result<()> {
        trace!("Entity {} walks toward {} (mode {})", self.uid(), self.direction(), self.mode());
        Ok(())
    }
}

impl Inbound for MsgWalk {
    const TYPE: u16 = MSG_WALK;
    const NAME: &'static str = "Walk";
    const SIZE: usize = 12;

    fn from_msg(msg: Msg) -> Self {
        Self { msg }
    }

    fn into_message(self) -> Message {
        Message::Walk(self)
    }
}

impl From<MsgWalk> for Msg {
    fn from(value: MsgWalk) -> Self {
        value.msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use crate::utils::config::EngineConfig;

    #[test]
    fn test_walk_is_noop() {
        let config = EngineConfig::default();
        let player = Player::default();
        let ctx = ServerContext {
            player: &player,
            config: &config,
        };
        let mut connection = Connection::new();

        let msg = MsgWalk::new(player.uid, 3, 1);
        assert_eq!((msg.direction(), msg.mode()), (3, 1));
        msg.process(&ctx, &mut connection).unwrap();
        assert_eq!(connection.pending_len(), 0);
    }
}

// src/network/msg_action.rs
//! Small entity actions; drives most of the login sequence
//!
//! Layout: header, `timestamp: i32` @4, `uid: u32` @8, `data: i32` @12,
//! `x: u16` @16, `y: u16` @18, `direction: u16` @20, `action: u16` @22.

use crate::connection::Connection;
use crate::network::definitions::MSG_ACTION;
use crate::network::msg::{Inbound, Message, Msg, ServerContext};
use crate::utils::errors::{EngineError, Result};
use tracing::{debug, warn};

const TIMESTAMP: usize = 4;
const UID: usize = 8;
const DATA: usize = 12;
const POS_X: usize = 16;
const POS_Y: usize = 18;
const DIRECTION: usize = 20;
const ACTION: usize = 22;

/// Action codes the login sequence uses, in the order the client sends them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ActionType {
    EnterMap = 74,
    GetItems = 75,
    GetFriends = 76,
    GetWeaponSkills = 77,
    GetMagicSkills = 78,
    GetSyndicate = 97,
    CompleteLogin = 130,
}

impl TryFrom<u16> for ActionType {
    type Error = u16;

    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            74 => ActionType::EnterMap,
            75 => ActionType::GetItems,
            76 => ActionType::GetFriends,
            77 => ActionType::GetWeaponSkills,
            78 => ActionType::GetMagicSkills,
            97 => ActionType::GetSyndicate,
            130 => ActionType::CompleteLogin,
            other => return Err(other),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MsgAction {
    msg: Msg,
}

impl MsgAction {
    pub fn new(uid: u32, data: i32, action: u16) -> Self {
        let mut msg = Msg::with_type(MSG_ACTION, Self::SIZE);
        msg.put_i32(TIMESTAMP, crate::network::msg::timestamp());
        msg.put_u32(UID, uid);
        msg.put_i32(DATA, data);
        msg.put_u16(ACTION, action);
        Self { msg }
    }

    pub fn timestamp(&self) -> i32 {
        self.msg.get_i32(TIMESTAMP)
    }

    pub fn uid(&self) -> u32 {
        self.msg.get_u32(UID)
    }

    pub fn data(&self) -> i32 {
        self.msg.get_i32(DATA)
    }

    pub fn position(&self) -> (u16, u16) {
        (self.msg.get_u16(POS_X), self.msg.get_u16(POS_Y))
    }

    pub fn direction(&self) -> u16 {
        self.msg.get_u16(DIRECTION)
    }

    /// Raw action code
    pub fn action(&self) -> u16 {
        self.msg.get_u16(ACTION)
    }

    pub fn set_data(&mut self, data: i32) {
        self.msg.put_i32(DATA, data);
    }

    pub fn set_position(&mut self, x: u16, y: u16) {
        self.msg.put_u16(POS_X, x);
        self.msg.put_u16(POS_Y, y);
    }

    pub fn set_direction(&mut self, direction: u16) {
        self.msg.put_u16(DIRECTION, direction);
    }

    pub fn as_msg(&self) -> &Msg {
        &self.msg
    }

    fn check_entity(&self, ctx: &ServerContext<'_>) -> Result<()> {
        if self.uid() != ctx.player.uid {
            return Err(EngineError::EntityMismatch {
                expected: ctx.player.uid,
                actual: self.uid(),
            });
        }
        Ok(())
    }

    pub fn process(mut self, ctx: &ServerContext<'_>, connection: &mut Connection) -> Result<()> {
        let action = match ActionType::try_from(self.action()) {
            Ok(action) => action,
            Err(code) => {
                warn!("Unknown action[{:04}], data=[{}]", code, self.data());
                return Ok(());
            }
        };

        self.check_entity(ctx)?;
        debug!("Login step {:?} for entity {}", action, self.uid());

        match action {
            ActionType::EnterMap => {
                let spawn = &ctx.config.spawn;
                self.set_position(spawn.x, spawn.y);
                self.set_data(spawn.map);
                self.set_direction(spawn.direction);
                connection.send_to(self);
            }
            ActionType::GetItems
            | ActionType::GetFriends
            | ActionType::GetWeaponSkills
            | ActionType::GetMagicSkills
            | ActionType::GetSyndicate => connection.send_to(self),
            ActionType::CompleteLogin => {}
        }
        Ok(())
    }
}

impl Inbound for MsgAction {
    const TYPE: u16 = MSG_ACTION;
    const NAME: &'static str = "Action";
    const SIZE: usize = ACTION + 2;

    fn from_msg(msg: Msg) -> Self {
        Self { msg }
    }

    fn into_message(self) -> Message {
        Message::Action(self)
    }
}

impl From<MsgAction> for Msg {
    fn from(value: MsgAction) -> Self {
        value.msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionType;
    use crate::player::Player;
    use crate::utils::config::EngineConfig;

    fn run(msg: MsgAction) -> (Result<()>, Connection) {
        let config = EngineConfig::default();
        let player = Player::default();
        let ctx = ServerContext {
            player: &player,
            config: &config,
        };
        let mut connection = Connection::new();
        connection.connect(ConnectionType::GameServer, 1);
        let result = msg.process(&ctx, &mut connection);
        (result, connection)
    }

    fn queued(connection: &Connection) -> Vec<Msg> {
        connection.pending().cloned().collect()
    }

    #[test]
    fn test_enter_map_sets_spawn() {
        let uid = Player::default().uid;
        let mut msg = MsgAction::new(uid, 0, ActionType::EnterMap as u16);
        msg.set_position(1, 2);
        msg.set_direction(5);

        let (result, connection) = run(msg);
        result.unwrap();

        let reply = queued(&connection);
        assert_eq!(reply.len(), 1);
        let echoed = MsgAction::from_msg(reply[0].clone());
        assert_eq!(echoed.position(), (400, 400));
        assert_eq!(echoed.data(), 1002);
        assert_eq!(echoed.direction(), 0);
        assert_eq!(echoed.action(), 74);
        assert_eq!(echoed.uid(), uid);
    }

    #[test]
    fn test_login_steps_echo_verbatim() {
        let uid = Player::default().uid;
        for code in [75u16, 76, 77, 78, 97] {
            let msg = MsgAction::new(uid, 42, code);
            let original = msg.as_msg().clone();
            let (result, connection) = run(msg);
            result.unwrap();
            assert_eq!(queued(&connection), vec![original]);
        }
    }

    #[test]
    fn test_complete_login_no_reply() {
        let (result, connection) = run(MsgAction::new(Player::default().uid, 0, 130));
        result.unwrap();
        assert_eq!(connection.pending_len(), 0);
    }

    #[test]
    fn test_unknown_action_dropped() {
        let (result, connection) = run(MsgAction::new(1, 0, 999));
        result.unwrap();
        assert_eq!(connection.pending_len(), 0);
    }

    #[test]
    fn test_entity_mismatch_is_fatal() {
        let (result, connection) = run(MsgAction::new(1, 0, 74));
        let err = result.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, EngineError::EntityMismatch { actual: 1, .. }));
        assert_eq!(connection.pending_len(), 0);
    }

    #[test]
    fn test_trailing_bytes_preserved() {
        let uid = Player::default().uid;
        let mut frame = MsgAction::new(uid, 0, 75).as_msg().as_bytes().to_vec();
        frame.extend_from_slice(&[0xDE, 0xAD]);
        frame[0] = frame.len() as u8;

        let msg = match Message::create(&frame).unwrap() {
            Message::Action(msg) => msg,
            other => panic!("unexpected {:?}", other),
        };
        let (result, connection) = run(msg);
        result.unwrap();
        assert_eq!(queued(&connection)[0].as_bytes(), &frame[..]);
    }
}

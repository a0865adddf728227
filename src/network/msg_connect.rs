// src/network/msg_connect.rs
//! Game server handshake messages
//!
//! The client answers the account server's [`MsgConnectEx`] by opening the
//! game link and sending [`MsgConnect`] with the same uid and token.

use crate::connection::{Connection, ConnectionType};
use crate::network::definitions::{HEADER_SIZE, MAX_NAMESIZE, MSG_CONNECT, MSG_CONNECTEX};
use crate::network::msg::{Inbound, Message, Msg, ServerContext};
use crate::network::msg_talk::{Channel, Color};
use crate::network::{MsgTalk, MsgUserInfo};
use crate::utils::errors::Result;
use tracing::{debug, warn};

const ACCOUNT_UID: usize = HEADER_SIZE;
const DATA: usize = ACCOUNT_UID + 4;
const INFO: usize = DATA + 4;
const PORT: usize = INFO + MAX_NAMESIZE;

/// Reply accepted by the client as a successful game login
pub const ANSWER_OK: &str = "ANSWER_OK";

/// Game server login request
#[derive(Debug, Clone)]
pub struct MsgConnect {
    msg: Msg,
}

impl MsgConnect {
    pub fn new(account_uid: i32, data: i32, info: &str) -> Result<Self> {
        let mut msg = Msg::with_type(MSG_CONNECT, Self::SIZE);
        msg.put_i32(ACCOUNT_UID, account_uid);
        msg.put_i32(DATA, data);
        msg.put_name(INFO, "Info", info)?;
        Ok(Self { msg })
    }

    pub fn account_uid(&self) -> i32 {
        self.msg.get_i32(ACCOUNT_UID)
    }

    /// Session token issued by the account server
    pub fn data(&self) -> i32 {
        self.msg.get_i32(DATA)
    }

    pub fn info(&self) -> &[u8] {
        self.msg.get_name(INFO)
    }

    pub fn as_msg(&self) -> &Msg {
        &self.msg
    }

    /// Switch the link to the session key and greet the player
    pub fn process(self, ctx: &ServerContext<'_>, connection: &mut Connection) -> Result<()> {
        if connection.connection_type() != ConnectionType::GameServer {
            warn!(
                "Ignoring connect for account {} on the {:?} link",
                self.account_uid(),
                connection.connection_type()
            );
            return Ok(());
        }

        debug!("Game login for account {} with token {}", self.account_uid(), self.data());
        connection
            .cipher_mut()
            .derive_alternate(self.data(), self.account_uid());

        connection.send_to(MsgTalk::new(
            "SYSTEM",
            "ALLUSERS",
            ANSWER_OK,
            Channel::Entrance,
            Color::White,
        )?);
        connection.send_to(MsgUserInfo::new(ctx.player)?);
        Ok(())
    }
}

impl Inbound for MsgConnect {
    const TYPE: u16 = MSG_CONNECT;
    const NAME: &'static str = "Connect";
    const SIZE: usize = INFO + MAX_NAMESIZE;

    fn from_msg(msg: Msg) -> Self {
        Self { msg }
    }

    fn into_message(self) -> Message {
        Message::Connect(self)
    }
}

impl From<MsgConnect> for Msg {
    fn from(value: MsgConnect) -> Self {
        value.msg
    }
}

/// Account server reply carrying the game server endpoint and session
#[derive(Debug, Clone)]
pub struct MsgConnectEx {
    msg: Msg,
}

impl MsgConnectEx {
    pub const SIZE: usize = PORT + 4;

    pub fn new(account_uid: i32, data: i32, info: &str, port: u32) -> Result<Self> {
        let mut msg = Msg::with_type(MSG_CONNECTEX, Self::SIZE);
        msg.put_i32(ACCOUNT_UID, account_uid);
        msg.put_i32(DATA, data);
        msg.put_name(INFO, "Info", info)?;
        msg.put_u32(PORT, port);
        Ok(Self { msg })
    }

    pub fn account_uid(&self) -> i32 {
        self.msg.get_i32(ACCOUNT_UID)
    }

    pub fn data(&self) -> i32 {
        self.msg.get_i32(DATA)
    }

    pub fn info(&self) -> &[u8] {
        self.msg.get_name(INFO)
    }

    pub fn port(&self) -> u32 {
        self.msg.get_u32(PORT)
    }
}

impl From<MsgConnectEx> for Msg {
    fn from(value: MsgConnectEx) -> Self {
        value.msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use crate::utils::config::EngineConfig;

    #[test]
    fn test_connect_ex_layout() {
        let msg = MsgConnectEx::new(123456789, 987654321, "192.0.2.1", 5816).unwrap();
        assert_eq!(MsgConnectEx::SIZE, 32);
        assert_eq!(msg.account_uid(), 123456789);
        assert_eq!(msg.data(), 987654321);
        assert_eq!(msg.info(), b"192.0.2.1");
        assert_eq!(msg.port(), 5816);

        let raw: Msg = msg.into();
        assert_eq!(raw.declared_length(), 32);
        assert_eq!(raw.msg_type(), 1055);
    }

    #[test]
    fn test_connect_on_game_link() {
        let config = EngineConfig::default();
        let player = Player::default();
        let ctx = ServerContext {
            player: &player,
            config: &config,
        };
        let mut connection = Connection::new();
        connection.connect(ConnectionType::GameServer, 7);

        MsgConnect::new(123456789, 987654321, "")
            .unwrap()
            .process(&ctx, &mut connection)
            .unwrap();

        assert!(connection.cipher().uses_alternate());
        assert_eq!(connection.pending_len(), 2);
    }

    #[test]
    fn test_connect_on_account_link_ignored() {
        let config = EngineConfig::default();
        let player = Player::default();
        let ctx = ServerContext {
            player: &player,
            config: &config,
        };
        let mut connection = Connection::new();
        connection.connect(ConnectionType::AccountServer, 7);

        MsgConnect::new(1, 2, "").unwrap().process(&ctx, &mut connection).unwrap();
        assert!(!connection.cipher().uses_alternate());
        assert_eq!(connection.pending_len(), 0);
    }
}

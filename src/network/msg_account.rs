// src/network/msg_account.rs
//! Login request sent to the account server
//!
//! Layout: header, `account[16]` @4, `password[16]` @20 (RC5-encrypted),
//! `server[16]` @36.

use crate::connection::Connection;
use crate::network::definitions::{HEADER_SIZE, MAX_NAMESIZE, MSG_ACCOUNT};
use crate::network::msg::{Inbound, Message, Msg, ServerContext};
use crate::network::MsgConnectEx;
use crate::security::Rc5;
use crate::utils::errors::Result;
use std::borrow::Cow;
use tracing::debug;

const ACCOUNT: usize = HEADER_SIZE;
const PASSWORD: usize = ACCOUNT + MAX_NAMESIZE;
const SERVER: usize = PASSWORD + MAX_NAMESIZE;

#[derive(Debug, Clone)]
pub struct MsgAccount {
    msg: Msg,
}

impl MsgAccount {
    /// Build a login request the way the client does
    pub fn new(account: &str, password: &str, server: &str) -> Result<Self> {
        let mut msg = Msg::with_type(MSG_ACCOUNT, Self::SIZE);
        msg.put_name(ACCOUNT, "Account", account)?;
        msg.put_name(PASSWORD, "Password", password)?;
        msg.put_name(SERVER, "Server", server)?;
        Rc5::password().encrypt(msg.bytes_mut(PASSWORD, MAX_NAMESIZE));
        Ok(Self { msg })
    }

    pub fn account(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.msg.get_name(ACCOUNT))
    }

    /// Password field as it appears on the wire
    pub fn password_raw(&self) -> &[u8] {
        &self.msg.as_bytes()[PASSWORD..PASSWORD + MAX_NAMESIZE]
    }

    pub fn server(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.msg.get_name(SERVER))
    }

    pub fn as_msg(&self) -> &Msg {
        &self.msg
    }

    /// Decrypt the password in place and return it
    pub fn decrypt_password(&mut self) -> Cow<'_, str> {
        Rc5::password().decrypt(self.msg.bytes_mut(PASSWORD, MAX_NAMESIZE));
        String::from_utf8_lossy(self.msg.get_name(PASSWORD))
    }

    /// Accept any credentials and point the client at the game server
    pub fn process(mut self, ctx: &ServerContext<'_>, connection: &mut Connection) -> Result<()> {
        let password = self.decrypt_password().into_owned();
        debug!(
            "Requesting login for {} with password {} on {}",
            self.account(),
            password,
            self.server()
        );

        let session = &ctx.config.session;
        let endpoints = &ctx.config.endpoints;
        let reply = MsgConnectEx::new(
            session.account_uid,
            session.token,
            &endpoints.game_address,
            endpoints.game_port as u32,
        )?;
        connection.send_to(reply);
        Ok(())
    }
}

impl Inbound for MsgAccount {
    const TYPE: u16 = MSG_ACCOUNT;
    const NAME: &'static str = "Account";
    const SIZE: usize = SERVER + MAX_NAMESIZE;

    fn from_msg(msg: Msg) -> Self {
        Self { msg }
    }

    fn into_message(self) -> Message {
        Message::Account(self)
    }
}

impl From<MsgAccount> for Msg {
    fn from(value: MsgAccount) -> Self {
        value.msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionType, RecvOutcome};
    use crate::player::Player;
    use crate::security::{CipherRole, TqCipher};
    use crate::utils::config::EngineConfig;

    #[test]
    fn test_layout() {
        let msg = MsgAccount::new("player", "secret", "Serverless").unwrap();
        assert_eq!(MsgAccount::SIZE, 52);
        assert_eq!(msg.as_msg().len(), 52);
        assert_eq!(msg.account(), "player");
        assert_eq!(msg.server(), "Serverless");
        assert_ne!(&msg.password_raw()[..6], b"secret");
    }

    #[test]
    fn test_password_decrypts() {
        let mut msg = MsgAccount::new("player", "secret", "Serverless").unwrap();
        assert_eq!(msg.decrypt_password(), "secret");
    }

    #[test]
    fn test_process_replies_with_game_server() {
        let config = EngineConfig::default();
        let player = Player::default();
        let ctx = ServerContext {
            player: &player,
            config: &config,
        };
        let mut connection = Connection::new();
        connection.connect(ConnectionType::AccountServer, 100);

        MsgAccount::new("player", "secret", "Serverless")
            .unwrap()
            .process(&ctx, &mut connection)
            .unwrap();
        assert_eq!(connection.pending_len(), 1);

        let mut buf = [0u8; 64];
        let n = match connection.recv_from(&mut buf, 0) {
            RecvOutcome::Data(n) => n,
            RecvOutcome::WouldBlock => panic!("reply expected"),
        };
        assert_eq!(n, 32);

        let mut client = TqCipher::with_role(CipherRole::Client);
        client.decrypt(&mut buf[..n]);
        let reply = Msg::from_frame(&buf[..n]).unwrap();
        assert_eq!(reply.msg_type(), 1055);
        assert_eq!(reply.get_i32(4), 123456789);
        assert_eq!(reply.get_i32(8), 987654321);
        assert_eq!(reply.get_name(12), b"192.0.2.1");
        assert_eq!(reply.get_u32(28), 5816);
    }
}

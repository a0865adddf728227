// src/network/msg_user_info.rs
//! Character sheet sent once the game login succeeds
//!
//! Layout: header, `uid` @4, `look` @8, `hair: u16` @12, `length: u8` @14,
//! `fat: u8` @15, `money` @16, `exp` @20, 16 reserved bytes @24, then u16
//! `force` @40, `dexterity` @42, `health` @44, `soul` @46, `add_points` @48,
//! `cur_hp` @50, `cur_mp` @52, `pk: i16` @54, then u8 `level` @56,
//! `profession` @57, `auto_allot` @58, `metempsychosis` @59, `show_name` @60
//! and a string pack @61 holding name and mate.

use crate::network::definitions::{MAX_NAMESIZE, MSG_USERINFO};
use crate::network::msg::Msg;
use crate::network::string_packer::{encoded_len, StringPacker};
use crate::player::Player;
use crate::utils::errors::{EngineError, Result};

const UID: usize = 4;
const LOOK: usize = 8;
const HAIR: usize = 12;
const MONEY: usize = 16;
const EXP: usize = 20;
const FORCE: usize = 40;
const DEXTERITY: usize = 42;
const HEALTH: usize = 44;
const SOUL: usize = 46;
const ADD_POINTS: usize = 48;
const CUR_HP: usize = 50;
const CUR_MP: usize = 52;
const PK_POINTS: usize = 54;
const LEVEL: usize = 56;
const PROFESSION: usize = 57;
const AUTO_ALLOT: usize = 58;
const METEMPSYCHOSIS: usize = 59;
const SHOW_NAME: usize = 60;
const STRING_PACK: usize = 61;

#[derive(Debug, Clone)]
pub struct MsgUserInfo {
    msg: Msg,
}

impl MsgUserInfo {
    /// Size of the fixed part, header included
    pub const FIXED_SIZE: usize = STRING_PACK;

    pub fn new(player: &Player) -> Result<Self> {
        for (field, text) in [("Name", &player.name), ("Mate", &player.mate)] {
            if text.len() >= MAX_NAMESIZE {
                return Err(EngineError::FieldTooLong {
                    field,
                    max: MAX_NAMESIZE - 1,
                    actual: text.len(),
                });
            }
        }

        let strings = [player.name.as_bytes(), player.mate.as_bytes()];
        let mut msg = Msg::with_type(MSG_USERINFO, STRING_PACK + encoded_len(strings));
        msg.put_u32(UID, player.uid);
        msg.put_u32(LOOK, player.look);
        msg.put_u16(HAIR, player.hair);
        msg.put_u32(MONEY, player.money);
        msg.put_u32(EXP, player.experience);
        msg.put_u16(FORCE, player.force);
        msg.put_u16(DEXTERITY, player.dexterity);
        msg.put_u16(HEALTH, player.health);
        msg.put_u16(SOUL, player.soul);
        msg.put_u16(ADD_POINTS, player.add_points);
        msg.put_u16(CUR_HP, player.cur_hp);
        msg.put_u16(CUR_MP, player.cur_mp);
        msg.put_i16(PK_POINTS, player.pk_points);
        msg.put_u8(LEVEL, player.level);
        msg.put_u8(PROFESSION, player.profession);
        msg.put_u8(AUTO_ALLOT, player.auto_allot() as u8);
        msg.put_u8(METEMPSYCHOSIS, player.metempsychosis);
        msg.put_u8(SHOW_NAME, 1);

        let mut packer = StringPacker::new(msg.tail_mut(STRING_PACK));
        for s in strings {
            packer.add_string(s)?;
        }
        Ok(Self { msg })
    }

    pub fn uid(&self) -> u32 {
        self.msg.get_u32(UID)
    }

    pub fn level(&self) -> u8 {
        self.msg.get_u8(LEVEL)
    }

    pub fn pk_points(&self) -> i16 {
        self.msg.get_i16(PK_POINTS)
    }

    pub fn name(&self) -> Option<&[u8]> {
        StringPacker::new(self.msg.tail(STRING_PACK)).entry(0)
    }

    pub fn mate(&self) -> Option<&[u8]> {
        StringPacker::new(self.msg.tail(STRING_PACK)).entry(1)
    }

    pub fn as_msg(&self) -> &Msg {
        &self.msg
    }
}

impl From<MsgUserInfo> for Msg {
    fn from(value: MsgUserInfo) -> Self {
        value.msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let player = Player::default();
        let msg = MsgUserInfo::new(&player).unwrap();
        let raw = msg.as_msg();

        assert_eq!(raw.len(), 61 + 1 + (1 + 11) + (1 + 4));
        assert_eq!(raw.declared_length() as usize, raw.len());
        assert_eq!(raw.msg_type(), 1006);
        assert_eq!(msg.uid(), 1_000_001);
        assert_eq!(raw.get_u32(LOOK), 671_003);
        assert_eq!(raw.get_u16(HAIR), 311);
        assert_eq!(raw.get_u32(MONEY), 2_000_000);
        assert_eq!(raw.get_u32(EXP), 1_234_872);
        assert_eq!(raw.get_u16(FORCE), 185);
        assert_eq!(raw.get_u16(CUR_HP), 1250);
        assert_eq!(msg.pk_points(), 30_000);
        assert_eq!(msg.level(), 125);
        assert_eq!(raw.get_u8(PROFESSION), 15);
        assert_eq!(raw.get_u8(AUTO_ALLOT), 0);
        assert_eq!(raw.get_u8(METEMPSYCHOSIS), 2);
        assert_eq!(raw.get_u8(SHOW_NAME), 1);
        assert_eq!(&raw.as_bytes()[24..40], &[0u8; 16]);
        assert_eq!(msg.name(), Some(&b"Offline[PM]"[..]));
        assert_eq!(msg.mate(), Some(&b"None"[..]));
    }

    #[test]
    fn test_long_name_rejected() {
        let player = Player {
            name: "x".repeat(16),
            ..Player::default()
        };
        assert!(matches!(
            MsgUserInfo::new(&player),
            Err(EngineError::FieldTooLong { field: "Name", .. })
        ));
    }
}

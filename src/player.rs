// src/player.rs
//! The single emulated character
//!
//! A fixed, read-only profile. Nothing persists between sessions.

/// Emulated player profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub uid: u32,
    pub name: String,
    pub mate: String,
    pub look: u32,
    pub hair: u16,
    pub money: u32,
    pub level: u8,
    pub experience: u32,
    pub profession: u8,
    pub metempsychosis: u8,
    pub force: u16,
    pub dexterity: u16,
    pub health: u16,
    pub soul: u16,
    pub add_points: u16,
    pub cur_hp: u16,
    pub cur_mp: u16,
    pub pk_points: i16,
}

impl Player {
    /// Whether attribute points are distributed by the server
    pub fn auto_allot(&self) -> bool {
        self.level <= 120 && self.metempsychosis == 0
    }
}

impl Default for Player {
    fn default() -> Self {
        Self {
            uid: 1_000_001,
            name: "Offline[PM]".to_string(),
            mate: "None".to_string(),
            look: 671_003,
            hair: 311,
            money: 2_000_000,
            level: 125,
            experience: 1_234_872,
            profession: 15,
            metempsychosis: 2,
            force: 185,
            dexterity: 72,
            health: 110,
            soul: 12,
            add_points: 3,
            cur_hp: 1250,
            cur_mp: 30,
            pk_points: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_allot() {
        let mut player = Player::default();
        assert!(!player.auto_allot());

        player.level = 120;
        player.metempsychosis = 0;
        assert!(player.auto_allot());

        player.metempsychosis = 1;
        assert!(!player.auto_allot());
    }
}

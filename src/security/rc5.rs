// src/security/rc5.rs
//! RC5-32/12/16 block cipher
//!
//! 32-bit words, 12 rounds, 16-byte key. Blocks are two little-endian words.

/// Key length in bytes
pub const KEY_SIZE: usize = 16;

/// Block length in bytes
pub const BLOCK_SIZE: usize = 8;

const ROUNDS: usize = 12;
const KEY_WORDS: usize = KEY_SIZE / 4;
const SUB_WORDS: usize = 2 * (ROUNDS + 1);

const PW32: u32 = 0xB7E1_5163;
const QW32: u32 = 0x9E37_79B9;

/// Seed the client uses to protect the login password
pub const PASSWORD_SEED: [u8; KEY_SIZE] = [
    0x3C, 0xDC, 0xFE, 0xE8, 0xC4, 0x54, 0xD6, 0x7E, 0x16, 0xA6, 0xF8, 0x1A, 0xE8, 0xD0, 0x38, 0xBE,
];

/// Expanded RC5 key
#[derive(Debug, Clone)]
pub struct Rc5 {
    sub: [u32; SUB_WORDS],
}

impl Rc5 {
    /// Expand `seed` into the round subkeys
    pub fn new(seed: &[u8; KEY_SIZE]) -> Self {
        let mut key = [0u32; KEY_WORDS];
        for (word, bytes) in key.iter_mut().zip(seed.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }

        let mut sub = [0u32; SUB_WORDS];
        sub[0] = PW32;
        for i in 1..SUB_WORDS {
            sub[i] = sub[i - 1].wrapping_add(QW32);
        }

        let (mut i, mut j) = (0, 0);
        let (mut x, mut y) = (0u32, 0u32);
        for _ in 0..3 * KEY_WORDS.max(SUB_WORDS) {
            sub[i] = sub[i].wrapping_add(x).wrapping_add(y).rotate_left(3);
            x = sub[i];
            i = (i + 1) % SUB_WORDS;

            key[j] = key[j].wrapping_add(x).wrapping_add(y).rotate_left(x.wrapping_add(y) % 32);
            y = key[j];
            j = (j + 1) % KEY_WORDS;
        }

        Self { sub }
    }

    /// Cipher used for the password field of the login request
    pub fn password() -> Self {
        Self::new(&PASSWORD_SEED)
    }

    /// Encrypt whole blocks in place; `buf.len()` must be a multiple of 8
    pub fn encrypt(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() % BLOCK_SIZE == 0);

        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            let (mut a, mut b) = read_block(block);

            a = a.wrapping_add(self.sub[0]);
            b = b.wrapping_add(self.sub[1]);
            for round in 1..=ROUNDS {
                a = (a ^ b).rotate_left(b % 32).wrapping_add(self.sub[2 * round]);
                b = (b ^ a).rotate_left(a % 32).wrapping_add(self.sub[2 * round + 1]);
            }

            write_block(block, a, b);
        }
    }

    /// Decrypt whole blocks in place; `buf.len()` must be a multiple of 8
    pub fn decrypt(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() % BLOCK_SIZE == 0);

        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            let (mut a, mut b) = read_block(block);

            for round in (1..=ROUNDS).rev() {
                b = b.wrapping_sub(self.sub[2 * round + 1]).rotate_right(a % 32) ^ a;
                a = a.wrapping_sub(self.sub[2 * round]).rotate_right(b % 32) ^ b;
            }
            a = a.wrapping_sub(self.sub[0]);
            b = b.wrapping_sub(self.sub[1]);

            write_block(block, a, b);
        }
    }
}

#[inline]
fn read_block(block: &[u8]) -> (u32, u32) {
    (
        u32::from_le_bytes([block[0], block[1], block[2], block[3]]),
        u32::from_le_bytes([block[4], block[5], block[6], block[7]]),
    )
}

#[inline]
fn write_block(block: &mut [u8], a: u32, b: u32) {
    block[..4].copy_from_slice(&a.to_le_bytes());
    block[4..].copy_from_slice(&b.to_le_bytes());
}

// src/security/tq_cipher.rs
//! Counter-keyed stream cipher used on both emulated links
//!
//! Each byte is combined with two 256-byte key tables indexed by the low and
//! high byte of a 16-bit per-direction counter. After login the game link
//! switches one direction to an alternate key pair derived from the session
//! credentials.
//!
//! Bulk data goes through a 16-byte lane path (SSE2 where available, a
//! portable `u128` path otherwise) that produces exactly the bytes the scalar
//! loop would.

use once_cell::sync::Lazy;

/// Size of one key table
pub const KEY_SIZE: usize = 256;

/// Bytes processed per vector step
const LANES: usize = 16;

/// Key table 1 is padded so a 16-byte load starting at any index stays in bounds
const PADDED_KEY_SIZE: usize = KEY_SIZE + LANES - 1;

const SEED_P: u32 = 0x13FA_0F9D;
const SEED_G: u32 = 0x6D5C_7962;

/// Base key pair shared by every cipher instance
static BASE_KEYS: Lazy<KeyTables> = Lazy::new(KeyTables::base);

/// Which side of the link this cipher plays
///
/// The server applies the forward transform in both directions; the client
/// applies its inverse. The alternate key covers client-to-server traffic, so
/// it keys the server's decrypt and the client's encrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherRole {
    #[default]
    Server,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Forward,
    Inverse,
}

#[derive(Clone)]
struct KeyTables {
    k1: [u8; PADDED_KEY_SIZE],
    k2: [u8; KEY_SIZE],
}

impl KeyTables {
    fn base() -> Self {
        let p = SEED_P.to_le_bytes();
        let g = SEED_G.to_le_bytes();

        let mut k1 = [0u8; PADDED_KEY_SIZE];
        let mut k2 = [0u8; KEY_SIZE];

        let (mut p0, mut g0) = (p[0], g[0]);
        for i in 0..KEY_SIZE {
            k1[i] = p0;
            k2[i] = g0;
            p0 = p[1]
                .wrapping_add(p0.wrapping_mul(p[2]))
                .wrapping_mul(p0)
                .wrapping_add(p[3]);
            g0 = g[1]
                .wrapping_sub(g0.wrapping_mul(g[2]))
                .wrapping_mul(g0)
                .wrapping_add(g[3]);
        }

        let mut tables = Self { k1, k2 };
        tables.pad();
        tables
    }

    fn alternate(base: &KeyTables, a: i32, b: i32) -> Self {
        let x = ((a.wrapping_add(b) ^ 0x4321) ^ a) as u32;
        let y = x.wrapping_mul(x);
        let (x, y) = (x.to_le_bytes(), y.to_le_bytes());

        let mut tables = base.clone();
        for i in 0..KEY_SIZE {
            tables.k1[i] ^= x[i % 4];
            tables.k2[i] ^= y[i % 4];
        }
        tables.pad();
        tables
    }

    fn pad(&mut self) {
        let (head, tail) = self.k1.split_at_mut(KEY_SIZE);
        tail.copy_from_slice(&head[..LANES - 1]);
    }

    #[inline]
    fn byte_key(&self, counter: u16) -> u8 {
        self.k1[(counter & 0xFF) as usize] ^ self.k2[(counter >> 8) as usize]
    }

    /// Key-2 bytes for the 16 counters starting at `counter`
    #[inline]
    fn lane_key2(&self, counter: u16) -> [u8; LANES] {
        let low = (counter & 0xFF) as usize;
        let high = (counter >> 8) as u8;

        let mut block = [self.k2[high as usize]; LANES];
        let remaining = KEY_SIZE - low;
        if remaining < LANES {
            block[remaining..].fill(self.k2[high.wrapping_add(1) as usize]);
        }
        block
    }
}

/// Stream cipher state for one connection
#[derive(Clone)]
pub struct TqCipher {
    role: CipherRole,
    alternate: Option<Box<KeyTables>>,
    encrypt_counter: u16,
    decrypt_counter: u16,
}

impl TqCipher {
    /// Create a server-side cipher keyed with the base tables
    pub fn new() -> Self {
        Self::with_role(CipherRole::Server)
    }

    /// Create a cipher for the given side of the link
    pub fn with_role(role: CipherRole) -> Self {
        Self {
            role,
            alternate: None,
            encrypt_counter: 0,
            decrypt_counter: 0,
        }
    }

    pub fn role(&self) -> CipherRole {
        self.role
    }

    /// Return to the base key pair with both counters at zero
    pub fn reset(&mut self) {
        self.alternate = None;
        self.encrypt_counter = 0;
        self.decrypt_counter = 0;
    }

    /// Switch client-to-server traffic to a key pair derived from `(a, b)`
    ///
    /// Only the counter of the direction that uses the new key restarts.
    pub fn derive_alternate(&mut self, a: i32, b: i32) {
        self.alternate = Some(Box::new(KeyTables::alternate(&BASE_KEYS, a, b)));
        match self.role {
            CipherRole::Server => self.decrypt_counter = 0,
            CipherRole::Client => self.encrypt_counter = 0,
        }
    }

    pub fn uses_alternate(&self) -> bool {
        self.alternate.is_some()
    }

    pub fn encrypt_counter(&self) -> u16 {
        self.encrypt_counter
    }

    pub fn decrypt_counter(&self) -> u16 {
        self.decrypt_counter
    }

    /// Encrypt `buf` in place
    pub fn encrypt(&mut self, buf: &mut [u8]) {
        let (keys, mode) = match self.role {
            CipherRole::Server => (&*BASE_KEYS, Mode::Forward),
            CipherRole::Client => (self.alternate.as_deref().unwrap_or(&*BASE_KEYS), Mode::Inverse),
        };
        apply(buf, keys, &mut self.encrypt_counter, mode);
    }

    /// Decrypt `buf` in place
    pub fn decrypt(&mut self, buf: &mut [u8]) {
        let (keys, mode) = match self.role {
            CipherRole::Server => (self.alternate.as_deref().unwrap_or(&*BASE_KEYS), Mode::Forward),
            CipherRole::Client => (&*BASE_KEYS, Mode::Inverse),
        };
        apply(buf, keys, &mut self.decrypt_counter, mode);
    }
}

impl Default for TqCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TqCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TqCipher")
            .field("role", &self.role)
            .field("alternate", &self.alternate.is_some())
            .field("encrypt_counter", &self.encrypt_counter)
            .field("decrypt_counter", &self.decrypt_counter)
            .finish()
    }
}

fn apply(buf: &mut [u8], keys: &KeyTables, counter: &mut u16, mode: Mode) {
    let mut chunks = buf.chunks_exact_mut(LANES);
    for chunk in &mut chunks {
        let low = (*counter & 0xFF) as usize;
        let k1 = &keys.k1[low..low + LANES];
        let k2 = keys.lane_key2(*counter);
        lanes::apply(chunk, k1, &k2, mode);
        *counter = counter.wrapping_add(LANES as u16);
    }
    apply_scalar(chunks.into_remainder(), keys, counter, mode);
}

fn apply_scalar(buf: &mut [u8], keys: &KeyTables, counter: &mut u16, mode: Mode) {
    for byte in buf.iter_mut() {
        let key = keys.byte_key(*counter);
        *byte = match mode {
            Mode::Forward => (*byte ^ 0xAB).rotate_left(4) ^ key,
            Mode::Inverse => (*byte ^ key).rotate_left(4) ^ 0xAB,
        };
        *counter = counter.wrapping_add(1);
    }
}

#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
mod lanes {
    use super::{Mode, LANES};

    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    #[inline]
    pub(super) fn apply(block: &mut [u8], k1: &[u8], k2: &[u8; LANES], mode: Mode) {
        assert!(block.len() == LANES && k1.len() == LANES);

        // SAFETY: sse2 is enabled at compile time and every pointer covers 16 bytes
        unsafe {
            let data = _mm_loadu_si128(block.as_ptr() as *const __m128i);
            let key = _mm_xor_si128(
                _mm_loadu_si128(k1.as_ptr() as *const __m128i),
                _mm_loadu_si128(k2.as_ptr() as *const __m128i),
            );
            let magic = _mm_set1_epi8(0xABu8 as i8);

            let out = match mode {
                Mode::Forward => _mm_xor_si128(swap_nibbles(_mm_xor_si128(data, magic)), key),
                Mode::Inverse => _mm_xor_si128(swap_nibbles(_mm_xor_si128(data, key)), magic),
            };
            _mm_storeu_si128(block.as_mut_ptr() as *mut __m128i, out);
        }
    }

    #[inline]
    unsafe fn swap_nibbles(v: __m128i) -> __m128i {
        let high = _mm_and_si128(_mm_slli_epi16(v, 4), _mm_set1_epi8(0xF0u8 as i8));
        let low = _mm_and_si128(_mm_srli_epi16(v, 4), _mm_set1_epi8(0x0F));
        _mm_or_si128(high, low)
    }
}

#[cfg(not(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2")))]
mod lanes {
    pub(super) use super::swar::apply;
}

#[cfg_attr(
    all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"),
    allow(dead_code)
)]
mod swar {
    use super::{Mode, LANES};

    const MAGIC: u128 = u128::from_ne_bytes([0xAB; LANES]);
    const HIGH: u128 = u128::from_ne_bytes([0xF0; LANES]);
    const LOW: u128 = u128::from_ne_bytes([0x0F; LANES]);

    #[inline]
    fn load(bytes: &[u8]) -> u128 {
        let mut raw = [0u8; LANES];
        raw.copy_from_slice(bytes);
        u128::from_le_bytes(raw)
    }

    #[inline]
    fn swap_nibbles(w: u128) -> u128 {
        ((w << 4) & HIGH) | ((w >> 4) & LOW)
    }

    #[inline]
    pub(super) fn apply(block: &mut [u8], k1: &[u8], k2: &[u8; LANES], mode: Mode) {
        let data = load(block);
        let key = load(k1) ^ u128::from_le_bytes(*k2);

        let out = match mode {
            Mode::Forward => swap_nibbles(data ^ MAGIC) ^ key,
            Mode::Inverse => swap_nibbles(data ^ key) ^ MAGIC,
        };
        block.copy_from_slice(&out.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 + 7) as u8).collect()
    }

    #[test]
    fn test_base_tables() {
        assert_eq!(BASE_KEYS.k1[0], 0x9D);
        assert_eq!(BASE_KEYS.k1[1], 0x90);
        assert_eq!(BASE_KEYS.k2[0], 0x62);
        assert_eq!(&BASE_KEYS.k1[KEY_SIZE..], &BASE_KEYS.k1[..LANES - 1]);
    }

    #[test]
    fn test_known_answer() {
        let mut cipher = TqCipher::new();
        let mut buf = [0u8, 0u8];
        cipher.encrypt(&mut buf);
        assert_eq!(buf, [0x45, 0x48]);
        assert_eq!(cipher.encrypt_counter(), 2);
        assert_eq!(cipher.decrypt_counter(), 0);
    }

    #[test]
    fn test_server_decrypt_is_same_transform() {
        let mut a = TqCipher::new();
        let mut b = TqCipher::new();
        let mut x = sample(40);
        let mut y = x.clone();
        a.encrypt(&mut x);
        b.decrypt(&mut y);
        assert_eq!(x, y);
    }

    #[test]
    fn test_lane_path_matches_scalar() {
        let starts = [0u16, 1, 200, 241, 250, 255, 0x01F0, 0xFFF0, 0xFFF8, 0xFFFF];
        for keys in [(*BASE_KEYS).clone(), KeyTables::alternate(&BASE_KEYS, 987654321, 123456789)] {
            for &start in &starts {
                for len in 0..130 {
                    for mode in [Mode::Forward, Mode::Inverse] {
                        let mut fast = sample(len);
                        let mut slow = fast.clone();
                        let (mut c1, mut c2) = (start, start);
                        apply(&mut fast, &keys, &mut c1, mode);
                        apply_scalar(&mut slow, &keys, &mut c2, mode);
                        assert_eq!(fast, slow, "start={} len={} mode={:?}", start, len, mode);
                        assert_eq!(c1, c2);
                    }
                }
            }
        }
    }

    #[test]
    fn test_swar_matches_scalar() {
        for start in [0u16, 245, 0xFFFA] {
            let mut fast = sample(16);
            let mut slow = fast.clone();
            let low = (start & 0xFF) as usize;
            swar::apply(
                &mut fast,
                &BASE_KEYS.k1[low..low + LANES],
                &BASE_KEYS.lane_key2(start),
                Mode::Forward,
            );
            let mut counter = start;
            apply_scalar(&mut slow, &BASE_KEYS, &mut counter, Mode::Forward);
            assert_eq!(fast, slow);
        }
    }

    #[test]
    fn test_counter_wraps() {
        let mut cipher = TqCipher::new();
        let mut buf = vec![0u8; 65536 + 3];
        cipher.encrypt(&mut buf);
        assert_eq!(cipher.encrypt_counter(), 3);
    }

    #[test]
    fn test_alternate_resets_decrypt_counter_only() {
        let mut cipher = TqCipher::new();
        let mut buf = sample(10);
        cipher.encrypt(&mut buf);
        cipher.decrypt(&mut buf);
        cipher.derive_alternate(987654321, 123456789);
        assert!(cipher.uses_alternate());
        assert_eq!(cipher.encrypt_counter(), 10);
        assert_eq!(cipher.decrypt_counter(), 0);

        cipher.reset();
        assert!(!cipher.uses_alternate());
        assert_eq!(cipher.encrypt_counter(), 0);
    }

    #[test]
    fn test_alternate_changes_decrypt_only() {
        let plain = sample(32);

        let mut base = TqCipher::new();
        let mut alt = TqCipher::new();
        alt.derive_alternate(1, 2);

        let (mut e1, mut e2) = (plain.clone(), plain.clone());
        base.encrypt(&mut e1);
        alt.encrypt(&mut e2);
        assert_eq!(e1, e2);

        let (mut d1, mut d2) = (plain.clone(), plain);
        base.decrypt(&mut d1);
        alt.decrypt(&mut d2);
        assert_ne!(d1, d2);
    }

    proptest! {
        #[test]
        fn prop_server_to_client_round_trip(data in proptest::collection::vec(any::<u8>(), 0..600), skip in 0usize..300) {
            let mut server = TqCipher::new();
            let mut client = TqCipher::with_role(CipherRole::Client);

            let mut warmup = vec![0u8; skip];
            server.encrypt(&mut warmup);
            client.decrypt(&mut warmup);

            let mut buf = data.clone();
            server.encrypt(&mut buf);
            client.decrypt(&mut buf);
            prop_assert_eq!(buf, data);
        }

        #[test]
        fn prop_client_to_server_round_trip_with_alternate(
            data in proptest::collection::vec(any::<u8>(), 0..600),
            token in any::<i32>(),
            uid in any::<i32>(),
        ) {
            let mut server = TqCipher::new();
            let mut client = TqCipher::with_role(CipherRole::Client);

            let mut login = vec![0x11u8; 28];
            client.encrypt(&mut login);
            server.decrypt(&mut login);
            prop_assert_eq!(&login, &vec![0x11u8; 28]);

            server.derive_alternate(token, uid);
            client.derive_alternate(token, uid);

            let mut buf = data.clone();
            client.encrypt(&mut buf);
            server.decrypt(&mut buf);
            prop_assert_eq!(buf, data);
        }
    }
}

// src/interception/prologue.rs
//! Function prologue recognition and jump encoding
//!
//! A detour overwrites the first 5 bytes of a function with `jmp rel32`. The
//! instructions it displaces must be copied whole into the trampoline, so only
//! prologues with a known instruction boundary at or past byte 5 are accepted.

/// Bytes overwritten at the hooked function
pub const PATCH_SIZE: usize = 5;

/// Longest header any known prologue relocates
pub const MAX_HEADER_SIZE: usize = 11;

/// `jmp qword ptr [rip+0]` followed by the 8-byte target
pub const ABS_JUMP_SIZE: usize = 14;

const JMP_REL32: u8 = 0xE9;

/// Recognized function entry sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prologue {
    /// `push ebp; mov ebp, esp; sub esp, imm32`
    FrameWithLocals,

    /// `mov edi, edi; push ebp; mov ebp, esp` (hot-patchable entry)
    HotPatch,

    /// `jmp dword ptr [disp32]` (import thunk)
    IndirectJump,
}

impl Prologue {
    /// Classify the bytes at a function entry
    pub fn classify(code: &[u8]) -> Option<Self> {
        if code.starts_with(&[0x55, 0x8B, 0xEC, 0x81, 0xEC]) {
            Some(Prologue::FrameWithLocals)
        } else if code.starts_with(&[0x8B, 0xFF, 0x55, 0x8B, 0xEC]) {
            Some(Prologue::HotPatch)
        } else if code.starts_with(&[0xFF, 0x25]) {
            Some(Prologue::IndirectJump)
        } else {
            None
        }
    }

    /// Whole instructions covering the patched bytes
    pub fn header_size(self) -> usize {
        match self {
            Prologue::FrameWithLocals => 11,
            Prologue::HotPatch => 5,
            Prologue::IndirectJump => 6,
        }
    }
}

/// Encode `jmp rel32` placed at `from` targeting `to`, if in range
///
/// On 32-bit targets the displacement wraps, so every address is in range.
pub fn rel32_jump(from: usize, to: usize) -> Option<[u8; PATCH_SIZE]> {
    let disp = if cfg!(target_pointer_width = "32") {
        (to as u32).wrapping_sub(from as u32).wrapping_sub(PATCH_SIZE as u32) as i32
    } else {
        let next = (from as i64).wrapping_add(PATCH_SIZE as i64);
        i32::try_from((to as i64).wrapping_sub(next)).ok()?
    };

    let mut code = [0u8; PATCH_SIZE];
    code[0] = JMP_REL32;
    code[1..].copy_from_slice(&disp.to_le_bytes());
    Some(code)
}

/// Encode an absolute 64-bit jump (`FF 25 00000000` + address)
pub fn abs_jump(to: u64) -> [u8; ABS_JUMP_SIZE] {
    let mut code = [0u8; ABS_JUMP_SIZE];
    code[..2].copy_from_slice(&[0xFF, 0x25]);
    code[6..].copy_from_slice(&to.to_le_bytes());
    code
}

/// Copy a prologue header for execution at `to` instead of `from`
///
/// With `rip_relative` set (x86-64) the indirect jump's displacement is
/// rebased so it still reads the same pointer slot.
pub fn relocate(
    header: &[u8],
    prologue: Prologue,
    from: usize,
    to: usize,
    rip_relative: bool,
) -> Option<Vec<u8>> {
    let mut code = header.get(..prologue.header_size())?.to_vec();

    if prologue == Prologue::IndirectJump && rip_relative {
        let len = code.len() as i64;
        let disp = i32::from_le_bytes([code[2], code[3], code[4], code[5]]) as i64;
        let slot = (from as i64).wrapping_add(len).wrapping_add(disp);
        let rebased = i32::try_from(slot.wrapping_sub((to as i64).wrapping_add(len))).ok()?;
        code[2..6].copy_from_slice(&rebased.to_le_bytes());
    }

    Some(code)
}

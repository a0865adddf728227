// src/interception/hook.rs
//! Inline detour hooks
//!
//! Installing a hook overwrites the first 5 bytes of a function with a jump to
//! a replacement. The displaced prologue instructions are relocated into a
//! trampoline followed by a jump back into the original body, so calling the
//! trampoline runs the original function unchanged.
//!
//! Trampoline block layout:
//!
//! ```text
//! [relocated header][E9 rel32 -> original + header][FF 25 relay -> replacement]
//! ```
//!
//! The relay is only written on 64-bit targets when the replacement is out of
//! rel32 reach of the original.

use crate::interception::memory::{write_code, ExecBuffer};
use crate::interception::prologue::{
    abs_jump, rel32_jump, relocate, Prologue, ABS_JUMP_SIZE, MAX_HEADER_SIZE, PATCH_SIZE,
};
use crate::utils::errors::{EngineError, Result};
use std::ffi::c_void;
use tracing::{debug, warn};

const BLOCK_SIZE: usize = MAX_HEADER_SIZE + PATCH_SIZE + ABS_JUMP_SIZE;

/// `FF 25` is RIP-relative only in 64-bit mode
const RIP_RELATIVE: bool = cfg!(target_arch = "x86_64");

/// One function redirection
#[derive(Debug)]
pub struct Hook {
    original: usize,
    saved: [u8; PATCH_SIZE],
    prologue: Option<Prologue>,
    block: Option<ExecBuffer>,
}

impl Hook {
    pub const fn new() -> Self {
        Self {
            original: 0,
            saved: [0; PATCH_SIZE],
            prologue: None,
            block: None,
        }
    }

    /// Redirect `original` to `target`
    ///
    /// # Safety
    /// `original` must be the entry of a mapped function with at least 11
    /// readable bytes, and no thread may be executing its first 11 bytes while
    /// the patch is written. `target` must have the same signature and calling
    /// convention as `original`.
    pub unsafe fn install(&mut self, original: *const c_void, target: *const c_void) -> Result<()> {
        if !cfg!(any(target_arch = "x86", target_arch = "x86_64")) {
            return Err(EngineError::Unsupported(
                "inline hooks require x86 or x86-64".to_string(),
            ));
        }

        if self.block.is_some() {
            return Err(EngineError::HookAlreadyInstalled(self.original));
        }

        let original = original as usize;
        let target = target as usize;
        let code = std::slice::from_raw_parts(original as *const u8, MAX_HEADER_SIZE);

        let prologue = Prologue::classify(code).ok_or(EngineError::UnknownPrologue {
            address: original,
            bytes: [code[0], code[1], code[2], code[3], code[4]],
        })?;
        let header_size = prologue.header_size();

        let mut block = ExecBuffer::alloc_near(original, BLOCK_SIZE)?;
        let trampoline = block.addr();
        let out_of_range = || {
            EngineError::MemoryProtection(format!(
                "trampoline at {:#x} out of reach of {:#x}",
                trampoline, original
            ))
        };

        let header = relocate(code, prologue, original, trampoline, RIP_RELATIVE)
            .ok_or_else(out_of_range)?;
        block.write(0, &header);

        let resume = rel32_jump(trampoline + header_size, original + header_size)
            .ok_or_else(out_of_range)?;
        block.write(header_size, &resume);

        let patch = match rel32_jump(original, target) {
            Some(jump) => jump,
            None => {
                let relay = header_size + PATCH_SIZE;
                block.write(relay, &abs_jump(target as u64));
                rel32_jump(original, trampoline + relay).ok_or_else(out_of_range)?
            }
        };

        self.saved.copy_from_slice(&code[..PATCH_SIZE]);
        write_code(original, &patch)?;

        debug!(
            "Redirected {:#x} to {:#x} ({:?}, trampoline at {:#x})",
            original, target, prologue, trampoline
        );
        self.original = original;
        self.prologue = Some(prologue);
        self.block = Some(block);
        Ok(())
    }

    /// Entry that runs the original function, while installed
    pub fn trampoline(&self) -> Option<*const c_void> {
        self.block.as_ref().map(|block| block.addr() as *const c_void)
    }

    pub fn is_installed(&self) -> bool {
        self.block.is_some()
    }

    pub fn prologue(&self) -> Option<Prologue> {
        self.prologue
    }

    /// Restore the original bytes and free the trampoline
    pub fn reset(&mut self) -> Result<()> {
        let Some(block) = self.block.take() else {
            return Ok(());
        };

        // SAFETY: install validated this site and saved its original bytes
        if let Err(err) = unsafe { write_code(self.original, &self.saved) } {
            self.block = Some(block);
            return Err(err);
        }

        debug!("Restored {:#x}", self.original);
        self.prologue = None;
        drop(block);
        Ok(())
    }
}

impl Default for Hook {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Hook {
    fn drop(&mut self) {
        if let Err(err) = self.reset() {
            warn!("Leaving hook at {:#x} in place: {}", self.original, err);
            // the patch still jumps through the block
            if let Some(block) = self.block.take() {
                std::mem::forget(block);
            }
        }
    }
}

#[cfg(all(test, unix, target_arch = "x86_64"))]
mod tests {
    use super::*;

    extern "C" fn replacement() -> i32 {
        7
    }

    /// `mov edi, edi; push rbp; mov ebp, esp; pop rbp; mov eax, 42; ret`
    const ANSWER: [u8; 12] = [0x8B, 0xFF, 0x55, 0x8B, 0xEC, 0x5D, 0xB8, 0x2A, 0x00, 0x00, 0x00, 0xC3];

    fn fake_function(code: &[u8]) -> ExecBuffer {
        let mut buffer = ExecBuffer::alloc_near(replacement as usize, 64).unwrap();
        buffer.write(0, code);
        buffer
    }

    fn call(addr: usize) -> i32 {
        let f: extern "C" fn() -> i32 = unsafe { std::mem::transmute(addr) };
        f()
    }

    #[test]
    fn test_install_call_through_reset() {
        let fake = fake_function(&ANSWER);
        assert_eq!(call(fake.addr()), 42);

        let mut hook = Hook::new();
        unsafe {
            hook.install(fake.addr() as *const c_void, replacement as *const c_void)
                .unwrap();
        }
        assert_eq!(hook.prologue(), Some(Prologue::HotPatch));
        assert_eq!(fake.as_slice()[0], 0xE9);
        assert_eq!(call(fake.addr()), 7);

        let trampoline = hook.trampoline().unwrap() as usize;
        assert_eq!(call(trampoline), 42);

        let again = unsafe { hook.install(fake.addr() as *const c_void, replacement as *const c_void) };
        assert!(matches!(again, Err(EngineError::HookAlreadyInstalled(_))));

        hook.reset().unwrap();
        assert!(!hook.is_installed());
        assert!(hook.trampoline().is_none());
        assert_eq!(&fake.as_slice()[..12], &ANSWER);
        assert_eq!(call(fake.addr()), 42);

        // reset twice is a no-op
        hook.reset().unwrap();
    }

    #[test]
    fn test_drop_restores() {
        let fake = fake_function(&ANSWER);
        {
            let mut hook = Hook::new();
            unsafe {
                hook.install(fake.addr() as *const c_void, replacement as *const c_void)
                    .unwrap();
            }
            assert_eq!(call(fake.addr()), 7);
        }
        assert_eq!(call(fake.addr()), 42);
    }

    #[test]
    fn test_unknown_prologue_untouched() {
        let code = [0x90u8; 16];
        let fake = fake_function(&code);
        let mut hook = Hook::new();
        let result = unsafe { hook.install(fake.addr() as *const c_void, replacement as *const c_void) };

        let err = result.unwrap_err();
        assert!(err.is_fatal());
        match err {
            EngineError::UnknownPrologue { address, bytes } => {
                assert_eq!(address, fake.addr());
                assert_eq!(bytes, [0x90; 5]);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(&fake.as_slice()[..16], &code);
        assert!(!hook.is_installed());
    }
}

// src/interception/memory.rs
//! Executable memory and code patching
//!
//! All raw page-level operations live here: allocating trampoline blocks
//! within `jmp rel32` reach of a target, and rewriting code bytes under a
//! temporary writable protection.

use crate::utils::errors::{EngineError, Result};
use std::ptr::NonNull;

/// Furthest a trampoline may sit from the code that jumps to it
#[cfg(target_pointer_width = "64")]
const NEAR_RANGE: usize = 0x7000_0000;

/// Distance between allocation candidates when searching near a target
#[cfg(target_pointer_width = "64")]
const PROBE_STEP: usize = 0x10_0000;

/// Executable, writable block owned by a hook
#[derive(Debug)]
pub struct ExecBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the block is plain memory owned exclusively by this value; it holds
// no thread-affine state.
unsafe impl Send for ExecBuffer {}
unsafe impl Sync for ExecBuffer {}

impl ExecBuffer {
    /// Allocate `len` bytes reachable from `target` with a rel32 jump
    pub fn alloc_near(target: usize, len: usize) -> Result<Self> {
        #[cfg(target_pointer_width = "64")]
        {
            for distance in (PROBE_STEP..NEAR_RANGE).step_by(PROBE_STEP) {
                for hint in [target.checked_sub(distance), target.checked_add(distance)]
                    .into_iter()
                    .flatten()
                {
                    if let Some(buffer) = Self::alloc_at(hint & !(PROBE_STEP - 1), len) {
                        if buffer.addr().abs_diff(target) < NEAR_RANGE {
                            tracing::trace!("Trampoline block at {:#x} for {:#x}", buffer.addr(), target);
                            return Ok(buffer);
                        }
                    }
                }
            }

            Err(EngineError::MemoryProtection(format!(
                "no executable memory within rel32 range of {:#x}",
                target
            )))
        }

        #[cfg(not(target_pointer_width = "64"))]
        {
            Self::alloc_at(0, len).ok_or_else(|| {
                EngineError::MemoryProtection(format!(
                    "cannot allocate executable memory for {:#x}",
                    target
                ))
            })
        }
    }

    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `code` into the block at `offset`
    pub fn write(&mut self, offset: usize, code: &[u8]) {
        assert!(offset + code.len() <= self.len);
        // SAFETY: the range was checked against the owned allocation
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), self.ptr.as_ptr().add(offset), code.len());
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the block is `len` initialized bytes owned by self
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

#[cfg(windows)]
mod platform {
    use super::*;
    use std::ffi::c_void;
    use windows_sys::Win32::System::Diagnostics::Debug::FlushInstructionCache;
    use windows_sys::Win32::System::Memory::{
        VirtualAlloc, VirtualFree, VirtualProtect, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE,
        PAGE_EXECUTE_READWRITE,
    };
    use windows_sys::Win32::System::Threading::GetCurrentProcess;

    impl ExecBuffer {
        pub(super) fn alloc_at(hint: usize, len: usize) -> Option<Self> {
            // SAFETY: VirtualAlloc either reserves fresh pages or fails
            let ptr = unsafe {
                VirtualAlloc(
                    hint as *const c_void,
                    len,
                    MEM_COMMIT | MEM_RESERVE,
                    PAGE_EXECUTE_READWRITE,
                )
            };
            NonNull::new(ptr as *mut u8).map(|ptr| Self { ptr, len })
        }
    }

    impl Drop for ExecBuffer {
        fn drop(&mut self) {
            // SAFETY: the pointer came from VirtualAlloc and is released once
            unsafe {
                VirtualFree(self.ptr.as_ptr() as *mut c_void, 0, MEM_RELEASE);
            }
        }
    }

    /// # Safety
    /// `addr..addr + code.len()` must be mapped code no other thread executes
    /// during the call.
    pub unsafe fn write_code(addr: usize, code: &[u8]) -> Result<()> {
        let mut old = 0u32;
        if VirtualProtect(addr as *const c_void, code.len(), PAGE_EXECUTE_READWRITE, &mut old) == 0 {
            return Err(EngineError::MemoryProtection(format!(
                "VirtualProtect({:#x}) failed",
                addr
            )));
        }

        std::ptr::copy_nonoverlapping(code.as_ptr(), addr as *mut u8, code.len());

        let mut ignored = 0u32;
        VirtualProtect(addr as *const c_void, code.len(), old, &mut ignored);
        FlushInstructionCache(GetCurrentProcess(), addr as *const c_void, code.len());
        Ok(())
    }
}

#[cfg(unix)]
mod platform {
    use super::*;

    fn page_size() -> usize {
        // SAFETY: sysconf has no preconditions
        match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
            n if n > 0 => n as usize,
            _ => 4096,
        }
    }

    impl ExecBuffer {
        pub(super) fn alloc_at(hint: usize, len: usize) -> Option<Self> {
            // SAFETY: anonymous private mapping; a hint is only advisory
            let ptr = unsafe {
                libc::mmap(
                    hint as *mut libc::c_void,
                    len,
                    libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            if ptr == libc::MAP_FAILED {
                return None;
            }
            NonNull::new(ptr as *mut u8).map(|ptr| Self { ptr, len })
        }
    }

    impl Drop for ExecBuffer {
        fn drop(&mut self) {
            // SAFETY: the mapping came from mmap with this length
            unsafe {
                libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
            }
        }
    }

    /// # Safety
    /// `addr..addr + code.len()` must be mapped code no other thread executes
    /// during the call.
    pub unsafe fn write_code(addr: usize, code: &[u8]) -> Result<()> {
        let page = page_size();
        let start = addr & !(page - 1);
        let span = addr + code.len() - start;

        let rwx = libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC;
        if libc::mprotect(start as *mut libc::c_void, span, rwx) != 0 {
            return Err(EngineError::MemoryProtection(format!(
                "mprotect({:#x}) failed: {}",
                addr,
                std::io::Error::last_os_error()
            )));
        }

        std::ptr::copy_nonoverlapping(code.as_ptr(), addr as *mut u8, code.len());

        libc::mprotect(
            start as *mut libc::c_void,
            span,
            libc::PROT_READ | libc::PROT_EXEC,
        );
        Ok(())
    }
}

pub use platform::write_code;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_near_and_write() {
        let anchor = test_alloc_near_and_write as usize;
        let mut buffer = ExecBuffer::alloc_near(anchor, 64).unwrap();
        assert_eq!(buffer.len(), 64);
        assert!(buffer.addr().abs_diff(anchor) < i32::MAX as usize);

        buffer.write(3, &[0xC3, 0x90]);
        assert_eq!(&buffer.as_slice()[3..5], &[0xC3, 0x90]);
    }
}

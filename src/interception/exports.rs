// src/interception/exports.rs
//! Module entry points and the Winsock shims
//!
//! [`initialize`] hooks the five socket exports of `ws2_32.dll` and publishes
//! the process-wide [`Client`]. Each shim forwards its call to the client; a
//! fatal error inside a shim is logged and aborts the process, since the
//! client cannot continue on a desynchronized stream.

use crate::interception::client::Client;
use crate::interception::once::SpinOnce;
use crate::observability::{describe_metrics, init_tracing};
use crate::player::Player;
use crate::utils::config::EngineConfig;
use crate::utils::errors::{EngineError, Result};
use tracing::{debug, error, info, warn};

/// Module exporting the hooked functions
pub const WS2_32: &str = "ws2_32.dll";

/// Hooked exports, in slot order
pub const EXPORT_NAMES: [&str; 5] = ["connect", "send", "recv", "closesocket", "WSAGetLastError"];

static CLIENT: SpinOnce<Client> = SpinOnce::new();

/// The process-wide controller, once [`initialize`] has succeeded
///
/// Spins while another thread is still initializing.
pub fn client() -> Option<&'static Client> {
    CLIENT.wait()
}

/// Where initialization was requested from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    /// `DllMain` on process attach, under the loader lock
    LoaderLock,

    /// An exported entry point called after the module is mapped
    Explicit,
}

impl Attach {
    /// Whether `ws2_32.dll` may be loaded if the host has not loaded it yet
    pub fn may_load_library(self) -> bool {
        self == Attach::Explicit
    }

    /// Configuration for this path; under the loader lock no file is read
    pub fn config(self) -> Result<EngineConfig> {
        match self {
            Attach::LoaderLock => EngineConfig::from_env(),
            Attach::Explicit => EngineConfig::load(),
        }
    }
}

/// Hook the socket exports and start emulating
///
/// Calling again after a success is a no-op. On failure every hook installed
/// so far is removed and a later call may retry.
pub fn initialize() -> Result<()> {
    initialize_with(Attach::Explicit)
}

/// [`initialize`] with the restrictions of `attach`
pub fn initialize_with(attach: Attach) -> Result<()> {
    CLIENT.get_or_try_init(|| build_client(attach)).map(|_| ())
}

/// Reserved; hooks stay installed for the lifetime of the process
pub fn uninitialize() {
    debug!("uninitialize requested, hooks stay in place");
}

fn build_client(attach: Attach) -> Result<Client> {
    let loaded = attach.config();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    init_tracing(&config.logging);
    describe_metrics();

    if let Err(err) = &loaded {
        warn!("Using default configuration: {}", err);
    }

    let passthrough = platform::hook_winsock(attach)?;
    info!(
        "Serverless v{} active: account port {}, game port {}",
        crate::VERSION,
        config.endpoints.account_port,
        config.endpoints.game_port
    );

    Ok(Client::new(config, Player::default(), passthrough))
}

/// Log and abort on an error raised inside a shim
#[cfg_attr(not(windows), allow(dead_code))]
fn abort_on(err: EngineError) -> ! {
    error!("Unrecoverable error in socket shim: {}", err);
    std::process::abort()
}

#[cfg(windows)]
pub use platform::resolve_exports;

#[cfg(windows)]
mod platform {
    use super::{abort_on, client, Attach, EXPORT_NAMES, WS2_32};
    use crate::interception::client::Passthrough;
    use crate::interception::hook::Hook;
    use crate::interception::winsock::RawSocket;
    use crate::utils::errors::{EngineError, Result};
    use std::ffi::{c_void, CString};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use windows_sys::Win32::System::LibraryLoader::{GetModuleHandleA, GetProcAddress, LoadLibraryA};

    type ConnectFn = unsafe extern "system" fn(RawSocket, *const u8, i32) -> i32;
    type SendFn = unsafe extern "system" fn(RawSocket, *const u8, i32, i32) -> i32;
    type RecvFn = unsafe extern "system" fn(RawSocket, *mut u8, i32, i32) -> i32;
    type CloseFn = unsafe extern "system" fn(RawSocket) -> i32;
    type LastErrorFn = unsafe extern "system" fn() -> i32;

    const CONNECT: usize = 0;
    const SEND: usize = 1;
    const RECV: usize = 2;
    const CLOSE: usize = 3;
    const LAST_ERROR: usize = 4;

    /// Export addresses, used directly when no client is published
    static EXPORTS: [AtomicUsize; 5] = [
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
    ];

    /// Real socket functions reached through the hook trampolines
    pub struct Winsock {
        connect: ConnectFn,
        send: SendFn,
        recv: RecvFn,
        close: CloseFn,
        last_error: LastErrorFn,
        _hooks: [Hook; 5],
    }

    impl Passthrough for Winsock {
        fn connect(&self, socket: RawSocket, name: &[u8]) -> i32 {
            unsafe { (self.connect)(socket, name.as_ptr(), name.len() as i32) }
        }

        fn send(&self, socket: RawSocket, buf: &[u8], flags: i32) -> i32 {
            unsafe { (self.send)(socket, buf.as_ptr(), buf.len() as i32, flags) }
        }

        fn recv(&self, socket: RawSocket, buf: &mut [u8], flags: i32) -> i32 {
            unsafe { (self.recv)(socket, buf.as_mut_ptr(), buf.len() as i32, flags) }
        }

        fn close(&self, socket: RawSocket) -> i32 {
            unsafe { (self.close)(socket) }
        }

        fn last_error(&self) -> i32 {
            unsafe { (self.last_error)() }
        }
    }

    /// Addresses of the hooked exports
    ///
    /// `ws2_32.dll` is loaded on demand only with `allow_load`; otherwise it
    /// must already be mapped into the process.
    pub fn resolve_exports(allow_load: bool) -> Result<[usize; 5]> {
        let module_name = CString::new(WS2_32).map_err(|e| EngineError::ExportNotFound(e.to_string()))?;

        // SAFETY: the name is NUL-terminated and outlives both calls
        let module = unsafe {
            match GetModuleHandleA(module_name.as_ptr() as *const u8) {
                0 if allow_load => LoadLibraryA(module_name.as_ptr() as *const u8),
                handle => handle,
            }
        };
        if module == 0 {
            return Err(EngineError::ExportNotFound(WS2_32.to_string()));
        }

        let mut addresses = [0usize; 5];
        for (address, name) in addresses.iter_mut().zip(EXPORT_NAMES) {
            let symbol = CString::new(name).map_err(|e| EngineError::ExportNotFound(e.to_string()))?;
            // SAFETY: module is a loaded image handle and symbol is NUL-terminated
            let proc = unsafe { GetProcAddress(module, symbol.as_ptr() as *const u8) };
            *address = proc
                .map(|f| f as usize)
                .ok_or_else(|| EngineError::ExportNotFound(format!("{}!{}", WS2_32, name)))?;
        }
        Ok(addresses)
    }

    pub fn hook_winsock(attach: Attach) -> Result<Box<dyn Passthrough>> {
        let exports = resolve_exports(attach.may_load_library())?;
        for (slot, &address) in EXPORTS.iter().zip(&exports) {
            slot.store(address, Ordering::Release);
        }

        let shims: [*const c_void; 5] = [
            shim_connect as *const c_void,
            shim_send as *const c_void,
            shim_recv as *const c_void,
            shim_closesocket as *const c_void,
            shim_wsa_get_last_error as *const c_void,
        ];

        // dropping `hooks` on an early return removes what was installed
        let mut hooks: [Hook; 5] = Default::default();
        for ((hook, &export), &shim) in hooks.iter_mut().zip(&exports).zip(&shims) {
            // SAFETY: export is a live ws2_32 entry point and shim shares its signature
            unsafe { hook.install(export as *const c_void, shim)? };
        }

        let entry = |i: usize| {
            hooks[i].trampoline().ok_or_else(|| {
                EngineError::MemoryProtection(format!("no trampoline for {}", EXPORT_NAMES[i]))
            })
        };

        // SAFETY: each trampoline runs the original export with its own signature
        unsafe {
            Ok(Box::new(Winsock {
                connect: std::mem::transmute::<*const c_void, ConnectFn>(entry(CONNECT)?),
                send: std::mem::transmute::<*const c_void, SendFn>(entry(SEND)?),
                recv: std::mem::transmute::<*const c_void, RecvFn>(entry(RECV)?),
                close: std::mem::transmute::<*const c_void, CloseFn>(entry(CLOSE)?),
                last_error: std::mem::transmute::<*const c_void, LastErrorFn>(entry(LAST_ERROR)?),
                _hooks: hooks,
            }))
        }
    }

    /// The unhooked export; only reachable once hooks were rolled back
    unsafe fn export<F: Copy>(index: usize) -> F {
        let address = EXPORTS[index].load(Ordering::Acquire);
        std::mem::transmute_copy::<usize, F>(&address)
    }

    unsafe fn bytes<'a>(ptr: *const u8, len: i32) -> &'a [u8] {
        if ptr.is_null() || len <= 0 {
            &[]
        } else {
            std::slice::from_raw_parts(ptr, len as usize)
        }
    }

    unsafe fn bytes_mut<'a>(ptr: *mut u8, len: i32) -> &'a mut [u8] {
        if ptr.is_null() || len <= 0 {
            &mut []
        } else {
            std::slice::from_raw_parts_mut(ptr, len as usize)
        }
    }

    unsafe extern "system" fn shim_connect(socket: RawSocket, name: *const u8, namelen: i32) -> i32 {
        match client() {
            Some(client) => client.on_connect(socket, bytes(name, namelen)),
            None => export::<ConnectFn>(CONNECT)(socket, name, namelen),
        }
    }

    unsafe extern "system" fn shim_send(socket: RawSocket, buf: *const u8, len: i32, flags: i32) -> i32 {
        match client() {
            Some(client) => match client.on_send(socket, bytes(buf, len), flags) {
                Ok(sent) => sent,
                Err(err) => abort_on(err),
            },
            None => export::<SendFn>(SEND)(socket, buf, len, flags),
        }
    }

    unsafe extern "system" fn shim_recv(socket: RawSocket, buf: *mut u8, len: i32, flags: i32) -> i32 {
        match client() {
            Some(client) => client.on_recv(socket, bytes_mut(buf, len), flags),
            None => export::<RecvFn>(RECV)(socket, buf, len, flags),
        }
    }

    unsafe extern "system" fn shim_closesocket(socket: RawSocket) -> i32 {
        match client() {
            Some(client) => client.on_close(socket),
            None => export::<CloseFn>(CLOSE)(socket),
        }
    }

    unsafe extern "system" fn shim_wsa_get_last_error() -> i32 {
        match client() {
            Some(client) => client.on_last_error(),
            None => export::<LastErrorFn>(LAST_ERROR)(),
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use super::Attach;
    use crate::interception::client::Passthrough;
    use crate::utils::errors::{EngineError, Result};

    pub fn hook_winsock(_attach: Attach) -> Result<Box<dyn Passthrough>> {
        Err(EngineError::Unsupported(
            "socket interception requires Windows".to_string(),
        ))
    }
}
